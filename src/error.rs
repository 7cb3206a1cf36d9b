//! Error types shared by the auth workflow and the HTTP layer.

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::users::StoreError;

/// Key for errors that belong to the request as a whole.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Field name → messages, serialized as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Failures of the registration/login/profile workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error("incorrect email or password")]
    InvalidCredentials,
    #[error("account is deactivated")]
    AccountDisabled,
    #[error("user not found")]
    UserNotFound,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("store error: {0}")]
    Store(StoreError),
    #[error("token error: {0}")]
    Token(anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for WorkflowError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => WorkflowError::UserNotFound,
            other => WorkflowError::Store(other),
        }
    }
}

impl WorkflowError {
    /// Attach the endpoint's failure headline and turn into an HTTP error.
    pub fn into_api(self, message: &'static str) -> ApiError {
        match self {
            WorkflowError::Validation(errors) => ApiError::Rejected { message, errors },
            WorkflowError::InvalidCredentials => ApiError::Rejected {
                message,
                errors: FieldErrors::single(NON_FIELD_ERRORS, "Incorrect email or password."),
            },
            WorkflowError::AccountDisabled => ApiError::Rejected {
                message,
                errors: FieldErrors::single(
                    NON_FIELD_ERRORS,
                    "Account is deactivated. Please contact support.",
                ),
            },
            WorkflowError::UserNotFound => ApiError::Unauthorized("User not found".to_string()),
            WorkflowError::InvalidToken(detail) => ApiError::Unauthorized(detail),
            WorkflowError::Store(e) => ApiError::Internal(anyhow::Error::new(e)),
            WorkflowError::Token(e) | WorkflowError::Internal(e) => ApiError::Internal(e),
        }
    }
}

/// Error returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 400 `{success: false, message, errors}`
    #[error("{message}")]
    Rejected {
        message: &'static str,
        errors: FieldErrors,
    },
    /// 400 `{success: false, message, error}`
    #[error("{message}: {detail}")]
    Failed {
        message: &'static str,
        detail: String,
    },
    /// 401 `{detail}`
    #[error("{0}")]
    Unauthorized(String),
    /// 500, details only in logs
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Rejected { message, errors } => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": message, "errors": errors })),
            )
                .into_response(),
            ApiError::Failed { message, detail } => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": message, "error": detail })),
            )
                .into_response(),
            ApiError::Unauthorized(detail) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "detail": detail }))).into_response()
            }
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "success": false, "message": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_serialize_as_object() {
        let mut errors = FieldErrors::new();
        errors.add("password", "too short");
        errors.add("password", "second");
        errors.add("email", "taken");
        let value = serde_json::to_value(&errors).unwrap();
        assert_eq!(value, json!({ "email": ["taken"], "password": ["too short", "second"] }));
    }

    #[test]
    fn credentials_error_is_generic() {
        let api = WorkflowError::InvalidCredentials.into_api("Login failed");
        match api {
            ApiError::Rejected { errors, .. } => {
                let messages = errors.get(NON_FIELD_ERRORS).unwrap();
                assert_eq!(messages, ["Incorrect email or password.".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn status_codes() {
        let rejected = ApiError::Rejected {
            message: "x",
            errors: FieldErrors::single("a", "b"),
        };
        assert_eq!(rejected.into_response().status(), StatusCode::BAD_REQUEST);
        let unauthorized = ApiError::Unauthorized("no".into());
        assert_eq!(unauthorized.into_response().status(), StatusCode::UNAUTHORIZED);
        let internal = ApiError::Internal(anyhow::anyhow!("boom"));
        assert_eq!(
            internal.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
