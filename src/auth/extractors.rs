use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use tracing::warn;

use crate::error::{ApiError, FieldErrors, NON_FIELD_ERRORS};

/// JSON body whose rejections (bad syntax, wrong types, missing content type)
/// come back as a 400 with field errors instead of axum's plain-text 4xx.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                warn!(status = %rejection.status(), "request body rejected");
                Err(ApiError::Rejected {
                    message: "Invalid request body",
                    errors: FieldErrors::single(NON_FIELD_ERRORS, rejection.body_text()),
                })
            }
        }
    }
}
