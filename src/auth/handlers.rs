use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            CompletionResponse, HealthFeatures, HealthResponse, LoginProfileStatus, LoginRequest,
            LoginResponse, LogoutRequest, MessageResponse, NextSteps, ProfileResponse,
            ProfileStatus, ProfileUpdateRequest, ProfileUpdateResponse, PublicUser,
            RefreshRequest, RegisterRequest, RegisterResponse, UpdatedProfileStatus,
            UserMessageResponse,
        },
        extractors::JsonBody,
        jwt::{AuthUser, JwtKeys, TokenPair},
        services::{self, Authenticated},
    },
    error::{ApiError, FieldErrors},
    state::AppState,
    users::completeness,
};

pub const SERVICE_NAME: &str = "Dr. Exys Medical API";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register/", post(register))
        .route("/login/", post(login))
        .route("/logout/", post(logout))
        .route("/token/refresh/", post(refresh))
        .route("/health/", get(health_check))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile/", get(get_profile))
        .route("/profile/update/", put(update_profile).patch(update_profile))
        .route("/profile/completion/", get(profile_completion))
        .route("/profile/mark-medical/", post(mark_medical))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let Authenticated { user, tokens } = services::register(state.store.as_ref(), &keys, payload)
        .await
        .map_err(|e| e.into_api("Registration failed"))?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: format!(
                "Welcome to the Dr. Exys medical platform, {}!",
                user.display_name()
            ),
            user: PublicUser::from(&user),
            tokens,
            next_steps: NextSteps::for_user(&user),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let Authenticated { user, tokens } = services::login(state.store.as_ref(), &keys, payload)
        .await
        .map_err(|e| e.into_api("Login failed"))?;

    let complete = completeness::is_profile_complete(&user);
    Ok(Json(LoginResponse {
        success: true,
        message: format!("Welcome back, {}!", user.display_name()),
        user: PublicUser::from(&user),
        tokens,
        profile_status: LoginProfileStatus {
            complete,
            needs_completion: !complete,
            professional: user.is_professional,
        },
    }))
}

#[instrument(skip(state, payload))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Option<JsonBody<LogoutRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let refresh = payload.and_then(|JsonBody(body)| body.refresh);

    match services::logout(state.blacklist.as_ref(), &keys, user_id, refresh.as_deref()).await {
        Ok(()) => Ok(Json(MessageResponse {
            success: true,
            message: "Logged out of the medical platform",
        })),
        Err(e) => {
            error!(error = %e, user_id = %user_id, "logout failed");
            Err(ApiError::Failed {
                message: "Logout failed",
                detail: e.to_string(),
            })
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let Some(token) = payload.refresh.filter(|t| !t.is_empty()) else {
        return Err(ApiError::Rejected {
            message: "Token refresh failed",
            errors: FieldErrors::single("refresh", "This field is required."),
        });
    };
    let keys = JwtKeys::from_ref(&state);
    let tokens = services::rotate_refresh(
        state.store.as_ref(),
        state.blacklist.as_ref(),
        &keys,
        &token,
    )
    .await
    .map_err(|e| e.into_api("Token refresh failed"))?;
    Ok(Json(tokens))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = services::load_user(state.store.as_ref(), user_id)
        .await
        .map_err(|e| e.into_api("Profile unavailable"))?;

    Ok(Json(ProfileResponse {
        success: true,
        user: PublicUser::from(&user),
        profile_status: ProfileStatus {
            complete: completeness::is_profile_complete(&user),
            professional: user.is_professional,
            display_name: user.display_name(),
            professional_title: user.professional_title(),
        },
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(payload): JsonBody<ProfileUpdateRequest>,
) -> Result<Json<ProfileUpdateResponse>, ApiError> {
    let user = services::update_profile(state.store.as_ref(), user_id, payload)
        .await
        .map_err(|e| e.into_api("Profile update failed"))?;

    Ok(Json(ProfileUpdateResponse {
        success: true,
        message: "Medical profile updated",
        user: PublicUser::from(&user),
        profile_status: UpdatedProfileStatus {
            complete: completeness::is_profile_complete(&user),
            professional: user.is_professional,
        },
    }))
}

#[instrument(skip(state))]
pub async fn profile_completion(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<CompletionResponse>, ApiError> {
    let user = services::load_user(state.store.as_ref(), user_id)
        .await
        .map_err(|e| e.into_api("Profile unavailable"))?;

    let report = completeness::evaluate(&user);
    Ok(Json(CompletionResponse {
        success: true,
        profile_complete: report.profile_complete,
        completion_percentage: report.completion_percentage,
        missing_fields: report.missing_fields,
        suggestions: report.suggestions,
    }))
}

#[instrument(skip(state))]
pub async fn mark_medical(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserMessageResponse>, ApiError> {
    let user = services::set_professional(state.store.as_ref(), user_id, true)
        .await
        .map_err(|e| e.into_api("Update failed"))?;

    Ok(Json(UserMessageResponse {
        success: true,
        message: "User marked as a healthcare professional",
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.store.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            warn!(error = %e, "database ping failed");
            "disconnected"
        }
    };
    info!(database, "health check");

    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        database,
        authentication: "email_only",
        features: HealthFeatures {
            jwt_auth: true,
            profile_completion: true,
            medical_professional_support: true,
        },
    })
}
