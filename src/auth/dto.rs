use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::jwt::TokenPair;
use crate::users::{completeness, completeness::Suggestions, User};

pub const PROFILE_UPDATE_PATH: &str = "/api/v1/auth/profile/update/";

/// Request body for user registration. Every field is optional at the
/// deserialization level so missing ones come back as field errors.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub phone: Option<String>,
    pub license_number: Option<String>,
    pub specialty: Option<String>,
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Request body for logout.
#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    pub refresh: Option<String>,
}

/// Request body for token refresh.
#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

/// Partial profile update: absent fields stay untouched, empty strings clear.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdateRequest {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub phone: Option<String>,
    pub license_number: Option<String>,
    pub specialty: Option<String>,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub handle: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub full_name: String,
    pub phone: Option<String>,
    pub license_number: Option<String>,
    pub specialty: Option<String>,
    pub is_professional: bool,
    pub profile_complete: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            handle: user.handle.clone(),
            given_name: user.given_name.clone(),
            family_name: user.family_name.clone(),
            full_name: user.full_name(),
            phone: user.phone.clone(),
            license_number: user.license_number.clone(),
            specialty: user.specialty.clone(),
            is_professional: user.is_professional,
            profile_complete: completeness::is_profile_complete(user),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NextSteps {
    pub complete_profile: bool,
    pub profile_url: &'static str,
    pub message: &'static str,
}

impl NextSteps {
    pub fn for_user(user: &User) -> Self {
        Self {
            complete_profile: !completeness::is_profile_complete(user),
            profile_url: PROFILE_UPDATE_PATH,
            message: "Complete your profile to get full access to the medical features.",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user: PublicUser,
    pub tokens: TokenPair,
    pub next_steps: NextSteps,
}

#[derive(Debug, Serialize)]
pub struct LoginProfileStatus {
    pub complete: bool,
    pub needs_completion: bool,
    pub professional: bool,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub user: PublicUser,
    pub tokens: TokenPair,
    pub profile_status: LoginProfileStatus,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ProfileStatus {
    pub complete: bool,
    pub professional: bool,
    pub display_name: String,
    pub professional_title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub user: PublicUser,
    pub profile_status: ProfileStatus,
}

#[derive(Debug, Serialize)]
pub struct UpdatedProfileStatus {
    pub complete: bool,
    pub professional: bool,
}

#[derive(Debug, Serialize)]
pub struct ProfileUpdateResponse {
    pub success: bool,
    pub message: &'static str,
    pub user: PublicUser,
    pub profile_status: UpdatedProfileStatus,
}

#[derive(Debug, Serialize)]
pub struct CompletionResponse {
    pub success: bool,
    pub profile_complete: bool,
    pub completion_percentage: u8,
    pub missing_fields: Vec<&'static str>,
    pub suggestions: Suggestions,
}

#[derive(Debug, Serialize)]
pub struct UserMessageResponse {
    pub success: bool,
    pub message: &'static str,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct HealthFeatures {
    pub jwt_auth: bool,
    pub profile_completion: bool,
    pub medical_professional_support: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    pub authentication: &'static str,
    pub features: HealthFeatures,
}
