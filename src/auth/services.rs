//! Registration, login, logout, token rotation and profile workflows.
//!
//! Every workflow validates the whole request before touching the store, so
//! a rejected request never leaves a partially written row behind.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        blacklist::TokenBlacklist,
        dto::{LoginRequest, ProfileUpdateRequest, RegisterRequest},
        jwt::{JwtKeys, TokenPair},
        password::{hash_password, verify_password},
        validators::{
            check_max_len, clean_optional, is_valid_email, normalize_email,
            validate_license_format, validate_password, EMAIL_MAX_LEN, FAMILY_NAME_MAX_LEN, GIVEN_NAME_MAX_LEN,
            PHONE_MAX_LEN, SPECIALTY_MAX_LEN,
        },
    },
    error::{FieldErrors, WorkflowError, NON_FIELD_ERRORS},
    users::{
        handle::{derive_handle, insert_with_handle},
        NewUser, StoreError, UniqueField, User, UserStore,
    },
};

const REQUIRED: &str = "This field is required.";
const INVALID_EMAIL: &str = "Enter a valid email address.";
const EMAIL_TAKEN: &str = "This email is already in use.";
const LICENSE_TAKEN: &str = "This license number is already registered.";
const PASSWORDS_DIFFER: &str = "Passwords do not match.";

/// Outcome of a successful registration or login.
#[derive(Debug)]
pub struct Authenticated {
    pub user: User,
    pub tokens: TokenPair,
}

fn required<'a>(errors: &mut FieldErrors, field: &str, value: Option<&'a str>) -> Option<&'a str> {
    match value {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            errors.add(field, REQUIRED);
            None
        }
    }
}

/// `None` when the field is absent from the request, `Some(None)` when it
/// clears the value.
fn clean_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&str>,
    max: usize,
) -> Option<Option<String>> {
    let cleaned = clean_optional(value?);
    if let Some(v) = &cleaned {
        if let Err(msg) = check_max_len(v, max) {
            errors.add(field, msg);
        }
    }
    Some(cleaned)
}

/// Normalized license, or `None` for an empty value or a recorded error.
async fn clean_license(
    store: &dyn UserStore,
    errors: &mut FieldErrors,
    raw: &str,
    exclude: Option<Uuid>,
) -> Result<Option<String>, StoreError> {
    match validate_license_format(raw.trim()) {
        Ok(Some(normalized)) => {
            if store.license_taken(&normalized, exclude).await? {
                errors.add("license_number", LICENSE_TAKEN);
                Ok(None)
            } else {
                Ok(Some(normalized))
            }
        }
        Ok(None) => Ok(None),
        Err(msg) => {
            errors.add("license_number", msg);
            Ok(None)
        }
    }
}

/// A unique constraint that fired at write time after the pre-checks passed.
fn write_conflict(e: StoreError) -> WorkflowError {
    match e {
        StoreError::Conflict(UniqueField::Email) => {
            WorkflowError::Validation(FieldErrors::single("email", EMAIL_TAKEN))
        }
        StoreError::Conflict(UniqueField::LicenseNumber) => {
            WorkflowError::Validation(FieldErrors::single("license_number", LICENSE_TAKEN))
        }
        other => other.into(),
    }
}

pub async fn register(
    store: &dyn UserStore,
    keys: &JwtKeys,
    req: RegisterRequest,
) -> Result<Authenticated, WorkflowError> {
    let mut errors = FieldErrors::new();

    let email = required(&mut errors, "email", req.email.as_deref()).map(normalize_email);
    if let Some(email) = &email {
        if let Err(msg) = check_max_len(email, EMAIL_MAX_LEN) {
            errors.add("email", msg);
        } else if !is_valid_email(email) {
            errors.add("email", INVALID_EMAIL);
        } else if store.find_by_email(email).await?.is_some() {
            errors.add("email", EMAIL_TAKEN);
        }
    }

    let password = required(&mut errors, "password", req.password.as_deref());
    if let Some(password) = password {
        if let Err(msg) = validate_password(password) {
            errors.add("password", msg);
        }
    }
    let confirm = required(&mut errors, "password_confirm", req.password_confirm.as_deref());

    let license_number = match req.license_number.as_deref() {
        Some(raw) => clean_license(store, &mut errors, raw, None).await?,
        None => None,
    };
    let given_name = clean_text(
        &mut errors,
        "given_name",
        req.given_name.as_deref(),
        GIVEN_NAME_MAX_LEN,
    )
    .flatten();
    let family_name = clean_text(
        &mut errors,
        "family_name",
        req.family_name.as_deref(),
        FAMILY_NAME_MAX_LEN,
    )
    .flatten();
    let phone = clean_text(
        &mut errors,
        "phone",
        req.phone.as_deref(),
        PHONE_MAX_LEN,
    )
    .flatten();
    let specialty = clean_text(
        &mut errors,
        "specialty",
        req.specialty.as_deref(),
        SPECIALTY_MAX_LEN,
    )
    .flatten();

    let (email, password, confirm) = match (email, password, confirm) {
        (Some(e), Some(p), Some(c)) if errors.is_empty() => (e, p, c),
        _ => {
            warn!(fields = ?errors, "registration rejected");
            return Err(WorkflowError::Validation(errors));
        }
    };
    if password != confirm {
        warn!(email = %email, "registration rejected: passwords differ");
        return Err(WorkflowError::Validation(FieldErrors::single(
            NON_FIELD_ERRORS,
            PASSWORDS_DIFFER,
        )));
    }
    debug!(email = %email, "registration validated");

    let new_user = NewUser {
        is_professional: license_number.is_some(),
        email,
        password_hash: hash_password(password)?,
        given_name,
        family_name,
        phone,
        license_number,
        specialty,
    };
    let user = insert_with_handle(store, &new_user)
        .await
        .map_err(write_conflict)?;
    debug!(user_id = %user.id, handle = %user.handle, "user persisted");

    let tokens = keys.issue_pair(user.id).map_err(WorkflowError::Token)?;
    info!(user_id = %user.id, email = %user.email, handle = %user.handle, "user registered");
    Ok(Authenticated { user, tokens })
}

pub async fn login(
    store: &dyn UserStore,
    keys: &JwtKeys,
    req: LoginRequest,
) -> Result<Authenticated, WorkflowError> {
    let mut errors = FieldErrors::new();
    let email = required(&mut errors, "email", req.email.as_deref()).map(normalize_email);
    let password = required(&mut errors, "password", req.password.as_deref());
    let (email, password) = match (email, password) {
        (Some(e), Some(p)) => (e, p),
        _ => return Err(WorkflowError::Validation(errors)),
    };

    let Some(user) = store.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(WorkflowError::InvalidCredentials);
    };
    if !verify_password(password, &user.password_hash)? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(WorkflowError::InvalidCredentials);
    }
    if !user.is_active {
        warn!(user_id = %user.id, "login to deactivated account");
        return Err(WorkflowError::AccountDisabled);
    }

    let user = store.record_login(user.id).await?;
    let tokens = keys.issue_pair(user.id).map_err(WorkflowError::Token)?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Authenticated { user, tokens })
}

/// Revoke `refresh` when given. Access tokens stay valid until they expire.
pub async fn logout(
    blacklist: &dyn TokenBlacklist,
    keys: &JwtKeys,
    user_id: Uuid,
    refresh: Option<&str>,
) -> anyhow::Result<()> {
    if let Some(token) = refresh.filter(|t| !t.is_empty()) {
        let claims = keys.verify_refresh(token)?;
        if claims.sub != user_id {
            warn!(user_id = %user_id, token_sub = %claims.sub, "logout with another user's token");
            anyhow::bail!("refresh token does not belong to the current user");
        }
        let newly = blacklist
            .revoke(claims.jti, claims.sub, claims.expires_at()?)
            .await?;
        debug!(jti = %claims.jti, newly, "refresh token revoked");
    }
    info!(user_id = %user_id, "user logged out");
    Ok(())
}

/// Consume `refresh` and issue a fresh pair. A token can be consumed once.
pub async fn rotate_refresh(
    store: &dyn UserStore,
    blacklist: &dyn TokenBlacklist,
    keys: &JwtKeys,
    refresh: &str,
) -> Result<TokenPair, WorkflowError> {
    let claims = keys
        .verify_refresh(refresh)
        .map_err(|e| WorkflowError::InvalidToken(e.to_string()))?;
    if !blacklist
        .revoke(claims.jti, claims.sub, claims.expires_at()?)
        .await?
    {
        warn!(user_id = %claims.sub, jti = %claims.jti, "refresh token reused");
        return Err(WorkflowError::InvalidToken("Token is blacklisted".into()));
    }

    let user = store
        .find_by_id(claims.sub)
        .await?
        .ok_or(WorkflowError::UserNotFound)?;
    if !user.is_active {
        return Err(WorkflowError::InvalidToken("User is inactive".into()));
    }
    let tokens = keys.issue_pair(user.id).map_err(WorkflowError::Token)?;
    debug!(user_id = %user.id, "refresh token rotated");
    Ok(tokens)
}

pub async fn load_user(store: &dyn UserStore, user_id: Uuid) -> Result<User, WorkflowError> {
    store
        .find_by_id(user_id)
        .await?
        .ok_or(WorkflowError::UserNotFound)
}

/// Merge the fields present in `req` into the stored profile.
pub async fn update_profile(
    store: &dyn UserStore,
    user_id: Uuid,
    req: ProfileUpdateRequest,
) -> Result<User, WorkflowError> {
    let mut user = load_user(store, user_id).await?;
    let mut errors = FieldErrors::new();

    let given_name = clean_text(
        &mut errors,
        "given_name",
        req.given_name.as_deref(),
        GIVEN_NAME_MAX_LEN,
    );
    let family_name = clean_text(
        &mut errors,
        "family_name",
        req.family_name.as_deref(),
        FAMILY_NAME_MAX_LEN,
    );
    let phone = clean_text(
        &mut errors,
        "phone",
        req.phone.as_deref(),
        PHONE_MAX_LEN,
    );
    let specialty = clean_text(
        &mut errors,
        "specialty",
        req.specialty.as_deref(),
        SPECIALTY_MAX_LEN,
    );
    let license_number = match req.license_number.as_deref() {
        Some(raw) => Some(clean_license(store, &mut errors, raw, Some(user.id)).await?),
        None => None,
    };
    if !errors.is_empty() {
        warn!(user_id = %user.id, fields = ?errors, "profile update rejected");
        return Err(WorkflowError::Validation(errors));
    }

    if let Some(v) = given_name {
        user.given_name = v;
    }
    if let Some(v) = family_name {
        user.family_name = v;
    }
    if let Some(v) = phone {
        user.phone = v;
    }
    if let Some(v) = specialty {
        user.specialty = v;
    }
    if let Some(v) = license_number {
        if v.is_some() {
            user.is_professional = true;
        }
        user.license_number = v;
    }

    if user.handle.is_empty() {
        user.handle = derive_handle(store, &user.email, Some(user.id)).await?;
        debug!(user_id = %user.id, handle = %user.handle, "handle derived on save");
    }

    let user = store.update(&user).await.map_err(write_conflict)?;
    info!(user_id = %user.id, email = %user.email, "profile updated");
    Ok(user)
}

/// Set or clear the professional flag. Clearing keeps the stored license number.
pub async fn set_professional(
    store: &dyn UserStore,
    user_id: Uuid,
    value: bool,
) -> Result<User, WorkflowError> {
    let user = store.set_professional(user_id, value).await?;
    if value {
        info!(user_id = %user.id, email = %user.email, "user marked as medical professional");
    } else {
        info!(user_id = %user.id, email = %user.email, "user marked as regular user");
    }
    Ok(user)
}
