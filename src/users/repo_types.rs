use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String, // lower-cased
    pub handle: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub phone: Option<String>,
    pub license_number: Option<String>, // normalized [0-9A-Z]
    pub specialty: Option<String>,
    pub is_professional: bool,
    pub is_active: bool,
    pub last_login: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Row to insert; the handle is filled in by the generator.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub phone: Option<String>,
    pub license_number: Option<String>,
    pub specialty: Option<String>,
    pub is_professional: bool,
}

/// Column that a unique constraint rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Handle,
    LicenseNumber,
}

impl UniqueField {
    pub fn from_constraint(name: &str) -> Option<Self> {
        match name {
            "users_email_key" => Some(Self::Email),
            "users_handle_key" => Some(Self::Handle),
            "users_license_number_key" => Some(Self::LicenseNumber),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated on {0:?}")]
    Conflict(UniqueField),
    #[error("user not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

impl User {
    pub fn has_given_name(&self) -> bool {
        non_empty(&self.given_name)
    }

    pub fn has_family_name(&self) -> bool {
        non_empty(&self.family_name)
    }

    pub fn has_license_number(&self) -> bool {
        non_empty(&self.license_number)
    }

    pub fn has_specialty(&self) -> bool {
        non_empty(&self.specialty)
    }

    pub fn has_phone(&self) -> bool {
        non_empty(&self.phone)
    }

    /// Substring of the email before `@`.
    pub fn email_local_part(&self) -> &str {
        local_part(&self.email)
    }

    /// "given family", else given name, else handle.
    pub fn full_name(&self) -> String {
        match (&self.given_name, &self.family_name) {
            (Some(given), Some(family)) if !given.is_empty() && !family.is_empty() => {
                format!("{} {}", given, family)
            }
            (Some(given), _) if !given.is_empty() => given.clone(),
            _ => self.handle.clone(),
        }
    }

    /// Name used in greetings: the given name, else the email local part.
    pub fn display_name(&self) -> String {
        match &self.given_name {
            Some(given) if !given.is_empty() => given.clone(),
            _ => self.email_local_part().to_string(),
        }
    }

    pub fn professional_title(&self) -> Option<String> {
        if self.is_professional && self.has_given_name() && self.has_family_name() {
            Some(format!("Dr(a). {}", self.full_name()))
        } else {
            None
        }
    }
}

pub fn local_part(email: &str) -> &str {
    email.split_once('@').map(|(local, _)| local).unwrap_or(email)
}

#[cfg(test)]
pub(crate) fn sample_user(email: &str, handle: &str) -> User {
    let now = OffsetDateTime::now_utc();
    User {
        id: Uuid::new_v4(),
        email: email.into(),
        handle: handle.into(),
        password_hash: "hash".into(),
        given_name: None,
        family_name: None,
        phone: None,
        license_number: None,
        specialty: None,
        is_professional: false,
        is_active: true,
        last_login: None,
        created_at: now,
        updated_at: now,
    }
}
