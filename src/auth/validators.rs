use lazy_static::lazy_static;
use regex::Regex;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const LICENSE_MIN_LEN: usize = 4;
pub const LICENSE_MAX_LEN: usize = 10;

pub const EMAIL_MAX_LEN: usize = 254;
pub const GIVEN_NAME_MAX_LEN: usize = 30;
pub const FAMILY_NAME_MAX_LEN: usize = 30;
pub const PHONE_MAX_LEN: usize = 15;
pub const SPECIALTY_MAX_LEN: usize = 100;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref LICENSE_STRIP_RE: Regex = Regex::new(r"[^0-9A-Z]").unwrap();
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Password clauses, in the order they are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordRule {
    MinLength,
    Uppercase,
    Digit,
}

impl PasswordRule {
    pub fn message(self) -> &'static str {
        match self {
            PasswordRule::MinLength => "Password must be at least 8 characters long.",
            PasswordRule::Uppercase => "Password must contain at least one uppercase letter.",
            PasswordRule::Digit => "Password must contain at least one digit.",
        }
    }
}

/// Every clause `password` violates.
pub fn password_violations(password: &str) -> Vec<PasswordRule> {
    let mut violations = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        violations.push(PasswordRule::MinLength);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        violations.push(PasswordRule::Uppercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push(PasswordRule::Digit);
    }
    violations
}

/// First failing clause's message, if any.
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    match password_violations(password).first() {
        Some(rule) => Err(rule.message()),
        None => Ok(()),
    }
}

/// Upper-case, then drop everything outside `[0-9A-Z]`.
pub fn normalize_license(raw: &str) -> String {
    LICENSE_STRIP_RE
        .replace_all(&raw.to_uppercase(), "")
        .into_owned()
}

/// `Ok(None)` for an empty value, `Ok(Some(normalized))` when the normalized
/// form has an accepted length. Uniqueness is checked by the caller.
pub fn validate_license_format(raw: &str) -> Result<Option<String>, String> {
    if raw.is_empty() {
        return Ok(None);
    }
    let normalized = normalize_license(raw);
    let len = normalized.len();
    if !(LICENSE_MIN_LEN..=LICENSE_MAX_LEN).contains(&len) {
        return Err(format!(
            "License number must have between {} and {} characters.",
            LICENSE_MIN_LEN, LICENSE_MAX_LEN
        ));
    }
    Ok(Some(normalized))
}

pub fn check_max_len(value: &str, max: usize) -> Result<(), String> {
    if value.chars().count() > max {
        Err(format!("Ensure this field has no more than {} characters.", max))
    } else {
        Ok(())
    }
}

/// Trim and map empty input to `None`.
pub fn clean_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
