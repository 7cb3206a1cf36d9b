//! Profile completeness, always computed from the current record.
//!
//! The percentage drops 25 points per missing checklist field, so it only
//! takes the values 0, 25, 50, 75 and 100.

use serde::Serialize;

use crate::users::repo_types::User;

const POINTS_PER_FIELD: u8 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Suggestions {
    pub add_name: bool,
    pub add_medical_info: bool,
    pub add_contact: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileCompletion {
    pub profile_complete: bool,
    pub completion_percentage: u8,
    pub missing_fields: Vec<&'static str>,
    pub suggestions: Suggestions,
}

pub fn is_profile_complete(user: &User) -> bool {
    user.has_given_name()
        && user.has_family_name()
        && (!user.is_professional || user.has_license_number())
}

/// Checklist fields still empty, in display order.
pub fn missing_fields(user: &User) -> Vec<&'static str> {
    let mut missing = Vec::with_capacity(4);
    if !user.has_given_name() {
        missing.push("given_name");
    }
    if !user.has_family_name() {
        missing.push("family_name");
    }
    if user.is_professional && !user.has_license_number() {
        missing.push("license_number");
    }
    if user.is_professional && !user.has_specialty() {
        missing.push("specialty");
    }
    missing
}

fn score(missing: usize) -> u8 {
    let missing = u8::try_from(missing).unwrap_or(u8::MAX);
    100u8.saturating_sub(missing.saturating_mul(POINTS_PER_FIELD))
}

pub fn completion_percentage(user: &User) -> u8 {
    score(missing_fields(user).len())
}

pub fn suggestions(user: &User) -> Suggestions {
    Suggestions {
        add_name: !user.has_given_name() || !user.has_family_name(),
        add_medical_info: user.is_professional
            && (!user.has_license_number() || !user.has_specialty()),
        add_contact: !user.has_phone(),
    }
}

pub fn evaluate(user: &User) -> ProfileCompletion {
    let missing = missing_fields(user);
    ProfileCompletion {
        profile_complete: is_profile_complete(user),
        completion_percentage: score(missing.len()),
        missing_fields: missing,
        suggestions: suggestions(user),
    }
}
