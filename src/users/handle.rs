use tracing::{debug, warn};
use uuid::Uuid;

use crate::users::{
    repo::UserStore,
    repo_types::{local_part, NewUser, StoreError, UniqueField, User},
};

/// Upper bound on insert attempts lost to concurrent registrations.
const MAX_INSERT_ATTEMPTS: usize = 32;

const FALLBACK_BASE: &str = "user";

/// Width of the `handle` column.
pub const HANDLE_MAX_LEN: usize = 150;
/// Room left for the numeric suffix (`u32::MAX` has ten digits).
const HANDLE_BASE_MAX_LEN: usize = HANDLE_MAX_LEN - 10;

/// Handle base for an email: its local part restricted to `[a-z0-9._-]`.
pub fn handle_base(email: &str) -> String {
    let base: String = local_part(email)
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
        .take(HANDLE_BASE_MAX_LEN)
        .collect();
    if base.is_empty() {
        FALLBACK_BASE.to_string()
    } else {
        base
    }
}

/// Ascending candidate sequence: `base`, `base1`, `base2`, ...
#[derive(Debug, Clone)]
pub struct HandleCandidates {
    base: String,
    next: u32,
}

impl HandleCandidates {
    pub fn for_email(email: &str) -> Self {
        Self {
            base: handle_base(email),
            next: 0,
        }
    }
}

impl Iterator for HandleCandidates {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let counter = self.next;
        self.next = self.next.checked_add(1)?;
        Some(if counter == 0 {
            self.base.clone()
        } else {
            format!("{}{}", self.base, counter)
        })
    }
}

/// Advance `candidates` to the first handle no other record holds.
/// `exclude` is the record being re-saved, whose own row never counts as a collision.
pub async fn next_free_handle(
    store: &dyn UserStore,
    candidates: &mut HandleCandidates,
    exclude: Option<Uuid>,
) -> Result<String, StoreError> {
    for candidate in candidates.by_ref() {
        if !store.handle_taken(&candidate, exclude).await? {
            return Ok(candidate);
        }
        debug!(handle = %candidate, "handle taken");
    }
    Err(StoreError::Conflict(UniqueField::Handle))
}

/// Handle for an existing record re-saved without one.
pub async fn derive_handle(
    store: &dyn UserStore,
    email: &str,
    exclude: Option<Uuid>,
) -> Result<String, StoreError> {
    next_free_handle(store, &mut HandleCandidates::for_email(email), exclude).await
}

/// Insert `user` under the first free handle derived from its email.
/// A handle conflict raised by the store at insert time means a concurrent
/// registration took the candidate; selection resumes from the next counter.
pub async fn insert_with_handle(store: &dyn UserStore, user: &NewUser) -> Result<User, StoreError> {
    let mut candidates = HandleCandidates::for_email(&user.email);
    for _ in 0..MAX_INSERT_ATTEMPTS {
        let handle = next_free_handle(store, &mut candidates, None).await?;
        match store.insert(&handle, user).await {
            Err(StoreError::Conflict(UniqueField::Handle)) => {
                warn!(handle = %handle, "handle claimed concurrently; retrying");
            }
            other => return other,
        }
    }
    Err(StoreError::Conflict(UniqueField::Handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::memory::MemoryUserStore;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            password_hash: "hash".into(),
            given_name: None,
            family_name: None,
            phone: None,
            license_number: None,
            specialty: None,
            is_professional: false,
        }
    }

    #[test]
    fn candidates_ascend_from_bare_base() {
        let got: Vec<String> = HandleCandidates::for_email("jane@x.com").take(4).collect();
        assert_eq!(got, vec!["jane", "jane1", "jane2", "jane3"]);
    }

    #[test]
    fn base_keeps_dots_and_drops_other_symbols() {
        assert_eq!(handle_base("jane.doe@x.com"), "jane.doe");
        assert_eq!(handle_base("Jane+Tag@x.com"), "janetag");
        assert_eq!(handle_base("josé_1-a@x.com"), "jos_1-a");
        assert_eq!(handle_base("++@x.com"), "user");
    }

    #[test]
    fn long_local_part_leaves_room_for_suffix() {
        let email = format!("{}@x.com", "a".repeat(240));
        let base = handle_base(&email);
        assert_eq!(base.len(), HANDLE_BASE_MAX_LEN);
        let suffixed = HandleCandidates::for_email(&email).nth(1).unwrap();
        assert!(suffixed.len() <= HANDLE_MAX_LEN);
        assert!(format!("{}{}", base, u32::MAX).len() <= HANDLE_MAX_LEN);
    }

    #[tokio::test]
    async fn same_local_part_on_other_domains_gets_suffixes() {
        let store = MemoryUserStore::new();
        let a = insert_with_handle(&store, &new_user("local@a.com")).await.unwrap();
        let b = insert_with_handle(&store, &new_user("local@b.com")).await.unwrap();
        let c = insert_with_handle(&store, &new_user("local@c.com")).await.unwrap();
        assert_eq!(a.handle, "local");
        assert_eq!(b.handle, "local1");
        assert_eq!(c.handle, "local2");
    }

    #[tokio::test]
    async fn suffix_skips_to_next_free_integer() {
        let store = MemoryUserStore::new();
        store.insert("local", &new_user("local@a.com")).await.unwrap();
        store.insert("local1", &new_user("other@a.com")).await.unwrap();
        let handle = derive_handle(&store, "local@z.com", None).await.unwrap();
        assert_eq!(handle, "local2");
    }

    #[tokio::test]
    async fn re_deriving_for_own_record_keeps_handle() {
        let store = MemoryUserStore::new();
        let user = insert_with_handle(&store, &new_user("jane@x.com")).await.unwrap();
        let handle = derive_handle(&store, &user.email, Some(user.id)).await.unwrap();
        assert_eq!(handle, "jane");

        let saved = store.update(&user).await.unwrap();
        assert_eq!(saved.handle, "jane");
    }
}
