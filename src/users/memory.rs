use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::users::{
    repo::UserStore,
    repo_types::{NewUser, StoreError, UniqueField, User},
};

/// In-process identity store. Every write checks the unique columns and
/// applies the change under a single write lock.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.users.read().await.len()
    }

    /// Replace a stored row wholesale. Used to seed state such as inactive accounts.
    pub async fn put(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }
}

fn conflict(
    users: &HashMap<Uuid, User>,
    id: Uuid,
    email: &str,
    handle: &str,
    license: Option<&str>,
) -> Option<UniqueField> {
    users.values().filter(|u| u.id != id).find_map(|u| {
        if u.email == email {
            Some(UniqueField::Email)
        } else if u.handle == handle {
            Some(UniqueField::Handle)
        } else if license.is_some() && u.license_number.as_deref() == license {
            Some(UniqueField::LicenseNumber)
        } else {
            None
        }
    })
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_handle(&self, handle: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.handle == handle).cloned())
    }

    async fn handle_taken(&self, handle: &str, exclude: Option<Uuid>) -> Result<bool, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .any(|u| u.handle == handle && Some(u.id) != exclude))
    }

    async fn license_taken(&self, license: &str, exclude: Option<Uuid>) -> Result<bool, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .any(|u| u.license_number.as_deref() == Some(license) && Some(u.id) != exclude))
    }

    async fn insert(&self, handle: &str, user: &NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        let id = Uuid::new_v4();
        if let Some(field) = conflict(
            &users,
            id,
            &user.email,
            handle,
            user.license_number.as_deref(),
        ) {
            return Err(StoreError::Conflict(field));
        }
        let now = OffsetDateTime::now_utc();
        let row = User {
            id,
            email: user.email.clone(),
            handle: handle.to_string(),
            password_hash: user.password_hash.clone(),
            given_name: user.given_name.clone(),
            family_name: user.family_name.clone(),
            phone: user.phone.clone(),
            license_number: user.license_number.clone(),
            specialty: user.specialty.clone(),
            is_professional: user.is_professional,
            is_active: true,
            last_login: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(id, row.clone());
        Ok(row)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(StoreError::NotFound);
        }
        if let Some(field) = conflict(
            &users,
            user.id,
            &user.email,
            &user.handle,
            user.license_number.as_deref(),
        ) {
            return Err(StoreError::Conflict(field));
        }
        let stored = users.get_mut(&user.id).ok_or(StoreError::NotFound)?;
        stored.handle = user.handle.clone();
        stored.given_name = user.given_name.clone();
        stored.family_name = user.family_name.clone();
        stored.phone = user.phone.clone();
        stored.license_number = user.license_number.clone();
        stored.specialty = user.specialty.clone();
        stored.is_professional = user.is_professional;
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(stored.clone())
    }

    async fn set_professional(&self, id: Uuid, value: bool) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        let stored = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        stored.is_professional = value;
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(stored.clone())
    }

    async fn record_login(&self, id: Uuid) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        let stored = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        let now = OffsetDateTime::now_utc();
        stored.last_login = Some(now);
        stored.updated_at = now;
        Ok(stored.clone())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
