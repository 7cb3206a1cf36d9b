use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::users::repo_types::{NewUser, StoreError, UniqueField, User};

/// Identity store. Uniqueness of email, handle and license number is enforced
/// by the implementation at write time and reported as `StoreError::Conflict`.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_handle(&self, handle: &str) -> Result<Option<User>, StoreError>;
    async fn handle_taken(&self, handle: &str, exclude: Option<Uuid>) -> Result<bool, StoreError>;
    async fn license_taken(&self, license: &str, exclude: Option<Uuid>) -> Result<bool, StoreError>;
    async fn insert(&self, handle: &str, user: &NewUser) -> Result<User, StoreError>;
    /// Writes the mutable profile columns of `user` and refreshes `updated_at`.
    async fn update(&self, user: &User) -> Result<User, StoreError>;
    async fn set_professional(&self, id: Uuid, value: bool) -> Result<User, StoreError>;
    async fn record_login(&self, id: Uuid) -> Result<User, StoreError>;
    async fn ping(&self) -> Result<(), StoreError>;
}

const USER_COLUMNS: &str = "id, email, handle, password_hash, given_name, family_name, phone, \
     license_number, specialty, is_professional, is_active, last_login, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn taken(
        &self,
        column: &str,
        value: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM users WHERE {column} = $1 AND ($2::uuid IS NULL OR id <> $2))"
        );
        let (exists,): (bool,) = sqlx::query_as(&sql)
            .bind(value)
            .bind(exclude)
            .fetch_one(&self.db)
            .await?;
        Ok(exists)
    }
}

fn map_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            if let Some(field) = db.constraint().and_then(UniqueField::from_constraint) {
                return StoreError::Conflict(field);
            }
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_one("email", email).await
    }

    async fn find_by_handle(&self, handle: &str) -> Result<Option<User>, StoreError> {
        self.find_one("handle", handle).await
    }

    async fn handle_taken(&self, handle: &str, exclude: Option<Uuid>) -> Result<bool, StoreError> {
        self.taken("handle", handle, exclude).await
    }

    async fn license_taken(&self, license: &str, exclude: Option<Uuid>) -> Result<bool, StoreError> {
        self.taken("license_number", license, exclude).await
    }

    async fn insert(&self, handle: &str, user: &NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (id, email, handle, password_hash, given_name, family_name,
                               phone, license_number, specialty, is_professional)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(handle)
            .bind(&user.password_hash)
            .bind(&user.given_name)
            .bind(&user.family_name)
            .bind(&user.phone)
            .bind(&user.license_number)
            .bind(&user.specialty)
            .bind(user.is_professional)
            .fetch_one(&self.db)
            .await
            .map_err(map_write_error)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
               SET handle = $2, given_name = $3, family_name = $4, phone = $5,
                   license_number = $6, specialty = $7, is_professional = $8,
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.handle)
            .bind(&user.given_name)
            .bind(&user.family_name)
            .bind(&user.phone)
            .bind(&user.license_number)
            .bind(&user.specialty)
            .bind(user.is_professional)
            .fetch_optional(&self.db)
            .await
            .map_err(map_write_error)?
            .ok_or(StoreError::NotFound)
    }

    async fn set_professional(&self, id: Uuid, value: bool) -> Result<User, StoreError> {
        let sql = format!(
            "UPDATE users SET is_professional = $2, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(value)
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn record_login(&self, id: Uuid) -> Result<User, StoreError> {
        let sql = format!(
            "UPDATE users SET last_login = now(), updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}
