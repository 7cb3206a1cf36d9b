use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::blacklist::{MemoryTokenBlacklist, PgTokenBlacklist, TokenBlacklist};
use crate::config::AppConfig;
use crate::db;
use crate::users::{memory::MemoryUserStore, PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub blacklist: Arc<dyn TokenBlacklist>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Load config from the environment, connect to Postgres and migrate.
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let pool = db::connect(&config).await?;
        db::migrate(&pool).await?;
        Ok(Self::postgres(pool, config))
    }

    pub fn postgres(pool: PgPool, config: AppConfig) -> Self {
        Self {
            store: Arc::new(PgUserStore::new(pool.clone())),
            blacklist: Arc::new(PgTokenBlacklist::new(pool)),
            config: Arc::new(config),
        }
    }

    /// Fully in-process state: memory store and blacklist.
    pub fn in_memory(config: AppConfig) -> Self {
        Self {
            store: Arc::new(MemoryUserStore::new()),
            blacklist: Arc::new(MemoryTokenBlacklist::new()),
            config: Arc::new(config),
        }
    }

    pub fn from_parts(
        store: Arc<dyn UserStore>,
        blacklist: Arc<dyn TokenBlacklist>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            store,
            blacklist,
            config,
        }
    }
}
