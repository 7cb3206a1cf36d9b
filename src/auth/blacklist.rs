use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::{Duration as TimeDuration, OffsetDateTime};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, warn};
use uuid::Uuid;

/// Entries outlive their token by this margin before a purge may drop them.
pub const PURGE_GRACE: TimeDuration = TimeDuration::minutes(1);

/// Revoked refresh tokens, keyed by `jti`.
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Record `jti` as revoked. Returns `false` if it already was, which makes
    /// this the atomic "consume" step of refresh rotation.
    async fn revoke(&self, jti: Uuid, user_id: Uuid, expires_at: OffsetDateTime)
        -> anyhow::Result<bool>;
    async fn is_revoked(&self, jti: Uuid) -> anyhow::Result<bool>;
    /// Drop entries whose token expired more than [`PURGE_GRACE`] ago.
    async fn purge_expired(&self) -> anyhow::Result<u64>;
}

/// Periodically drop expired blacklist entries.
pub fn spawn_purge(blacklist: Arc<dyn TokenBlacklist>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match blacklist.purge_expired().await {
                Ok(purged) => debug!(purged, "token blacklist purged"),
                Err(e) => warn!(error = %e, "token blacklist purge failed"),
            }
        }
    })
}

#[derive(Clone)]
pub struct PgTokenBlacklist {
    db: PgPool,
}

impl PgTokenBlacklist {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenBlacklist for PgTokenBlacklist {
    async fn revoke(
        &self,
        jti: Uuid,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO token_blacklist (jti, user_id, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (jti) DO NOTHING
            "#,
        )
        .bind(jti)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .context("insert token_blacklist")?;
        Ok(result.rows_affected() == 1)
    }

    async fn is_revoked(&self, jti: Uuid) -> anyhow::Result<bool> {
        let (revoked,): (bool,) =
            sqlx::query_as(r#"SELECT EXISTS (SELECT 1 FROM token_blacklist WHERE jti = $1)"#)
                .bind(jti)
                .fetch_one(&self.db)
                .await
                .context("query token_blacklist")?;
        Ok(revoked)
    }

    async fn purge_expired(&self) -> anyhow::Result<u64> {
        let cutoff = OffsetDateTime::now_utc() - PURGE_GRACE;
        let result = sqlx::query(r#"DELETE FROM token_blacklist WHERE expires_at < $1"#)
            .bind(cutoff)
            .execute(&self.db)
            .await
            .context("purge token_blacklist")?;
        Ok(result.rows_affected())
    }
}

#[derive(Default)]
pub struct MemoryTokenBlacklist {
    revoked: Mutex<HashMap<Uuid, OffsetDateTime>>,
}

impl MemoryTokenBlacklist {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenBlacklist for MemoryTokenBlacklist {
    async fn revoke(
        &self,
        jti: Uuid,
        _user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let mut revoked = self.revoked.lock().await;
        if revoked.contains_key(&jti) {
            return Ok(false);
        }
        revoked.insert(jti, expires_at);
        Ok(true)
    }

    async fn is_revoked(&self, jti: Uuid) -> anyhow::Result<bool> {
        Ok(self.revoked.lock().await.contains_key(&jti))
    }

    async fn purge_expired(&self) -> anyhow::Result<u64> {
        let cutoff = OffsetDateTime::now_utc() - PURGE_GRACE;
        let mut revoked = self.revoked.lock().await;
        let before = revoked.len();
        revoked.retain(|_, expires_at| *expires_at >= cutoff);
        Ok((before - revoked.len()) as u64)
    }
}
