use sqlx::SqlitePool;
use tokio::sync::{Mutex, RwLock};

use super::{connect, open_pool, ConnectionError};

/// Which database a caller wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    /// The configured target, served from the shared cache.
    Configured,
    /// An ad-hoc target. Never cached.
    Explicit(String),
}

impl ConnectionTarget {
    /// `Explicit` when an override is given, otherwise `Configured`.
    pub fn from_override(target: Option<&str>) -> Self {
        match target.map(str::trim).filter(|t| !t.is_empty()) {
            Some(target) => ConnectionTarget::Explicit(target.to_string()),
            None => ConnectionTarget::Configured,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ConnectionHandle {
    Shared(SqlitePool),
    /// Owned by the caller, who must `release` it.
    Isolated(SqlitePool),
}

impl ConnectionHandle {
    pub fn pool(&self) -> &SqlitePool {
        match self {
            ConnectionHandle::Shared(pool) | ConnectionHandle::Isolated(pool) => pool,
        }
    }

    pub fn is_isolated(&self) -> bool {
        matches!(self, ConnectionHandle::Isolated(_))
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(self.pool()).await?;
        Ok(())
    }

    /// Closes an isolated handle. Shared handles stay open for other callers.
    pub async fn release(self) {
        if let ConnectionHandle::Isolated(pool) = self {
            pool.close().await;
        }
    }
}

struct CachedPool {
    target: String,
    pool: SqlitePool,
}

/// Lazily opened, target-keyed pool cache.
///
/// One pool is kept for the configured target. Changing the target or calling
/// [`ConnectionManager::reset`] closes it; the next `acquire` opens a new one.
pub struct ConnectionManager {
    configured: RwLock<Option<String>>,
    cached: Mutex<Option<CachedPool>>,
}

impl ConnectionManager {
    pub fn new(target: Option<String>) -> Self {
        Self {
            configured: RwLock::new(target),
            cached: Mutex::new(None),
        }
    }

    pub async fn configured_target(&self) -> Option<String> {
        self.configured.read().await.clone()
    }

    pub async fn acquire(
        &self,
        target: &ConnectionTarget,
    ) -> Result<ConnectionHandle, ConnectionError> {
        match target {
            ConnectionTarget::Explicit(target) => {
                tracing::debug!(database = %target, "Opening isolated connection");
                Ok(ConnectionHandle::Isolated(connect(target).await?))
            }
            ConnectionTarget::Configured => {
                let target = self
                    .configured_target()
                    .await
                    .ok_or(ConnectionError::NotConfigured)?;
                self.shared(&target).await.map(ConnectionHandle::Shared)
            }
        }
    }

    async fn shared(&self, target: &str) -> Result<SqlitePool, ConnectionError> {
        let mut cached = self.cached.lock().await;

        if let Some(entry) = cached.as_ref() {
            if entry.target == target && !entry.pool.is_closed() {
                return Ok(entry.pool.clone());
            }
        }

        if let Some(old) = cached.take() {
            tracing::info!(database = %old.target, "Closing database pool for previous target");
            old.pool.close().await;
        }

        let pool = open_pool(target).await?;
        tracing::info!(database = %target, "Database pool initialised");
        *cached = Some(CachedPool {
            target: target.to_string(),
            pool: pool.clone(),
        });
        Ok(pool)
    }

    /// Drops the cached pool.
    pub async fn reset(&self) {
        if let Some(old) = self.cached.lock().await.take() {
            tracing::info!(database = %old.target, "Resetting database pool");
            old.pool.close().await;
        }
    }

    /// Points the manager at a new configured target and drops the cache.
    pub async fn reconfigure(&self, target: Option<String>) {
        *self.configured.write().await = target;
        self.reset().await;
    }
}
