mod connection;
mod word_repo;

pub use connection::{ConnectionHandle, ConnectionManager, ConnectionTarget};
pub use word_repo::{RepositoryError, SaveOutcome, SaveStatus, WordRepository};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("No database target configured")]
    NotConfigured,

    #[error("Failed to create database directory {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to connect to {target}: {source}")]
    Connect { target: String, source: sqlx::Error },

    #[error("Failed to migrate {target}: {source}")]
    Migrate {
        target: String,
        source: sqlx::migrate::MigrateError,
    },
}

/// Turns a connection target into a SQLite URL.
///
/// `sqlite:` URLs are used as given. Anything else is a file path. With
/// `create`, its parent directory is created and the file is opened
/// read-write-create; without it the file must already exist.
pub fn resolve_target(target: &str, create: bool) -> Result<String, ConnectionError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(ConnectionError::NotConfigured);
    }
    if target.starts_with("sqlite:") {
        return Ok(target.to_string());
    }

    let path = Path::new(target);
    if !create {
        return Ok(format!("sqlite:{}?mode=rw", path.display()));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConnectionError::Io(parent.to_path_buf(), e))?;
        }
    }
    Ok(format!("sqlite:{}?mode=rwc", path.display()))
}

/// Connects to an existing database without touching the filesystem or its
/// schema.
pub async fn connect(target: &str) -> Result<SqlitePool, ConnectionError> {
    let url = resolve_target(target, false)?;
    connect_url(target, &url).await
}

async fn connect_url(target: &str, url: &str) -> Result<SqlitePool, ConnectionError> {
    let connect_err = |source| ConnectionError::Connect {
        target: target.to_string(),
        source,
    };

    let options = SqliteConnectOptions::from_str(url)
        .map_err(connect_err)?
        .foreign_keys(true);

    // Every connection to an in-memory database sees its own database.
    let max_connections = if url.contains(":memory:") { 1 } else { 5 };

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(connect_err)
}

/// Connects to a target and brings its schema up to date.
pub async fn open_pool(target: &str) -> Result<SqlitePool, ConnectionError> {
    let url = resolve_target(target, true)?;
    let pool = connect_url(target, &url).await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|source| ConnectionError::Migrate {
            target: target.to_string(),
            source,
        })?;

    tracing::info!(database = %target, "Database ready");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_pool_creates_tables() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("nested/test.db");

        let pool = open_pool(db_path.to_str().unwrap()).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let table_names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        for table in ["words", "etymologies", "cognates", "examples", "synonyms", "user_requests"] {
            assert!(table_names.contains(&table), "missing table {}", table);
        }
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(
            resolve_target("sqlite::memory:", true).unwrap(),
            "sqlite::memory:".to_string()
        );

        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("a/b/words.db");
        let url = resolve_target(path.to_str().unwrap(), true).unwrap();
        assert_eq!(url, format!("sqlite:{}?mode=rwc", path.display()));
        assert!(temp_dir.path().join("a/b").is_dir());

        assert!(matches!(
            resolve_target("  ", true),
            Err(ConnectionError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_connect_missing_file_fails() {
        let temp_dir = tempdir().unwrap();
        let url = format!("sqlite:{}", temp_dir.path().join("missing.db").display());

        let result = connect(&url).await;
        assert!(matches!(result, Err(ConnectionError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_connect_missing_path_leaves_nothing_behind() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("never/existed/words.db");

        assert_eq!(
            resolve_target(path.to_str().unwrap(), false).unwrap(),
            format!("sqlite:{}?mode=rw", path.display())
        );

        let result = connect(path.to_str().unwrap()).await;
        assert!(matches!(result, Err(ConnectionError::Connect { .. })));
        assert!(!path.exists());
        assert!(!temp_dir.path().join("never").exists());
    }

    #[tokio::test]
    async fn test_connect_existing_path() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("words.db");
        open_pool(path.to_str().unwrap()).await.unwrap().close().await;

        let pool = connect(path.to_str().unwrap()).await.unwrap();
        sqlx::query("SELECT 1").execute(&pool).await.unwrap();
    }
}
