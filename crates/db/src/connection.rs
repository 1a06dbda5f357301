//! SQLite pool construction.
//!
//! Every pool runs with foreign keys on, WAL journaling, and a busy
//! timeout so concurrent writers queue instead of erroring out.

use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use guildhall_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Opens the pool described by the `[database]` section of the
/// application configuration.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

/// Pool constructor with explicit settings, for callers that want a
/// throwaway database (tests mostly use a single in-memory connection).
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

#[cfg(test)]
mod tests {
    use guildhall_core::config::DatabaseConfig;

    use super::connect;

    #[tokio::test]
    async fn connect_opens_the_pool_described_by_the_config() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            timeout_secs: 5,
        };
        let pool = connect(&config).await.expect("connect");
        sqlx::query("SELECT 1").execute(&pool).await.expect("ping");
    }
}
