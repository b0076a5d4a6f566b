use std::time::Duration;

use fernwood_core::config::DatabaseConfig;
use sqlx::sqlite::SqlitePoolOptions;

pub type DbPool = sqlx::SqlitePool;

/// How the SQLite pool is opened. The server and CLI derive one from
/// [`DatabaseConfig`]; tests build one directly against `sqlite::memory:`.
#[derive(Clone, Debug)]
pub struct PoolSettings {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// How long a statement waits on a locked database before failing.
    /// Chat-log writes and catalog reads share the file.
    pub busy_timeout: Duration,
}

impl PoolSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_millis(5_000),
        }
    }
}

impl From<&DatabaseConfig> for PoolSettings {
    fn from(config: &DatabaseConfig) -> Self {
        let mut settings = Self::new(config.url.clone());
        settings.max_connections = config.max_connections;
        settings.acquire_timeout = Duration::from_secs(config.timeout_secs);
        settings
    }
}

pub async fn connect(settings: &PoolSettings) -> Result<DbPool, sqlx::Error> {
    let busy_timeout_ms = settings.busy_timeout.as_millis().min(u128::from(u32::MAX)) as u32;
    SqlitePoolOptions::new()
        .max_connections(settings.max_connections.max(1))
        .acquire_timeout(settings.acquire_timeout.max(Duration::from_secs(1)))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                let busy = format!("PRAGMA busy_timeout = {busy_timeout_ms}");
                sqlx::query(&busy).execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(&settings.url)
        .await
}

/// In-memory / ad-hoc convenience used throughout the test suites.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let mut settings = PoolSettings::new(database_url);
    settings.max_connections = max_connections;
    settings.acquire_timeout = Duration::from_secs(timeout_secs);
    connect(&settings).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fernwood_core::config::DatabaseConfig;

    use super::{connect, PoolSettings};

    #[test]
    fn settings_derive_from_database_config() {
        let config = DatabaseConfig {
            url: "sqlite://fernwood.db".to_string(),
            max_connections: 8,
            timeout_secs: 12,
        };
        let settings = PoolSettings::from(&config);
        assert_eq!(settings.url, "sqlite://fernwood.db");
        assert_eq!(settings.max_connections, 8);
        assert_eq!(settings.acquire_timeout, Duration::from_secs(12));
        assert_eq!(settings.busy_timeout, Duration::from_millis(5_000));
    }

    #[tokio::test]
    async fn pool_applies_configured_busy_timeout() {
        let mut settings = PoolSettings::new("sqlite::memory:");
        settings.max_connections = 1;
        settings.busy_timeout = Duration::from_millis(1_250);

        let pool = connect(&settings).await.expect("pool should connect");
        let timeout: i64 =
            sqlx::query_scalar("PRAGMA busy_timeout").fetch_one(&pool).await.expect("pragma");
        assert_eq!(timeout, 1_250);
    }
}
