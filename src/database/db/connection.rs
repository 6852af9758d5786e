use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "sqlite://./household_budget.db";

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub busy_timeout: Duration,     // how long a writer waits for the household lock
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 5,
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

impl DbConfig {
    /// Reads DATABASE_URL, DB_MAX_CONNECTIONS and DB_BUSY_TIMEOUT_MS.
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_connections),
            busy_timeout: env::var("DB_BUSY_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.busy_timeout),
        }
    }

    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }
}

pub async fn get_db_pool(config: &DbConfig) -> Result<Pool<Sqlite>, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(config.busy_timeout);

    log::debug!(
        "opening sqlite pool at {} (max_connections={})",
        config.database_url,
        config.max_connections
    );

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
}
