//! # MySQL Connection Manager
//!
//! Provides a managed connection pool for MySQL using the `sqlx` crate.
//! Statement logging and the slow-statement threshold come from the `mysql`
//! settings section; the pool connects on first use.

use std::time::Duration;

use log::LevelFilter;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::ConnectOptions;
use thiserror::Error;

use crate::configs::MySqlSettings;

const MAX_CONNECTIONS: u32 = 10;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(3);

/// Custom error types for Database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),
    #[error("Query execution failed: {0}")]
    QueryError(String),
}

/// Maps the configured log level to the level statements are logged at.
///
/// Accepts names (`debug`, `info`, `warn`, `error`, `silent`) and the numeric
/// codes used by older config files: `-1` debug, `0`/`1` warn, `2`..`5` error.
pub fn statement_log_level(level: &str) -> LevelFilter {
    match level.trim().to_ascii_lowercase().as_str() {
        "debug" | "-1" => LevelFilter::Debug,
        "warn" | "warning" | "0" | "1" => LevelFilter::Warn,
        "error" | "2" | "3" | "4" | "5" => LevelFilter::Error,
        "silent" | "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Connect options built from the `mysql` settings section.
pub fn connect_options(settings: &MySqlSettings) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .host(&settings.address)
        .port(settings.port)
        .username(&settings.username)
        .password(&settings.password)
        .database(&settings.database);
    if !settings.charset.is_empty() {
        options = options.charset(&settings.charset);
    }

    let level = statement_log_level(&settings.log_level);
    options = options.log_statements(level);
    if settings.slow_time > 0 {
        options = options.log_slow_statements(LevelFilter::Warn, Duration::from_millis(settings.slow_time));
    }
    options
}

/// A wrapper around the MySQL connection pool.
pub struct Database {
    /// The underlying sqlx connection pool.
    pub pool: MySqlPool,
}

impl Database {
    /// Creates a lazily connected pool from the settings section.
    pub fn new(settings: &MySqlSettings) -> Self {
        let pool = MySqlPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_lazy_with(connect_options(settings));
        tracing::debug!(
            host = %settings.address,
            port = settings.port,
            database = %settings.database,
            "mysql pool created"
        );
        Self { pool }
    }

    /// Connects eagerly, failing fast when the server is unreachable.
    pub async fn connect(settings: &MySqlSettings) -> Result<Self, DbError> {
        let db = Self::new(settings);
        db.ping()
            .await
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(db)
    }

    /// Checks the health of the database connection by running a simple query.
    pub async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e: sqlx::Error| DbError::QueryError(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_log_level() {
        assert_eq!(statement_log_level("debug"), LevelFilter::Debug);
        assert_eq!(statement_log_level("-1"), LevelFilter::Debug);
        assert_eq!(statement_log_level("1"), LevelFilter::Warn);
        assert_eq!(statement_log_level("4"), LevelFilter::Error);
        assert_eq!(statement_log_level("Silent"), LevelFilter::Off);
        assert_eq!(statement_log_level(""), LevelFilter::Info);
    }

    #[test]
    fn test_connect_options_from_settings() {
        let settings = MySqlSettings {
            address: "db.local".into(),
            port: 3307,
            username: "root".into(),
            password: "pw".into(),
            database: "fobrain_test".into(),
            charset: "utf8mb4".into(),
            log_level: "debug".into(),
            slow_time: 15,
        };
        let options = connect_options(&settings);
        assert_eq!(options.get_host(), "db.local");
        assert_eq!(options.get_port(), 3307);
        assert_eq!(options.get_username(), "root");
        assert_eq!(options.get_database(), Some("fobrain_test"));
        assert_eq!(options.get_charset(), "utf8mb4");
    }

    #[tokio::test]
    async fn test_lazy_pool_does_not_connect() {
        let settings = MySqlSettings {
            address: "127.0.0.1".into(),
            port: 1,
            ..Default::default()
        };
        let db = Database::new(&settings);
        assert_eq!(db.pool.size(), 0);
    }
}
