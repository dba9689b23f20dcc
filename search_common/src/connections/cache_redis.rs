//! # Redis Cache Implementation
//!
//! Provides an asynchronous wrapper for Redis key-value operations over a
//! reconnecting multiplexed connection.

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use thiserror::Error;
use tokio::sync::OnceCell;
use url::Url;

use crate::configs::RedisSettings;

/// Custom error types for cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid redis url: {0}")]
    InvalidUrl(String),
    #[error("redis error: {0}")]
    Redis(#[from] RedisError),
}

/// Builds `redis://[:password@]host:port/db` from the settings section.
pub fn redis_url(settings: &RedisSettings) -> Result<String, CacheError> {
    let raw = format!(
        "redis://{}:{}/{}",
        settings.address, settings.port, settings.database
    );
    let mut url = Url::parse(&raw).map_err(|e| CacheError::InvalidUrl(format!("{raw}: {e}")))?;
    if !settings.password.is_empty() {
        url.set_password(Some(&settings.password))
            .map_err(|_| CacheError::InvalidUrl(raw.clone()))?;
    }
    Ok(url.into())
}

/// A handler for Redis cache interactions.
pub struct CacheHandler {
    /// The internal Redis client instance.
    client: Client,
    conn: OnceCell<ConnectionManager>,
}

impl CacheHandler {
    /// Creates a new CacheHandler from a connection string. No connection is
    /// opened until the first command.
    ///
    /// # Arguments
    /// * `url` - The redis URL (e.g., "redis://127.0.0.1:6379/0").
    pub fn new(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url)?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
        })
    }

    /// Creates a handler from the `redis` settings section.
    pub fn from_settings(settings: &RedisSettings) -> Result<Self, CacheError> {
        Self::new(&redis_url(settings)?)
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let conn = self
            .conn
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await?;
        Ok(conn.clone())
    }

    /// Round-trips a `PING`.
    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// Stores a string value in the cache.
    pub async fn set_string(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    /// Stores a string value that expires after `seconds`.
    pub async fn set_string_ex(&self, key: &str, value: &str, seconds: u64) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: () = conn.set_ex(key, value, seconds).await?;
        Ok(())
    }

    /// Reads a string value; `None` when the key does not exist.
    pub async fn get_string(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        Ok(conn.get(key).await?)
    }
}
