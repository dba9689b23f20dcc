use std::sync::Arc;

use anyhow::Context;
use search_common::connections::{CacheHandler, Database};
use search_common::{SearchClient, Settings};

/// Shared handles of the API server. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub search: Arc<SearchClient>,
    // None when the section has no address
    pub cache: Option<Arc<CacheHandler>>,
    pub db: Option<Arc<Database>>,
}

impl AppState {
    /// Builds every backend handle from `settings`.
    ///
    /// The search client is required; sniffing, when enabled, needs a
    /// reachable cluster. Cache and database connect lazily and are left out
    /// when their section names no address.
    pub async fn build(settings: Arc<Settings>) -> anyhow::Result<Self> {
        let search = SearchClient::from_settings(&settings.elastic())
            .build()
            .await
            .context("failed to build search client")?;

        let redis = settings.redis();
        let cache = if redis.address.is_empty() {
            tracing::warn!("redis address not configured, cache disabled");
            None
        } else {
            Some(Arc::new(
                CacheHandler::from_settings(&redis).context("invalid redis settings")?,
            ))
        };

        let mysql = settings.mysql();
        let db = if mysql.address.is_empty() {
            tracing::warn!("mysql address not configured, database disabled");
            None
        } else {
            Some(Arc::new(Database::new(&mysql)))
        };

        Ok(Self::with_backends(settings, search, cache, db))
    }

    pub fn with_backends(
        settings: Arc<Settings>,
        search: SearchClient,
        cache: Option<Arc<CacheHandler>>,
        db: Option<Arc<Database>>,
    ) -> Self {
        Self {
            settings,
            search: Arc::new(search),
            cache,
            db,
        }
    }
}
