use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::error::ObserveResult;
use crate::storage::ObservabilityStorage;
use crate::types::FilterOptions;

#[derive(Debug, Clone)]
struct CachedOptions {
    options: FilterOptions,
    created_at: Instant,
}

/// Distinct filter values for dashboard dropdowns, cached per org scope.
pub struct FilterCatalog {
    storage: Arc<dyn ObservabilityStorage>,
    ttl: Duration,
    max_sessions: usize,
    cache: RwLock<HashMap<Option<String>, CachedOptions>>,
}

impl FilterCatalog {
    pub fn new(storage: Arc<dyn ObservabilityStorage>, ttl: Duration, max_sessions: usize) -> Self {
        Self {
            storage,
            ttl,
            max_sessions,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn options(&self, org_id: Option<&str>) -> ObserveResult<FilterOptions> {
        let key = org_id.map(str::to_string);

        if !self.ttl.is_zero() {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(&key) {
                if cached.created_at.elapsed() < self.ttl {
                    log::debug!("filter catalog cache hit for scope {:?}", key);
                    return Ok(cached.options.clone());
                }
            }
        }

        let options = self
            .storage
            .observed_values(org_id, self.max_sessions)
            .await?;

        if !self.ttl.is_zero() {
            let mut cache = self.cache.write().await;
            cache.insert(
                key,
                CachedOptions {
                    options: options.clone(),
                    created_at: Instant::now(),
                },
            );
        }

        Ok(options)
    }

    /// Drop every cached scope. Called after writes that may add new values.
    pub async fn invalidate(&self) {
        self.cache.write().await.clear();
    }
}
