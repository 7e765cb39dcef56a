//! Per-property lookups with a time-to-live.

use std::future::Future;
use std::time::Duration;

use engine_core::Result;
use moka::future::Cache;
use tokio::sync::Mutex;

const CACHE_MAX_CAPACITY: u64 = 8_096;

/// Caches one registry's answers per property.
///
/// Lookups hit the cache without locking; a miss takes the lock, checks
/// again and only then asks the registry.
pub struct PropertyCache<V> {
    cache: Cache<String, V>,
    lock: Mutex<()>,
}

impl<V: Clone + Send + Sync + 'static> PropertyCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(CACHE_MAX_CAPACITY)
                .time_to_live(ttl)
                .build(),
            lock: Mutex::new(()),
        }
    }

    pub async fn get_or_load<F>(&self, property_id: &str, load: F) -> Result<V>
    where
        F: FnOnce(&str) -> Result<V>,
    {
        self.get_or_load_async(property_id, move |id: String| {
            std::future::ready(load(&id))
        })
        .await
    }

    /// Like [`get_or_load`](Self::get_or_load), for loaders that do I/O.
    /// Concurrent misses wait for the first load instead of repeating it.
    pub async fn get_or_load_async<F, Fut>(&self, property_id: &str, load: F) -> Result<V>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.cache.get(property_id).await {
            return Ok(value);
        }

        let _guard = self.lock.lock().await;
        if let Some(value) = self.cache.get(property_id).await {
            return Ok(value);
        }

        let value = load(property_id.to_string()).await?;
        self.cache
            .insert(property_id.to_string(), value.clone())
            .await;
        Ok(value)
    }
}
