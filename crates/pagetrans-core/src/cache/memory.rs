use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// In-process layer in front of the page cache.
///
/// Bounded by total artifact bytes rather than entry count, since a
/// single scanned page can be far larger than a text-only one.
pub struct MemoryCache {
    cache: Cache<String, Arc<Vec<u8>>>,
}

impl MemoryCache {
    pub fn new(max_mb: u64, ttl_seconds: u64) -> Self {
        let max_bytes = max_mb.saturating_mul(1024 * 1024);

        let mut builder = Cache::builder()
            .max_capacity(max_bytes)
            .weigher(|_key: &String, value: &Arc<Vec<u8>>| -> u32 {
                value.len().try_into().unwrap_or(u32::MAX)
            });

        if ttl_seconds > 0 {
            builder = builder.time_to_live(Duration::from_secs(ttl_seconds));
        }

        Self {
            cache: builder.build(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.cache.get(key).await.map(|bytes| bytes.as_ref().clone())
    }

    pub async fn insert(&self, key: String, value: Vec<u8>) {
        self.cache.insert(key, Arc::new(value)).await;
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_get_clear() {
        let cache = MemoryCache::new(1, 0);
        cache.insert("k".to_string(), vec![1, 2, 3]).await;
        assert_eq!(cache.get("k").await, Some(vec![1, 2, 3]));

        cache.clear();
        assert_eq!(cache.get("k").await, None);
    }
}
