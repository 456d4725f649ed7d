//! Page-level translation cache.
//!
//! Translated single-page PDFs are stored under a [`CacheKey`] derived from
//! the page's text, so a page is sent to the translation backend at most
//! once per (document, text, translator, target language).

mod disk;
mod key;
mod memory;

pub use disk::DiskCache;
pub use key::{ARTIFACT_SUFFIX, CacheKey, DocumentIdentity};
pub use memory::MemoryCache;

use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::Result;

/// Combined cache with memory and disk layers
pub struct TranslationCache {
    memory: Option<MemoryCache>,
    disk: Option<DiskCache>,
}

impl TranslationCache {
    /// Create a new translation cache from configuration.
    ///
    /// Nothing touches the filesystem until the first write.
    pub fn new(config: &CacheConfig) -> Self {
        let memory = config
            .memory_enabled
            .then(|| MemoryCache::new(config.memory_max_mb, config.memory_ttl_seconds));

        let disk = config.disk_enabled.then(|| DiskCache::new(config.disk_dir()));

        Self { memory, disk }
    }

    /// A cache that never stores anything
    pub fn disabled() -> Self {
        Self {
            memory: None,
            disk: None,
        }
    }

    pub const fn disk(&self) -> Option<&DiskCache> {
        self.disk.as_ref()
    }

    /// Get a cached page artifact. Damaged entries read as absent.
    pub async fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let key_str = key.as_str();

        if let Some(ref memory) = self.memory
            && let Some(value) = memory.get(key_str).await
        {
            debug!("Memory cache hit for {}", key_str);
            return Some(value);
        }

        if let Some(ref disk) = self.disk
            && let Some(value) = disk.get(key_str)
        {
            debug!("Disk cache hit for {}", key_str);
            if let Some(ref memory) = self.memory {
                memory.insert(key_str.to_string(), value.clone()).await;
            }
            return Some(value);
        }

        None
    }

    /// Store a page artifact in every enabled layer.
    ///
    /// The memory layer is always updated; an error means only the durable
    /// copy was lost.
    pub async fn put(&self, key: &CacheKey, value: Vec<u8>) -> Result<()> {
        let key_str = key.as_str();

        if let Some(ref disk) = self.disk
            && let Err(e) = disk.insert(key_str, &value)
        {
            warn!("Failed to persist {}: {}", key_str, e);
            if let Some(ref memory) = self.memory {
                memory.insert(key_str.to_string(), value).await;
            }
            return Err(e);
        }

        if let Some(ref memory) = self.memory {
            memory.insert(key_str.to_string(), value).await;
        }

        Ok(())
    }

    /// Check if a key exists in cache
    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.get(key).await.is_some()
    }

    /// Number of durable entries.
    pub fn len(&self) -> usize {
        self.disk.as_ref().map_or(0, DiskCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all layers, returning how many durable entries were removed.
    pub fn clear(&self) -> Result<usize> {
        if let Some(ref memory) = self.memory {
            memory.clear();
        }

        match self.disk {
            Some(ref disk) => disk.clear(),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Lang;
    use crate::pdf::test_support::single_page_pdf;

    fn key(text: &str) -> CacheKey {
        let doc = DocumentIdentity::new(Some("t"), None, 1);
        CacheKey::fingerprint(&doc, 0, "openai", &Lang::new("en"), text)
    }

    fn disk_config(dir: &std::path::Path) -> CacheConfig {
        CacheConfig {
            disk_path: Some(dir.to_path_buf()),
            ..CacheConfig::default()
        }
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = TranslationCache::new(&disk_config(tmp.path()));
        let pdf = single_page_pdf("Hallo");

        assert!(cache.get(&key("Hallo")).await.is_none());
        cache.put(&key("Hallo"), pdf.clone()).await.unwrap();
        assert_eq!(cache.get(&key("Hallo")).await.unwrap(), pdf);
        assert!(tmp.path().join(key("Hallo").file_name()).is_file());
    }

    #[tokio::test]
    async fn test_survives_new_instance() {
        let tmp = tempfile::tempdir().unwrap();
        let pdf = single_page_pdf("Hallo");

        TranslationCache::new(&disk_config(tmp.path()))
            .put(&key("Hallo"), pdf.clone())
            .await
            .unwrap();

        let reopened = TranslationCache::new(&disk_config(tmp.path()));
        assert_eq!(reopened.get(&key("Hallo")).await.unwrap(), pdf);
    }

    #[tokio::test]
    async fn test_corrupt_disk_entry_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = TranslationCache::new(&disk_config(tmp.path()));
        std::fs::write(tmp.path().join(key("Hallo").file_name()), b"%PDF-1.5\n garbage").unwrap();

        assert!(cache.get(&key("Hallo")).await.is_none());
    }

    #[tokio::test]
    async fn test_write_failure_keeps_memory_copy() {
        let tmp = tempfile::tempdir().unwrap();
        // A regular file where the cache directory should be
        let blocked = tmp.path().join("blocked");
        std::fs::write(&blocked, b"").unwrap();
        let cache = TranslationCache::new(&disk_config(&blocked));
        let pdf = single_page_pdf("Hallo");

        assert!(cache.put(&key("Hallo"), pdf.clone()).await.is_err());
        assert_eq!(cache.get(&key("Hallo")).await.unwrap(), pdf);
    }

    #[tokio::test]
    async fn test_disabled_cache_stores_nothing() {
        let cache = TranslationCache::disabled();
        cache.put(&key("Hallo"), single_page_pdf("Hallo")).await.unwrap();
        assert!(!cache.contains(&key("Hallo")).await);
        assert_eq!(cache.clear().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_removes_disk_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = TranslationCache::new(&disk_config(tmp.path()));
        cache.put(&key("a"), single_page_pdf("a")).await.unwrap();
        cache.put(&key("b"), single_page_pdf("b")).await.unwrap();
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.clear().unwrap(), 2);
        assert!(cache.is_empty());
        assert!(cache.get(&key("a")).await.is_none());
    }
}
