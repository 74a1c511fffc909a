//! Cache of decoded modules.
//!
//! Decoding and validating a module is the most expensive step before
//! execution, and hosts often instantiate the same binary many times. Decoded
//! modules are immutable, so one `Arc<Module>` is shared by every instance
//! created from the same bytes. Keys are BLAKE3 hashes of the binary.
//!
//! # Examples
//!
//! ```
//! use tarn_runtime::cache::ModuleCache;
//!
//! let cache = ModuleCache::new(16).unwrap();
//! let key = ModuleCache::cache_key_for_code(b"\0asm\x01\0\0\0");
//! assert!(cache.get(&key).is_none());
//! assert!(ModuleCache::new(0).is_none());
//! ```

use crate::module::Module;
use blake3::Hasher;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cache key derived from a module binary.
///
/// # Examples
///
/// ```
/// use tarn_runtime::cache::CacheKey;
///
/// let key1 = CacheKey::new("abc123");
/// let key2 = CacheKey::new("abc123");
/// assert_eq!(key1, key2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Creates a cache key from a precomputed hash string.
    #[must_use]
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// LRU cache of decoded modules.
///
/// `Send` and `Sync`; the LRU list sits behind a `Mutex`.
pub struct ModuleCache {
    cache: Mutex<lru::LruCache<CacheKey, Arc<Module>>>,
}

impl std::fmt::Debug for ModuleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl ModuleCache {
    /// Creates a cache holding up to `capacity` modules.
    ///
    /// Returns `None` for a zero capacity, which disables caching.
    #[must_use]
    pub fn new(capacity: usize) -> Option<Self> {
        let capacity = NonZeroUsize::new(capacity)?;
        Some(Self {
            cache: Mutex::new(lru::LruCache::new(capacity)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, lru::LruCache<CacheKey, Arc<Module>>> {
        // The LRU holds no invariant a panicking holder could break.
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hashes a module binary into a cache key.
    ///
    /// # Examples
    ///
    /// ```
    /// use tarn_runtime::cache::ModuleCache;
    ///
    /// let key = ModuleCache::cache_key_for_code(b"test wasm code");
    /// assert!(key.as_str().starts_with("wasm_"));
    /// ```
    #[must_use]
    pub fn cache_key_for_code(code: &[u8]) -> CacheKey {
        let mut hasher = Hasher::new();
        hasher.update(code);
        CacheKey::new(format!("wasm_{}", hasher.finalize().to_hex()))
    }

    /// Returns a cached module and marks it recently used.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Module>> {
        self.lock().get(key).cloned()
    }

    /// Inserts a module, evicting the least recently used one when full.
    pub fn insert(&self, key: CacheKey, module: Arc<Module>) {
        let mut cache = self.lock();
        tracing::debug!(key = %key, size = cache.len() + 1, "module cached");
        cache.put(key, module);
    }

    /// Returns `true` if `key` is cached, without touching LRU order.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().contains(key)
    }

    /// Drops every cached module.
    pub fn clear(&self) {
        self.lock().clear();
        tracing::debug!("module cache cleared");
    }

    /// Number of cached modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of cached modules.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }
}
