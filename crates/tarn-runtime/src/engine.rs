//! Engine context shared by stores.
//!
//! An [`Engine`] carries the configuration, the module cache and the
//! statistics counters. It replaces process-wide state: every store is
//! created from an engine and reports into it. Cloning is cheap and clones
//! share everything.

use crate::cache::ModuleCache;
use crate::module::Module;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tarn_core::stats::{EngineStats, StatsProvider};
use tarn_core::{EngineConfig, Result};

#[derive(Default)]
struct Counters {
    modules_decoded: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    instances_created: AtomicU64,
    instantiation_failures: AtomicU64,
    invocations: AtomicU64,
    traps: AtomicU64,
    instructions_executed: AtomicU64,
}

struct EngineInner {
    config: EngineConfig,
    cache: Option<ModuleCache>,
    counters: Counters,
}

/// Shared engine context.
///
/// # Examples
///
/// ```
/// use tarn_runtime::Engine;
/// use tarn_core::EngineConfig;
///
/// let engine = Engine::new(EngineConfig::strict()).unwrap();
/// let bytes = wat::parse_str("(module)").unwrap();
/// let a = engine.decode(&bytes).unwrap();
/// let b = engine.decode(&bytes).unwrap();
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("cache", &self.inner.cache)
            .finish_non_exhaustive()
    }
}

impl Default for Engine {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            inner: Arc::new(EngineInner {
                cache: ModuleCache::new(config.module_cache_capacity),
                config,
                counters: Counters::default(),
            }),
        }
    }
}

impl Engine {
    /// Creates an engine from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](tarn_core::Error::Config) if the
    /// configuration is invalid.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        tracing::debug!(
            max_call_depth = config.max_call_depth,
            memory_limit_bytes = config.memory_limit_bytes,
            cache = config.module_cache_capacity,
            "engine created"
        );
        Ok(Self {
            inner: Arc::new(EngineInner {
                cache: ModuleCache::new(config.module_cache_capacity),
                config,
                counters: Counters::default(),
            }),
        })
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// The module cache, if enabled.
    #[must_use]
    pub fn cache(&self) -> Option<&ModuleCache> {
        self.inner.cache.as_ref()
    }

    /// Decodes a module, reusing a cached copy of identical bytes.
    ///
    /// # Errors
    ///
    /// Returns the parse or validation error of a malformed module.
    pub fn decode(&self, bytes: &[u8]) -> Result<Arc<Module>> {
        let counters = &self.inner.counters;
        let Some(cache) = &self.inner.cache else {
            let module = Arc::new(crate::decode::decode(bytes)?);
            counters.modules_decoded.fetch_add(1, Ordering::Relaxed);
            return Ok(module);
        };

        let key = ModuleCache::cache_key_for_code(bytes);
        if let Some(module) = cache.get(&key) {
            counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %key, "module cache hit");
            return Ok(module);
        }
        counters.cache_misses.fetch_add(1, Ordering::Relaxed);
        let module = Arc::new(crate::decode::decode(bytes)?);
        counters.modules_decoded.fetch_add(1, Ordering::Relaxed);
        cache.insert(key, Arc::clone(&module));
        Ok(module)
    }

    pub(crate) fn record_instantiation(&self, ok: bool) {
        let counters = &self.inner.counters;
        if ok {
            counters.instances_created.fetch_add(1, Ordering::Relaxed);
        } else {
            counters
                .instantiation_failures
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_invocation(&self) {
        self.inner
            .counters
            .invocations
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_trap(&self) {
        self.inner.counters.traps.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_instructions(&self, count: u64) {
        self.inner
            .counters
            .instructions_executed
            .fetch_add(count, Ordering::Relaxed);
    }
}

impl StatsProvider for Engine {
    type Stats = EngineStats;

    fn capture_stats(&self) -> Self::Stats {
        let c = &self.inner.counters;
        EngineStats {
            snapshot_time: chrono::Utc::now(),
            modules_decoded: c.modules_decoded.load(Ordering::Relaxed),
            cache_hits: c.cache_hits.load(Ordering::Relaxed),
            cache_misses: c.cache_misses.load(Ordering::Relaxed),
            instances_created: c.instances_created.load(Ordering::Relaxed),
            instantiation_failures: c.instantiation_failures.load(Ordering::Relaxed),
            invocations: c.invocations.load(Ordering::Relaxed),
            traps: c.traps.load(Ordering::Relaxed),
            instructions_executed: c.instructions_executed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarn_core::EngineConfigBuilder;

    #[test]
    fn test_cache_hits_are_counted() {
        let engine = Engine::default();
        let bytes = wat::parse_str("(module (func))").unwrap();
        engine.decode(&bytes).unwrap();
        engine.decode(&bytes).unwrap();
        let stats = engine.capture_stats();
        assert_eq!(stats.modules_decoded, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
    }

    #[test]
    fn test_disabled_cache_decodes_every_time() {
        let config = EngineConfigBuilder::default()
            .module_cache_capacity(0)
            .build()
            .unwrap();
        let engine = Engine::new(config).unwrap();
        assert!(engine.cache().is_none());
        let bytes = wat::parse_str("(module)").unwrap();
        let a = engine.decode(&bytes).unwrap();
        let b = engine.decode(&bytes).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(engine.capture_stats().modules_decoded, 2);
    }

    #[test]
    fn test_decode_error_not_cached() {
        let engine = Engine::default();
        assert!(engine.decode(b"garbage").is_err());
        assert_eq!(engine.cache().map(ModuleCache::len), Some(0));
    }
}
