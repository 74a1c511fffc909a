//! Statistics snapshots for the engine.
//!
//! Engines keep their counters in atomics and hand out [`EngineStats`]
//! snapshots through the [`StatsProvider`] trait. Snapshots are plain data:
//! serializable, cloneable, and stamped with the capture time.
//!
//! # Examples
//!
//! ```rust
//! use tarn_core::stats::{EngineStats, StatsProvider};
//!
//! struct Counter {
//!     invocations: u64,
//! }
//!
//! impl StatsProvider for Counter {
//!     type Stats = EngineStats;
//!
//!     fn capture_stats(&self) -> Self::Stats {
//!         EngineStats {
//!             invocations: self.invocations,
//!             ..EngineStats::default()
//!         }
//!     }
//! }
//!
//! let stats = Counter { invocations: 3 }.capture_stats();
//! assert_eq!(stats.invocations, 3);
//! let json = serde_json::to_string(&stats).unwrap();
//! assert!(json.contains("\"invocations\":3"));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time engine counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Timestamp when this snapshot was captured (UTC).
    pub snapshot_time: DateTime<Utc>,

    /// Modules decoded and validated, cache hits excluded.
    pub modules_decoded: u64,

    /// Decode requests answered from the module cache.
    pub cache_hits: u64,

    /// Decode requests that missed the cache.
    pub cache_misses: u64,

    /// Instances that finished instantiation successfully.
    pub instances_created: u64,

    /// Instances whose linking or initialization failed.
    pub instantiation_failures: u64,

    /// Top-level invocations started.
    pub invocations: u64,

    /// Invocations that ended in a trap.
    pub traps: u64,

    /// Instructions executed across all invocations.
    pub instructions_executed: u64,
}

impl EngineStats {
    /// Fraction of decode requests served from the cache.
    ///
    /// Returns `None` if nothing was decoded yet.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tarn_core::stats::EngineStats;
    ///
    /// let stats = EngineStats {
    ///     cache_hits: 3,
    ///     cache_misses: 1,
    ///     ..EngineStats::default()
    /// };
    /// assert_eq!(stats.cache_hit_rate(), Some(0.75));
    /// ```
    #[must_use]
    pub fn cache_hit_rate(&self) -> Option<f64> {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            return None;
        }
        Some(self.cache_hits as f64 / total as f64)
    }

    /// Fraction of invocations that trapped.
    #[must_use]
    pub fn trap_rate(&self) -> Option<f64> {
        if self.invocations == 0 {
            return None;
        }
        Some(self.traps as f64 / self.invocations as f64)
    }
}

impl Default for EngineStats {
    fn default() -> Self {
        Self {
            snapshot_time: Utc::now(),
            modules_decoded: 0,
            cache_hits: 0,
            cache_misses: 0,
            instances_created: 0,
            instantiation_failures: 0,
            invocations: 0,
            traps: 0,
            instructions_executed: 0,
        }
    }
}

/// Trait for components that can provide statistics snapshots.
pub trait StatsProvider {
    /// The statistics type produced by this provider.
    type Stats: Clone + std::fmt::Debug + Serialize;

    /// Captures a snapshot of current statistics.
    ///
    /// Must not block; monitoring code may poll it frequently.
    fn capture_stats(&self) -> Self::Stats;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_without_activity() {
        let stats = EngineStats::default();
        assert_eq!(stats.cache_hit_rate(), None);
        assert_eq!(stats.trap_rate(), None);
    }

    #[test]
    fn test_trap_rate() {
        let stats = EngineStats {
            invocations: 10,
            traps: 1,
            ..EngineStats::default()
        };
        assert_eq!(stats.trap_rate(), Some(0.1));
    }

    #[test]
    fn test_snapshot_time_is_recent() {
        assert!(EngineStats::default().snapshot_time <= Utc::now());
    }

    #[test]
    fn test_roundtrip_json() {
        let stats = EngineStats {
            modules_decoded: 2,
            instructions_executed: 1_000,
            ..EngineStats::default()
        };
        let json = serde_json::to_string(&stats).unwrap();
        let back: EngineStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);
    }
}
