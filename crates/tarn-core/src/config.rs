//! Engine configuration and resource limits.
//!
//! Provides the knobs that bound a sandboxed execution: call depth, value
//! stack size, linear-memory budget, an optional step budget, and the size of
//! the decoded-module cache.
//!
//! # Examples
//!
//! ```
//! use tarn_core::{EngineConfig, EngineProfile};
//!
//! let config = EngineConfig::default();
//! assert_eq!(config.max_call_depth, 1024);
//!
//! let strict = EngineConfig::from_profile(EngineProfile::Strict);
//! assert!(strict.step_budget.is_some());
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Predefined configuration profiles.
///
/// - **Strict**: small limits and a step budget, for untrusted modules
/// - **Moderate**: balanced limits (default)
/// - **Permissive**: generous limits for trusted modules
///
/// # Examples
///
/// ```
/// use tarn_core::{EngineConfig, EngineProfile};
///
/// let strict = EngineConfig::from_profile(EngineProfile::Strict);
/// assert_eq!(strict.memory_limit_bytes, 64 * 1024 * 1024);
///
/// let permissive = EngineConfig::from_profile(EngineProfile::Permissive);
/// assert_eq!(permissive.max_call_depth, 4096);
/// ```
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineProfile {
    /// Minimal limits with a step budget.
    ///
    /// - Call depth: 256
    /// - Value stack: 65 536 values
    /// - Memory: 64MB
    /// - Step budget: 10 000 000 instructions
    Strict,

    /// Balanced limits for typical use (recommended).
    ///
    /// - Call depth: 1024
    /// - Value stack: 1 048 576 values
    /// - Memory: 256MB
    /// - Step budget: none
    #[default]
    Moderate,

    /// Generous limits for trusted code.
    ///
    /// - Call depth: 4096
    /// - Value stack: 4 194 304 values
    /// - Memory: 1GB
    /// - Step budget: none
    Permissive,
}

impl EngineProfile {
    /// Returns the profile name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Moderate => "moderate",
            Self::Permissive => "permissive",
        }
    }
}

/// Engine configuration.
///
/// Deserializable from TOML or JSON; missing fields take the moderate
/// defaults.
///
/// # Examples
///
/// ```
/// use tarn_core::EngineConfig;
///
/// let config = EngineConfig::builder()
///     .max_call_depth(64)
///     .memory_limit_mb(16)
///     .step_budget(1_000)
///     .build()
///     .unwrap();
///
/// assert_eq!(config.max_call_depth, 64);
/// assert_eq!(config.memory_limit_bytes, 16 * 1024 * 1024);
/// assert_eq!(config.step_budget, Some(1_000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum number of nested wasm call frames.
    ///
    /// Exceeding it traps with `TrapStackOverflow`.
    pub max_call_depth: u32,

    /// Maximum number of nested host-to-wasm re-entries in one call chain.
    ///
    /// Each re-entry runs a fresh dispatch loop on the native stack, so this
    /// bound is much smaller than `max_call_depth`. Exceeding it traps with
    /// `TrapStackOverflow`; 0 forbids host functions from calling back.
    pub max_host_reentry: u32,

    /// Maximum number of live operand-stack and local slots.
    pub max_value_stack: usize,

    /// Byte budget enforced by the default memory callbacks.
    pub memory_limit_bytes: usize,

    /// Instructions an invocation may execute before it suspends.
    ///
    /// `None` disables the budget. A suspended call may be continued, which
    /// grants a fresh budget.
    pub step_budget: Option<u64>,

    /// Number of decoded modules kept in the cache; 0 disables caching.
    pub module_cache_capacity: usize,
}

impl EngineConfig {
    /// Creates a builder starting from the moderate profile.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Creates a configuration from a predefined profile.
    #[must_use]
    pub const fn from_profile(profile: EngineProfile) -> Self {
        match profile {
            EngineProfile::Strict => Self::strict(),
            EngineProfile::Moderate => Self::moderate(),
            EngineProfile::Permissive => Self::permissive(),
        }
    }

    /// Strict profile.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            max_call_depth: 256,
            max_host_reentry: 4,
            max_value_stack: 65_536,
            memory_limit_bytes: 64 * 1024 * 1024,
            step_budget: Some(10_000_000),
            module_cache_capacity: 16,
        }
    }

    /// Moderate profile.
    #[must_use]
    pub const fn moderate() -> Self {
        Self {
            max_call_depth: 1024,
            max_host_reentry: 16,
            max_value_stack: 1_048_576,
            memory_limit_bytes: 256 * 1024 * 1024,
            step_budget: None,
            module_cache_capacity: 64,
        }
    }

    /// Permissive profile.
    #[must_use]
    pub const fn permissive() -> Self {
        Self {
            max_call_depth: 4096,
            max_host_reentry: 64,
            max_value_stack: 4_194_304,
            memory_limit_bytes: 1024 * 1024 * 1024,
            step_budget: None,
            module_cache_capacity: 256,
        }
    }

    /// Checks that every limit is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a limit is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_call_depth == 0 {
            return Err(Error::Config {
                message: "max_call_depth must be greater than zero".to_string(),
            });
        }
        if self.max_value_stack == 0 {
            return Err(Error::Config {
                message: "max_value_stack must be greater than zero".to_string(),
            });
        }
        if self.step_budget == Some(0) {
            return Err(Error::Config {
                message: "step_budget must be greater than zero when set".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::moderate()
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Starts from a profile instead of the moderate defaults.
    #[must_use]
    pub const fn profile(mut self, profile: EngineProfile) -> Self {
        self.config = EngineConfig::from_profile(profile);
        self
    }

    /// Sets the maximum call depth.
    #[must_use]
    pub const fn max_call_depth(mut self, depth: u32) -> Self {
        self.config.max_call_depth = depth;
        self
    }

    /// Sets the maximum number of nested host re-entries.
    #[must_use]
    pub const fn max_host_reentry(mut self, depth: u32) -> Self {
        self.config.max_host_reentry = depth;
        self
    }

    /// Sets the maximum number of value-stack slots.
    #[must_use]
    pub const fn max_value_stack(mut self, slots: usize) -> Self {
        self.config.max_value_stack = slots;
        self
    }

    /// Sets the memory budget in megabytes.
    #[must_use]
    pub const fn memory_limit_mb(mut self, mb: usize) -> Self {
        self.config.memory_limit_bytes = mb * 1024 * 1024;
        self
    }

    /// Sets the memory budget in bytes.
    #[must_use]
    pub const fn memory_limit_bytes(mut self, bytes: usize) -> Self {
        self.config.memory_limit_bytes = bytes;
        self
    }

    /// Sets the per-invocation step budget.
    #[must_use]
    pub const fn step_budget(mut self, steps: u64) -> Self {
        self.config.step_budget = Some(steps);
        self
    }

    /// Removes the step budget.
    #[must_use]
    pub const fn unlimited_steps(mut self) -> Self {
        self.config.step_budget = None;
        self
    }

    /// Sets the module cache capacity.
    #[must_use]
    pub const fn module_cache_capacity(mut self, capacity: usize) -> Self {
        self.config.module_cache_capacity = capacity;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a limit is unusable.
    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_moderate() {
        assert_eq!(EngineConfig::default(), EngineConfig::moderate());
        assert_eq!(EngineProfile::default(), EngineProfile::Moderate);
    }

    #[test]
    fn test_profiles_are_ordered() {
        let strict = EngineConfig::strict();
        let moderate = EngineConfig::moderate();
        let permissive = EngineConfig::permissive();
        assert!(strict.max_call_depth < moderate.max_call_depth);
        assert!(strict.max_host_reentry < moderate.max_host_reentry);
        assert!(moderate.max_host_reentry < permissive.max_host_reentry);
        assert!(moderate.max_call_depth < permissive.max_call_depth);
        assert!(strict.memory_limit_bytes < moderate.memory_limit_bytes);
        assert!(moderate.memory_limit_bytes < permissive.memory_limit_bytes);
    }

    #[test]
    fn test_builder_rejects_zero_depth() {
        let err = EngineConfig::builder().max_call_depth(0).build().unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_builder_rejects_zero_budget() {
        let err = EngineConfig::builder().step_budget(0).build().unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_builder_profile_then_override() {
        let config = EngineConfig::builder()
            .profile(EngineProfile::Strict)
            .unlimited_steps()
            .build()
            .unwrap();
        assert_eq!(config.step_budget, None);
        assert_eq!(config.max_call_depth, 256);
    }

    #[test]
    fn test_deserialize_partial_toml() {
        let config: EngineConfig = toml::from_str(
            r"
            max_call_depth = 32
            step_budget = 500
            ",
        )
        .unwrap();
        assert_eq!(config.max_call_depth, 32);
        assert_eq!(config.step_budget, Some(500));
        assert_eq!(
            config.memory_limit_bytes,
            EngineConfig::moderate().memory_limit_bytes
        );
    }

    #[test]
    fn test_deserialize_rejects_unknown_fields() {
        let result: std::result::Result<EngineConfig, _> = toml::from_str("fuel = 3");
        assert!(result.is_err());
    }

    #[test]
    fn test_profile_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            profile: EngineProfile,
        }
        let w: Wrapper = toml::from_str(r#"profile = "strict""#).unwrap();
        assert_eq!(w.profile, EngineProfile::Strict);
    }
}
