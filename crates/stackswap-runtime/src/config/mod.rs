//! Engine configuration
//!
//! Provides compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder methods
//! 2. Environment variables (runtime, via `from_env()`)
//! 3. User's config file named by `SSW_CONFIG_RS` (compile-time)
//! 4. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use stackswap_runtime::config::EngineConfig;
//!
//! let config = EngineConfig::from_env()
//!     .idle_reserve(128 * 1024)
//!     .trace_switches(true);
//! ```

pub mod defaults;

use stackswap_core::constants::{MIN_DISPATCH_STACK, MIN_IDLE_RESERVE};
use stackswap_core::env::{env_get_bool, env_get_bytes};
use stackswap_core::error::{EngineError, EngineResult};
use stackswap_core::kprintln;

/// Engine configuration with builder pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bytes of native stack kept below the constructing frame for the
    /// native caller. `stack_base` sits this far below the constructor.
    pub idle_reserve: usize,
    /// Usable size of the private stack that saves and restores images
    pub dispatch_stack_size: usize,
    /// Log every switch at debug level
    pub trace_switches: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Create config from compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional, sizes accept `k`/`m` suffixes):
    /// - `SSW_IDLE_RESERVE` - Native stack reserved for the caller
    /// - `SSW_DISPATCH_STACK_SIZE` - Dispatch stack size
    /// - `SSW_TRACE_SWITCHES` - Log each switch (0/1)
    pub fn from_env() -> Self {
        Self {
            idle_reserve: env_get_bytes("SSW_IDLE_RESERVE", defaults::IDLE_RESERVE),
            dispatch_stack_size: env_get_bytes(
                "SSW_DISPATCH_STACK_SIZE",
                defaults::DISPATCH_STACK_SIZE,
            ),
            trace_switches: env_get_bool("SSW_TRACE_SWITCHES", defaults::TRACE_SWITCHES),
        }
    }

    /// Create config with explicit defaults (no env override).
    pub fn new() -> Self {
        Self {
            idle_reserve: defaults::IDLE_RESERVE,
            dispatch_stack_size: defaults::DISPATCH_STACK_SIZE,
            trace_switches: defaults::TRACE_SWITCHES,
        }
    }

    // Builder methods

    pub fn idle_reserve(mut self, bytes: usize) -> Self {
        self.idle_reserve = bytes;
        self
    }

    pub fn dispatch_stack_size(mut self, bytes: usize) -> Self {
        self.dispatch_stack_size = bytes;
        self
    }

    pub fn trace_switches(mut self, enable: bool) -> Self {
        self.trace_switches = enable;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> EngineResult<()> {
        if self.idle_reserve < MIN_IDLE_RESERVE {
            return Err(EngineError::InvalidConfig("idle_reserve must be >= 16KB"));
        }
        if self.dispatch_stack_size < MIN_DISPATCH_STACK {
            return Err(EngineError::InvalidConfig(
                "dispatch_stack_size must be >= 32KB",
            ));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        kprintln!("stackswap engine configuration:");
        kprintln!("  idle_reserve:         {}", self.idle_reserve);
        kprintln!("  dispatch_stack_size:  {}", self.dispatch_stack_size);
        kprintln!("  trace_switches:       {}", self.trace_switches);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = EngineConfig::new();
        assert_eq!(config.idle_reserve, defaults::IDLE_RESERVE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .idle_reserve(256 * 1024)
            .dispatch_stack_size(64 * 1024)
            .trace_switches(true);

        assert_eq!(config.idle_reserve, 256 * 1024);
        assert_eq!(config.dispatch_stack_size, 64 * 1024);
        assert!(config.trace_switches);
    }

    #[test]
    fn test_validation() {
        let config = EngineConfig::new().idle_reserve(1024);
        assert_eq!(
            config.validate(),
            Err(EngineError::InvalidConfig("idle_reserve must be >= 16KB"))
        );

        let config = EngineConfig::new().dispatch_stack_size(4096);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("SSW_DISPATCH_STACK_SIZE", "96k");
        let config = EngineConfig::from_env();
        let plain = EngineConfig::default();
        std::env::remove_var("SSW_DISPATCH_STACK_SIZE");
        assert_eq!(config.dispatch_stack_size, 96 * 1024);
        assert_eq!(plain, EngineConfig::new());
    }
}
