//! Storage configuration
//!
//! ```rust,ignore
//! let storage = StorageConfig::from_env().stripe_count(16).build()?;
//! ```

use crate::error::StorageResult;
use crate::striped::StripedLru;

use stackswap_core::env::{env_get, env_get_bytes};
use stackswap_core::kprintln;

/// Default total memory for keys and values
pub const DEFAULT_MEMORY_LIMIT: usize = 64 * 1024 * 1024;

pub const DEFAULT_STRIPE_COUNT: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Total bytes of keys and values across all stripes
    pub memory_limit: usize,
    pub stripe_count: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageConfig {
    /// Defaults with environment overrides:
    /// - `SSW_STORAGE_LIMIT` - total bytes (accepts `k`/`m`/`g`)
    /// - `SSW_STORAGE_STRIPES` - number of stripes
    pub fn from_env() -> Self {
        Self {
            memory_limit: env_get_bytes("SSW_STORAGE_LIMIT", DEFAULT_MEMORY_LIMIT),
            stripe_count: env_get("SSW_STORAGE_STRIPES", DEFAULT_STRIPE_COUNT),
        }
    }

    pub fn new() -> Self {
        Self {
            memory_limit: DEFAULT_MEMORY_LIMIT,
            stripe_count: DEFAULT_STRIPE_COUNT,
        }
    }

    pub fn memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = bytes;
        self
    }

    pub fn stripe_count(mut self, n: usize) -> Self {
        self.stripe_count = n;
        self
    }

    /// Build the striped store; fails under the same rules as `StripedLru::build`
    pub fn build(&self) -> StorageResult<StripedLru> {
        StripedLru::build(self.memory_limit, self.stripe_count)
    }

    pub fn print(&self) {
        kprintln!("stackswap storage configuration:");
        kprintln!("  memory_limit:  {}", self.memory_limit);
        kprintln!("  stripe_count:  {}", self.stripe_count);
    }
}
