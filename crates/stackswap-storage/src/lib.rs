//! # stackswap-storage
//!
//! Byte-bounded LRU key-value stores.
//!
//! - [`SimpleLru`]: single-threaded core, `&mut self`
//! - [`ThreadSafeLru`]: one mutex around a `SimpleLru`
//! - [`StripedLru`]: `N` independently locked shards, routed by key hash
//!
//! The thread-safe variants implement [`Storage`].

pub mod config;
pub mod error;
pub mod simple;
pub mod striped;
pub mod thread_safe;

pub use config::StorageConfig;
pub use error::{StorageError, StorageResult};
pub use simple::SimpleLru;
pub use striped::StripedLru;
pub use thread_safe::ThreadSafeLru;

/// Key-value storage shared between connection handlers
///
/// Mutating operations report whether anything was stored or removed.
pub trait Storage: Send + Sync {
    /// Insert or overwrite
    fn put(&self, key: &str, value: &str) -> bool;

    /// Insert only if the key is absent
    fn put_if_absent(&self, key: &str, value: &str) -> bool;

    /// Overwrite only if the key is present
    fn set(&self, key: &str, value: &str) -> bool;

    fn delete(&self, key: &str) -> bool;

    /// Read a value, marking it most recently used
    fn get(&self, key: &str) -> Option<String>;
}
