//! # stackswap-core
//!
//! Core types for the stackswap coroutine engine.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! Stack copying and the assembly-level switch live in `stackswap-runtime`.
//!
//! ## Modules
//!
//! - `id` - Coroutine handle type
//! - `state` - Coroutine lifecycle states
//! - `slot` - Generation-tracked slab for descriptors
//! - `list` - Index-based intrusive doubly-linked list over a slab
//! - `error` - Error types
//! - `kprint` - Kernel-style leveled logging macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod state;
pub mod slot;
pub mod list;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::CoroutineId;
pub use state::CoroutineState;
pub use slot::Slab;
pub use list::{Linked, Links, List};
pub use error::{EngineError, EngineResult, MemoryError};
pub use env::{env_get, env_get_bool, env_get_bytes, env_get_str};

/// Constants shared by the engine and its collaborators
pub mod constants {
    /// Alignment of every stack pointer handed to the architecture layer
    pub const STACK_ALIGN: usize = 16;

    /// Guard page size used below mmap'ed stacks (4 KB)
    pub const GUARD_SIZE: usize = 4096;

    /// Minimum distance kept between the native caller and the shared stack base
    pub const MIN_IDLE_RESERVE: usize = 16 * 1024;

    /// Minimum dispatch stack size
    pub const MIN_DISPATCH_STACK: usize = 32 * 1024;
}
