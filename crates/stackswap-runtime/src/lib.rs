//! # stackswap-runtime
//!
//! Platform-specific runtime for the stackswap coroutine engine.
//!
//! This crate provides:
//! - Context switching through a private dispatch stack (architecture-specific assembly)
//! - Stack image capture/restore for suspended coroutines
//! - The scheduler: spawn, yield, directed switch, block/unblock, teardown
//! - Engine configuration (build-time defaults plus environment overrides)

pub mod arch;
pub mod config;
pub mod descriptor;
pub mod memory;
pub mod scheduler;
pub mod stats;

// Re-exports
pub use config::EngineConfig;
pub use scheduler::{Engine, Scheduler};
pub use stats::SwitchStats;

// Platform detection
cfg_if::cfg_if! {
    if #[cfg(not(unix))] {
        compile_error!("stackswap needs a Unix target (mmap-backed dispatch stack)");
    }
}

// Architecture detection
cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub use arch::x86_64 as current_arch;
    } else if #[cfg(target_arch = "aarch64")] {
        pub use arch::aarch64 as current_arch;
    } else {
        compile_error!("Unsupported architecture");
    }
}
