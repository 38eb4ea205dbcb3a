//! # stackswap - stack-copying coroutines for an in-memory cache
//!
//! Many logical threads of control share one native stack. A switch copies
//! the suspended coroutine's frames into its own heap buffer and copies the
//! next coroutine's frames back to the same addresses, so coroutines cost
//! only as much memory as their live frames.
//!
//! ## Quick Start
//!
//! ```ignore
//! use stackswap::Engine;
//!
//! fn main() -> stackswap::EngineResult<()> {
//!     let engine = Engine::new()?;
//!
//!     let reader = engine.spawn(|s| {
//!         // Park until the writer hands over
//!         s.block(None);
//!         println!("reader woke up");
//!     });
//!     engine.spawn(move |s| {
//!         s.unblock(Some(reader));
//!         s.yield_now();
//!     });
//!
//!     engine.run();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      User Code                              │
//! │        spawn(), yield_now(), block(), unblock()             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Scheduler                              │
//! │     alive / blocked lists, round robin, idle context        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                Dispatch stack (mmap + guard)                │
//! │     save image [low, stack_base) / restore target image     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The storage ([`storage`]) and thread pool ([`executor`]) crates are the
//! cache server's other collaborators and are re-exported here.

// Re-export core types
pub use stackswap_core::{
    CoroutineId,
    CoroutineState,
    EngineError,
    EngineResult,
    MemoryError,
};

// Re-export kprint macros for debug logging
pub use stackswap_core::{kprint, kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use stackswap_core::kprint::{LogLevel, init as init_logging, set_log_level, set_flush_enabled, set_time_enabled};

// Re-export env utilities
pub use stackswap_core::{env_get, env_get_bool, env_get_bytes, env_get_str};

// Re-export runtime types
pub use stackswap_runtime::{Engine, EngineConfig, Scheduler, SwitchStats};

pub use stackswap_executor as executor;
pub use stackswap_storage as storage;

/// Run `main` as the first coroutine of a fresh engine until nothing is alive
///
/// Returns the engine so callers can inspect what is still blocked.
///
/// ```ignore
/// let engine = stackswap::block_on(|s| {
///     s.spawn(|_| println!("child"));
/// })?;
/// assert_eq!(engine.alive_count(), 0);
/// ```
#[inline(never)]
pub fn block_on<F>(main: F) -> EngineResult<Engine>
where
    F: FnOnce(&Scheduler) + 'static,
{
    let engine = Engine::new()?;
    engine.start(main);
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_block_on_runs_everything() {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let engine = block_on(move |s| {
            for _ in 0..4 {
                let c = c.clone();
                s.spawn(move |s| {
                    s.yield_now();
                    c.set(c.get() + 1);
                });
            }
        })
        .unwrap();

        assert_eq!(count.get(), 4);
        assert_eq!(engine.alive_count(), 0);
        assert_eq!(engine.stats().spawned, 5);
    }
}
