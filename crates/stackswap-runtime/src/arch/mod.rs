//! Architecture-specific context switching
//!
//! The only module in the workspace that contains assembly. Everything it
//! exports follows one contract, per architecture:
//!
//! - `switch_via(arg, dispatch_top, dispatch)` spills the callee-saved
//!   registers and the return address onto the *current* stack, moves the
//!   stack pointer to `dispatch_top`, and calls `dispatch(arg, saved_sp)`.
//!   Whatever stack pointer `dispatch` returns is resumed by popping the same
//!   register frame from it. The returned pointer is a continuation: a
//!   previously saved `saved_sp` whose stack bytes are back in place, or a
//!   frame built by `prepare_entry_frame`.
//! - `prepare_entry_frame(top, entry, arg)` writes a register frame just
//!   below `top` so that resuming it calls `entry(arg)` with the stack
//!   pointer at `top`.
//! - `current_sp()` reads the stack pointer.
//!
//! Stacks grow downward on every supported target.

/// Called on the dispatch stack with the suspended stack pointer
pub type DispatchFn = extern "C" fn(arg: *mut core::ffi::c_void, saved_sp: usize) -> usize;

/// First function executed by a fresh coroutine; never returns
pub type EntryFn = extern "C" fn(arg: usize) -> !;

cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "x86_64", unix))] {
        pub mod x86_64;
    } else if #[cfg(all(target_arch = "aarch64", unix))] {
        pub mod aarch64;
    }
}
