//! The stack-copying coroutine engine
//!
//! Every coroutine runs on the same native stack, just below `stack_base`.
//! Switching away copies the suspended coroutine's frames `[low, stack_base)`
//! into its descriptor; switching in copies the target's frames back to the
//! same addresses. The native caller (the idle context) always lives above
//! `stack_base` and is never copied.
//!
//! All copying happens in [`Scheduler::dispatch`], which runs on a private
//! dispatch stack reached through `switch_via`. Nothing that runs on the
//! shared stack ever writes to it on behalf of another coroutine, so a
//! restore cannot overwrite the frame performing it.
//!
//! ```rust,ignore
//! let engine = Engine::new()?;
//! let a = engine.spawn(|s| {
//!     s.block(None);
//!     println!("woken");
//! });
//! engine.spawn(move |s| s.unblock(Some(a)));
//! engine.run();
//! ```

use crate::config::EngineConfig;
use crate::current_arch;
use crate::descriptor::{Descriptor, Entry};
use crate::memory::{align_stack, DispatchStack};
use crate::stats::SwitchStats;

use stackswap_core::error::EngineResult;
use stackswap_core::id::CoroutineId;
use stackswap_core::list::List;
use stackswap_core::slot::Slab;
use stackswap_core::state::CoroutineState;

use stackswap_core::{kdebug, kerror, kinfo, ktrace, kwarn};

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe};

/// Minimum headroom between the native caller's stack pointer and
/// `stack_base` whenever it enters the engine
const IDLE_MARGIN: usize = 512;

/// Who owns the shared stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Running {
    Idle,
    Coroutine(u32),
}

/// Switch request handed to the dispatcher
#[derive(Debug, Clone, Copy)]
struct Transfer {
    from: Running,
    to: Running,
    /// `from` has finished; free it instead of saving it
    retire: bool,
}

/// The native caller's context
#[derive(Debug, Default)]
struct IdleContext {
    continuation: Option<usize>,
}

struct SchedState {
    slots: Slab<Descriptor>,
    alive: List,
    blocked: List,
    current: Running,
    idle: IdleContext,
    pending: Option<Transfer>,
    stats: SwitchStats,
}

impl SchedState {
    fn new() -> Self {
        Self {
            slots: Slab::new(),
            alive: List::new(),
            blocked: List::new(),
            current: Running::Idle,
            idle: IdleContext::default(),
            pending: None,
            stats: SwitchStats::default(),
        }
    }

    /// Slot index of a live handle
    #[inline]
    fn resolve(&self, id: CoroutineId) -> Option<u32> {
        self.slots
            .is_live(id.index(), id.generation())
            .then_some(id.index())
    }

    #[inline]
    fn id_of(&self, index: u32) -> CoroutineId {
        CoroutineId::new(index, self.slots.generation(index))
    }

    /// Round-robin pick after `index`: one step towards the head, wrapping
    /// to the tail. Newest entries sit at the head, so this walks the alive
    /// list in insertion order.
    fn successor(&self, index: u32) -> Option<u32> {
        let next = self
            .alive
            .prev_of(&self.slots, index)
            .or(self.alive.tail())?;
        (next != index).then_some(next)
    }
}

/// Log and abort. Used for conditions after which no coroutine state can
/// be trusted.
#[cold]
fn fatal(args: fmt::Arguments<'_>) -> ! {
    kerror!("stackswap fatal: {}", args);
    std::process::abort()
}

/// Scheduling surface shared by the engine owner and coroutine bodies
///
/// Every operation is total: stale handles, blocked targets and redundant
/// requests are silently ignored.
pub struct Scheduler {
    state: RefCell<SchedState>,
    stack_base: usize,
    dispatch: DispatchStack,
    config: EngineConfig,
    /// Panic caught at a coroutine entry, resumed on the native caller
    panicked: Cell<Option<Box<dyn Any + Send>>>,
    _not_send: PhantomData<*const ()>,
}

impl Scheduler {
    /// Create a coroutine at the head of the alive list. Never switches.
    pub fn spawn<F>(&self, f: F) -> CoroutineId
    where
        F: FnOnce(&Scheduler) + 'static,
    {
        let mut guard = self.state.borrow_mut();
        let st = &mut *guard;
        let index = st.slots.insert(Descriptor::new(Box::new(f)));
        st.alive.push_front(&mut st.slots, index);
        st.stats.spawned += 1;
        let id = st.id_of(index);
        kdebug!("spawn {}", id);
        id
    }

    /// Give the shared stack to the next alive coroutine
    ///
    /// No-op when nothing else is alive. From the native caller this starts
    /// the oldest alive coroutine in round-robin order.
    pub fn yield_now(&self) {
        let (from, to) = {
            let st = self.state.borrow();
            let next = match st.current {
                Running::Idle => st.alive.tail(),
                Running::Coroutine(index) => st.successor(index),
            };
            match next {
                Some(index) => (st.current, Running::Coroutine(index)),
                None => return,
            }
        };
        self.transfer(from, to, false);
    }

    /// Directed yield. `None` behaves like [`yield_now`](Self::yield_now).
    ///
    /// Ignored if `target` is running, blocked, or finished.
    pub fn switch_to(&self, target: Option<CoroutineId>) {
        let Some(id) = target else {
            return self.yield_now();
        };
        let (from, to) = {
            let st = self.state.borrow();
            let Some(index) = st.resolve(id) else {
                return;
            };
            if st.current == Running::Coroutine(index) {
                return;
            }
            if st.slots.get(index).map_or(true, |d| d.blocked) {
                return;
            }
            (st.current, Running::Coroutine(index))
        };
        self.transfer(from, to, false);
    }

    /// Park `target` (the running coroutine if `None`) in the blocked set
    ///
    /// Blocking the running coroutine suspends it immediately and returns
    /// control to the native caller.
    pub fn block(&self, target: Option<CoroutineId>) {
        let switch_from = {
            let mut guard = self.state.borrow_mut();
            let st = &mut *guard;
            let index = match target {
                Some(id) => match st.resolve(id) {
                    Some(index) => index,
                    None => return,
                },
                None => match st.current {
                    Running::Coroutine(index) => index,
                    Running::Idle => return,
                },
            };
            match st.slots.get_mut(index) {
                Some(desc) if !desc.blocked => desc.blocked = true,
                _ => return,
            }
            st.alive.remove(&mut st.slots, index);
            st.blocked.push_front(&mut st.slots, index);
            ktrace!("block {}", st.id_of(index));

            (st.current == Running::Coroutine(index)).then_some(st.current)
        };
        if let Some(from) = switch_from {
            self.transfer(from, Running::Idle, false);
        }
    }

    /// Move a blocked coroutine to the head of the alive list. Never switches.
    pub fn unblock(&self, target: Option<CoroutineId>) {
        let Some(id) = target else {
            return;
        };
        let mut guard = self.state.borrow_mut();
        let st = &mut *guard;
        let Some(index) = st.resolve(id) else {
            return;
        };
        match st.slots.get_mut(index) {
            Some(desc) if desc.blocked => desc.blocked = false,
            _ => return,
        }
        st.blocked.remove(&mut st.slots, index);
        st.alive.push_front(&mut st.slots, index);
        ktrace!("unblock {}", id);
    }

    /// Drive coroutines from the native caller until none is alive
    ///
    /// Blocked coroutines stay parked. Ignored inside a coroutine.
    pub fn run(&self) {
        if self.in_coroutine() {
            kwarn!("run() called from inside a coroutine, ignoring");
            return;
        }
        while self.alive_count() > 0 {
            self.yield_now();
        }
        kdebug!(
            "run finished: {} blocked, {}",
            self.blocked_count(),
            self.stats()
        );
    }

    /// Spawn `main` and [`run`](Self::run) until nothing is alive
    pub fn start<F>(&self, main: F) -> CoroutineId
    where
        F: FnOnce(&Scheduler) + 'static,
    {
        let id = self.spawn(main);
        self.run();
        id
    }

    /// Handle of the running coroutine, `None` on the native caller
    pub fn current(&self) -> Option<CoroutineId> {
        let st = self.state.borrow();
        match st.current {
            Running::Idle => None,
            Running::Coroutine(index) => Some(st.id_of(index)),
        }
    }

    #[inline]
    pub fn in_coroutine(&self) -> bool {
        self.state.borrow().current != Running::Idle
    }

    pub fn state(&self, id: CoroutineId) -> CoroutineState {
        let st = self.state.borrow();
        let Some(index) = st.resolve(id) else {
            return CoroutineState::Finished;
        };
        if st.current == Running::Coroutine(index) {
            return CoroutineState::Running;
        }
        match st.slots.get(index) {
            Some(desc) if desc.blocked => CoroutineState::Blocked,
            Some(desc) if desc.is_fresh() => CoroutineState::Created,
            Some(_) => CoroutineState::Ready,
            None => CoroutineState::Finished,
        }
    }

    /// Alive coroutines in list order (most recently inserted first)
    pub fn alive(&self) -> Vec<CoroutineId> {
        let st = self.state.borrow();
        st.alive.iter(&st.slots).map(|i| st.id_of(i)).collect()
    }

    /// Blocked coroutines in list order (most recently blocked first)
    pub fn blocked(&self) -> Vec<CoroutineId> {
        let st = self.state.borrow();
        st.blocked.iter(&st.slots).map(|i| st.id_of(i)).collect()
    }

    #[inline]
    pub fn alive_count(&self) -> usize {
        self.state.borrow().alive.len()
    }

    #[inline]
    pub fn blocked_count(&self) -> usize {
        self.state.borrow().blocked.len()
    }

    pub fn stats(&self) -> SwitchStats {
        self.state.borrow().stats
    }

    /// Upper bound of every coroutine's stack range
    #[inline]
    pub fn stack_base(&self) -> usize {
        self.stack_base
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Switching
    // ========================================================================

    /// Hand the shared stack from `from` to `to` through the dispatcher
    ///
    /// Returns when `from` is resumed. No state borrow may be held here.
    fn transfer(&self, from: Running, to: Running, retire: bool) {
        if from == Running::Idle {
            let sp = current_arch::current_sp();
            if sp < self.stack_base + IDLE_MARGIN {
                fatal(format_args!(
                    "native caller at {:#x} is inside the coroutine stack (base {:#x}); \
                     enter the engine closer to where it was created",
                    sp, self.stack_base
                ));
            }
        }

        self.state.borrow_mut().pending = Some(Transfer { from, to, retire });
        unsafe {
            current_arch::switch_via(
                self as *const Scheduler as *mut c_void,
                self.dispatch.top(),
                dispatch_entry,
            );
        }

        if from == Running::Idle {
            if let Some(payload) = self.panicked.take() {
                panic::resume_unwind(payload);
            }
        }
    }

    /// Save `from`, restore `to`, return the stack pointer to resume
    ///
    /// Runs on the dispatch stack only.
    fn dispatch(&self, saved_sp: usize) -> usize {
        let Ok(mut guard) = self.state.try_borrow_mut() else {
            fatal(format_args!("engine state borrowed across a switch"));
        };
        let st = &mut *guard;
        let Some(t) = st.pending.take() else {
            fatal(format_args!("dispatch without a pending transfer"));
        };
        let base = self.stack_base;

        match t.from {
            Running::Idle => st.idle.continuation = Some(saved_sp),
            Running::Coroutine(index) if t.retire => {
                drop(st.slots.remove(index));
                st.stats.retired += 1;
            }
            Running::Coroutine(index) => {
                let Some(desc) = st.slots.get_mut(index) else {
                    fatal(format_args!("suspending unknown coroutine slot {}", index));
                };
                match unsafe { desc.image.capture(saved_sp, base) } {
                    Ok(captured) => {
                        st.stats.saves += 1;
                        st.stats.bytes_saved += captured.bytes as u64;
                        if captured.reallocated {
                            st.stats.reallocations += 1;
                        }
                    }
                    Err(e) => fatal(format_args!("cannot suspend slot {}: {}", index, e)),
                }
                desc.continuation = Some(saved_sp);
            }
        }

        let resume_sp = match t.to {
            Running::Idle => match st.idle.continuation.take() {
                Some(sp) => sp,
                None => fatal(format_args!("native caller has no continuation")),
            },
            Running::Coroutine(index) => {
                let Some(desc) = st.slots.get_mut(index) else {
                    fatal(format_args!("resuming unknown coroutine slot {}", index));
                };
                match desc.continuation.take() {
                    Some(sp) => {
                        let bytes = unsafe { desc.image.restore() };
                        st.stats.restores += 1;
                        st.stats.bytes_restored += bytes as u64;
                        sp
                    }
                    None if desc.is_fresh() => unsafe {
                        current_arch::prepare_entry_frame(
                            base,
                            coroutine_entry,
                            self as *const Scheduler as usize,
                        )
                    },
                    None => fatal(format_args!("slot {} has no continuation", index)),
                }
            }
        };

        st.current = t.to;
        st.stats.switches += 1;
        if self.config.trace_switches {
            kdebug!("switch {:?} -> {:?} (sp {:#x})", t.from, t.to, resume_sp);
        }
        resume_sp
    }

    fn take_current_entry(&self) -> Option<Entry> {
        let mut st = self.state.borrow_mut();
        let Running::Coroutine(index) = st.current else {
            return None;
        };
        st.slots.get_mut(index).and_then(|d| d.entry.take())
    }

    /// Unlink the finished coroutine and hand the stack on; never returns
    fn retire_current(&self) -> ! {
        let (from, to) = {
            let mut guard = self.state.borrow_mut();
            let st = &mut *guard;
            let Running::Coroutine(index) = st.current else {
                fatal(format_args!("retire outside a coroutine"));
            };
            let to = st
                .successor(index)
                .map_or(Running::Idle, Running::Coroutine);
            st.alive.remove(&mut st.slots, index);
            kdebug!("retire {}", st.id_of(index));
            (st.current, to)
        };
        self.transfer(from, to, true);
        fatal(format_args!("retired coroutine was resumed"))
    }

    fn record_panic(&self, payload: Box<dyn Any + Send>) {
        match self.panicked.take() {
            // Keep the first; later ones are reported and dropped
            Some(first) => {
                kerror!("coroutine panicked while an earlier panic was pending");
                self.panicked.set(Some(first));
            }
            None => self.panicked.set(Some(payload)),
        }
    }

    /// Free every descriptor. Coroutines that never finished are dropped
    /// mid-body without unwinding.
    fn release_all(&self) {
        let Ok(mut guard) = self.state.try_borrow_mut() else {
            fatal(format_args!("engine torn down while its state is borrowed"));
        };
        if guard.current != Running::Idle {
            fatal(format_args!("engine torn down from inside one of its coroutines"));
        }
        let st = &mut *guard;
        let slots = std::mem::take(&mut st.slots);
        st.alive = List::new();
        st.blocked = List::new();
        st.idle = IdleContext::default();
        st.pending = None;
        drop(guard);

        let freed = slots.len();
        // User closures may own handles to other state; drop them unborrowed
        drop(slots);
        kdebug!("teardown: freed {} coroutine(s)", freed);
    }
}

/// Entered on the dispatch stack by `switch_via`
extern "C" fn dispatch_entry(arg: *mut c_void, saved_sp: usize) -> usize {
    let sched = unsafe { &*(arg as *const Scheduler) };
    sched.dispatch(saved_sp)
}

/// First frame of every coroutine, at `stack_base`
extern "C" fn coroutine_entry(arg: usize) -> ! {
    let sched = unsafe { &*(arg as *const Scheduler) };
    if let Some(entry) = sched.take_current_entry() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| entry(sched))) {
            kwarn!("coroutine {:?} panicked", sched.current());
            sched.record_panic(payload);
        }
    }
    sched.retire_current()
}

/// Owner of a scheduler
///
/// Must stay on the thread that created it, and the engine must be entered
/// from roughly the stack depth it was created at: everything deeper than
/// `idle_reserve` below the constructor belongs to coroutines.
pub struct Engine {
    sched: Box<Scheduler>,
}

impl Engine {
    /// Engine with `EngineConfig::from_env()`
    #[inline(never)]
    pub fn new() -> EngineResult<Engine> {
        Self::with_config(EngineConfig::from_env())
    }

    #[inline(never)]
    pub fn with_config(config: EngineConfig) -> EngineResult<Engine> {
        config.validate()?;
        let dispatch = DispatchStack::new(config.dispatch_stack_size)?;

        let sp = current_arch::current_sp();
        let stack_base = align_stack(sp.saturating_sub(config.idle_reserve));
        kinfo!(
            "engine ready: stack_base={:#x} (sp {:#x}), {:?}",
            stack_base,
            sp,
            dispatch
        );

        Ok(Engine {
            sched: Box::new(Scheduler {
                state: RefCell::new(SchedState::new()),
                stack_base,
                dispatch,
                config,
                panicked: Cell::new(None),
                _not_send: PhantomData,
            }),
        })
    }

    /// Free every coroutine, finished or not
    pub fn teardown(self) {
        drop(self);
    }
}

impl Deref for Engine {
    type Target = Scheduler;

    #[inline]
    fn deref(&self) -> &Scheduler {
        &self.sched
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.sched.release_all();
    }
}
