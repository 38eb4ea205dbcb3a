//! # stackswap-executor
//!
//! Bounded OS-thread pool for work that must not run inside a coroutine
//! (blocking syscalls, slow storage operations).
//!
//! - Starts `low_watermark` threads.
//! - Tasks go onto a bounded lock-free queue; `submit` refuses when full.
//! - When every thread is busy, `submit` adds a thread, up to `high_watermark`.
//! - Threads above the low watermark exit after `idle_time` without work.
//!
//! ```rust,ignore
//! let pool = Executor::new(ExecutorConfig::new().name("io"))?;
//! pool.submit(|| expensive());
//! pool.stop(true);
//! ```

pub mod config;
pub mod error;

pub use config::ExecutorConfig;
pub use error::{ExecutorError, ExecutorResult};

use crossbeam_queue::ArrayQueue;
use stackswap_core::{kdebug, kerror, kwarn};

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;

/// Unit of work
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Lifecycle of the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Accepting and running tasks
    Run,
    /// No new tasks; queued ones still run
    Stopping,
    /// Every worker has exited
    Stopped,
}

thread_local! {
    static IN_WORKER: Cell<bool> = const { Cell::new(false) };
}

/// Bookkeeping guarded by the pool mutex
struct PoolState {
    phase: Phase,
    /// Live worker threads
    threads: usize,
    /// Workers currently running a task
    busy: usize,
    next_id: usize,
    handles: Vec<thread::JoinHandle<()>>,
}

/// Shared between the pool handle and its workers
struct PoolInner {
    config: ExecutorConfig,
    queue: ArrayQueue<Task>,
    state: Mutex<PoolState>,
    /// Signalled on new work and on stop
    work_ready: Condvar,
    /// Signalled when the last worker exits after stop
    all_stopped: Condvar,
    completed: AtomicU64,
    panicked: AtomicU64,
}

impl PoolInner {
    #[inline]
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct Executor {
    inner: Arc<PoolInner>,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> ExecutorResult<Self> {
        config.validate()?;
        let inner = Arc::new(PoolInner {
            queue: ArrayQueue::new(config.max_queue_size),
            state: Mutex::new(PoolState {
                phase: Phase::Run,
                threads: 0,
                busy: 0,
                next_id: 0,
                handles: Vec::with_capacity(config.high_watermark),
            }),
            work_ready: Condvar::new(),
            all_stopped: Condvar::new(),
            completed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            config,
        });

        {
            let mut state = inner.lock();
            for _ in 0..inner.config.low_watermark {
                if let Err(e) = spawn_worker(&inner, &mut state) {
                    drop(state);
                    Executor { inner }.stop(true);
                    return Err(e);
                }
            }
        }
        kdebug!(
            "executor {} started with {} threads",
            inner.config.name,
            inner.config.low_watermark
        );
        Ok(Executor { inner })
    }

    /// Queue `task`; false if the pool is stopping or the queue is full
    pub fn submit<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let inner = &self.inner;
        let mut state = inner.lock();
        if state.phase != Phase::Run {
            return false;
        }
        if inner.queue.push(Box::new(task)).is_err() {
            return false;
        }

        if state.busy == state.threads && state.threads < inner.config.high_watermark {
            if let Err(e) = spawn_worker(inner, &mut state) {
                // Already queued; existing workers will get to it
                kwarn!("executor {}: {}", inner.config.name, e);
            }
        }
        inner.work_ready.notify_one();
        true
    }

    /// Stop accepting tasks. Queued tasks still run.
    ///
    /// With `await_workers`, block until every worker has exited.
    pub fn stop(&self, await_workers: bool) {
        let inner = &self.inner;
        let mut state = inner.lock();
        if state.phase == Phase::Run {
            state.phase = if state.threads == 0 {
                Phase::Stopped
            } else {
                Phase::Stopping
            };
            inner.work_ready.notify_all();
        }
        if !await_workers {
            return;
        }
        if IN_WORKER.with(Cell::get) {
            kwarn!(
                "executor {}: stop(true) from a worker thread, not waiting",
                inner.config.name
            );
            return;
        }

        while state.threads > 0 {
            state = inner
                .all_stopped
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
        let handles = std::mem::take(&mut state.handles);
        drop(state);
        for handle in handles {
            let _ = handle.join();
        }
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().phase
    }

    /// Live worker threads
    pub fn threads(&self) -> usize {
        self.inner.lock().threads
    }

    /// Workers running a task right now
    pub fn busy(&self) -> usize {
        self.inner.lock().busy
    }

    /// Tasks waiting for a worker
    pub fn queued(&self) -> usize {
        self.inner.queue.len()
    }

    /// Tasks that finished, including ones that panicked
    pub fn completed(&self) -> u64 {
        self.inner.completed.load(Ordering::Relaxed)
    }

    pub fn panicked(&self) -> u64 {
        self.inner.panicked.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.inner.config
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.stop(true);
    }
}

/// Start one worker; caller holds the pool lock
fn spawn_worker(inner: &Arc<PoolInner>, state: &mut PoolState) -> ExecutorResult<()> {
    let id = state.next_id;
    let worker = Arc::clone(inner);
    let handle = thread::Builder::new()
        .name(format!("{}-{}", inner.config.name, id))
        .spawn(move || worker_loop(worker, id))
        .map_err(|e| ExecutorError::Spawn(e.to_string()))?;

    state.next_id += 1;
    state.threads += 1;
    // Drop handles of threads that already left on idle timeout
    state.handles.retain(|h| !h.is_finished());
    state.handles.push(handle);
    Ok(())
}

fn worker_loop(inner: Arc<PoolInner>, id: usize) {
    IN_WORKER.with(|w| w.set(true));
    let mut state = inner.lock();
    loop {
        if let Some(task) = inner.queue.pop() {
            state.busy += 1;
            drop(state);

            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                inner.panicked.fetch_add(1, Ordering::Relaxed);
                kerror!(
                    "{}-{}: task panicked: {}",
                    inner.config.name,
                    id,
                    panic_message(&*payload)
                );
            }
            inner.completed.fetch_add(1, Ordering::Relaxed);

            state = inner.lock();
            state.busy -= 1;
            continue;
        }

        if state.phase != Phase::Run {
            break;
        }

        let (guard, timeout) = inner
            .work_ready
            .wait_timeout(state, inner.config.idle_time)
            .unwrap_or_else(|e| e.into_inner());
        state = guard;
        if timeout.timed_out()
            && inner.queue.is_empty()
            && state.phase == Phase::Run
            && state.threads > inner.config.low_watermark
        {
            kdebug!("{}-{}: idle, exiting", inner.config.name, id);
            break;
        }
    }

    state.threads -= 1;
    if state.threads == 0 && state.phase != Phase::Run {
        state.phase = Phase::Stopped;
        inner.all_stopped.notify_all();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    fn config(low: usize, high: usize, queue: usize) -> ExecutorConfig {
        ExecutorConfig::new()
            .name("test")
            .low_watermark(low)
            .high_watermark(high)
            .max_queue_size(queue)
            .idle_time(Duration::from_millis(50))
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_runs_all_tasks() {
        let pool = Executor::new(config(2, 4, 256)).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let count = count.clone();
            assert!(pool.submit(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.stop(true);
        assert_eq!(count.load(Ordering::SeqCst), 100);
        assert_eq!(pool.completed(), 100);
        assert_eq!(pool.phase(), Phase::Stopped);
        assert_eq!(pool.threads(), 0);
    }

    #[test]
    fn test_rejects_when_queue_full() {
        let pool = Executor::new(config(1, 1, 1)).unwrap();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        assert!(pool.submit(move || {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        }));
        started_rx.recv().unwrap();

        // The only worker is busy and at the high watermark
        assert!(pool.submit(|| {}));
        assert!(!pool.submit(|| {}));
        assert_eq!(pool.threads(), 1);

        release_tx.send(()).unwrap();
        pool.stop(true);
        assert_eq!(pool.completed(), 2);
    }

    #[test]
    fn test_grows_to_high_watermark_then_shrinks() {
        let pool = Executor::new(config(1, 3, 8)).unwrap();
        let (started_tx, started_rx) = mpsc::channel();
        let release = Arc::new((Mutex::new(false), Condvar::new()));

        for _ in 0..3 {
            let started = started_tx.clone();
            let release = release.clone();
            assert!(pool.submit(move || {
                started.send(()).unwrap();
                let (lock, cvar) = &*release;
                let mut go = lock.lock().unwrap();
                while !*go {
                    go = cvar.wait(go).unwrap();
                }
            }));
            started_rx.recv().unwrap();
        }
        assert_eq!(pool.threads(), 3);
        assert_eq!(pool.busy(), 3);

        // Saturated: the next task only queues
        assert!(pool.submit(|| {}));
        assert_eq!(pool.threads(), 3);

        {
            let (lock, cvar) = &*release;
            *lock.lock().unwrap() = true;
            cvar.notify_all();
        }

        assert!(wait_until(|| pool.completed() == 4));
        assert!(wait_until(|| pool.threads() == 1));
        pool.stop(true);
    }

    #[test]
    fn test_stop_rejects_new_tasks_and_drains_queue() {
        let pool = Executor::new(config(1, 1, 16)).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let count = count.clone();
            assert!(pool.submit(move || {
                thread::sleep(Duration::from_millis(1));
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.stop(false);
        assert!(!pool.submit(|| {}));

        pool.stop(true);
        assert_eq!(count.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_panicking_task_keeps_worker() {
        let pool = Executor::new(config(1, 1, 4)).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));

        assert!(pool.submit(|| panic!("task failure")));
        let r = ran.clone();
        assert!(pool.submit(move || {
            r.fetch_add(1, Ordering::SeqCst);
        }));

        pool.stop(true);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(pool.panicked(), 1);
        assert_eq!(pool.completed(), 2);
    }

    #[test]
    fn test_zero_low_watermark_spawns_on_demand() {
        let pool = Executor::new(config(0, 2, 4)).unwrap();
        assert_eq!(pool.threads(), 0);

        let (tx, rx) = mpsc::channel();
        assert!(pool.submit(move || tx.send(7).unwrap()));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(7));

        // Above the low watermark, so the thread idles out
        assert!(wait_until(|| pool.threads() == 0));
        pool.stop(true);
        assert_eq!(pool.phase(), Phase::Stopped);
    }

    #[test]
    fn test_invalid_config() {
        assert!(Executor::new(config(2, 1, 4)).is_err());
    }

    #[test]
    fn test_panic_message() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*s), "static");
        let s: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*s), "owned");
        let s: Box<dyn Any + Send> = Box::new(5u8);
        assert_eq!(panic_message(&*s), "<non-string panic>");
    }
}
