//! Basic stackswap example
//!
//! A handful of client coroutines read keys from the cache. On a miss a
//! client parks itself with `block`, and the value is loaded on the
//! executor's threads. The native caller drains finished loads, stores
//! them and `unblock`s the waiting client.
//!
//! # Environment Variables
//!
//! - `SSW_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)
//! - `SSW_FLUSH_EPRINT=1` - Flush log output immediately (useful for crash debugging)
//! - `SSW_TRACE_SWITCHES=1` - Log every context switch at debug level
//! - `SSW_STORAGE_LIMIT`, `SSW_STORAGE_STRIPES` - Cache sizing
//! - `SSW_EXECUTOR_LOW`, `SSW_EXECUTOR_HIGH` - Loader pool sizing

use stackswap::executor::{Executor, ExecutorConfig};
use stackswap::storage::{Storage, StorageConfig, StripedLru};
use stackswap::{kdebug, kinfo, kwarn, CoroutineId, Engine, Scheduler};

use std::error::Error;
use std::rc::Rc;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

/// A value fetched by the loader pool for a parked client
struct Loaded {
    waiter: CoroutineId,
    key: String,
    value: String,
}

const CLIENTS: usize = 4;
const KEYS: [&str; 5] = ["alpha", "beta", "gamma", "alpha", "delta"];

// SSW_LOG_LEVEL=debug cargo run -p stackswap-basic
fn main() -> Result<(), Box<dyn Error>> {
    println!("=== stackswap basic example ===\n");

    let engine = Engine::new()?;
    let storage = Arc::new(StorageConfig::from_env().build()?);
    let loader = Rc::new(Executor::new(
        ExecutorConfig::from_env().name("loader").low_watermark(1),
    )?);
    let (done_tx, done_rx) = mpsc::channel::<Loaded>();

    for client in 0..CLIENTS {
        let storage = storage.clone();
        let loader = loader.clone();
        let done_tx = done_tx.clone();
        let id = engine.spawn(move |s| {
            serve_client(s, client, &storage, &loader, &done_tx);
        });
        println!("Spawned client {} ({}, {})", client, id, engine.state(id));
    }
    drop(done_tx);

    // Drive coroutines until everyone is finished or waiting on a load
    loop {
        engine.run();
        if engine.blocked_count() == 0 {
            break;
        }

        let first = match done_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(loaded) => loaded,
            Err(e) => {
                kwarn!("no load finished ({}), {} clients stuck", e, engine.blocked_count());
                break;
            }
        };
        for loaded in std::iter::once(first).chain(done_rx.try_iter()) {
            storage.put(&loaded.key, &loaded.value);
            engine.unblock(Some(loaded.waiter));
        }
    }

    loader.stop(true);
    println!("\nEngine:  {}", engine.stats());
    println!(
        "Storage: {} entries, {} bytes in {} stripes",
        storage.len(),
        storage.size(),
        storage.stripe_count()
    );
    println!("Loader:  {} loads", loader.completed());

    engine.teardown();
    println!("\n=== Example Complete ===");
    Ok(())
}

fn serve_client(
    s: &Scheduler,
    client: usize,
    storage: &StripedLru,
    loader: &Executor,
    done: &mpsc::Sender<Loaded>,
) {
    let Some(me) = s.current() else {
        return;
    };

    for key in KEYS.iter().skip(client % 2) {
        loop {
            if let Some(value) = storage.get(key) {
                kinfo!("client {}: {} = {}", client, key, value);
                break;
            }

            kdebug!("client {}: miss on {}, parking", client, key);
            let done = done.clone();
            let key_owned = key.to_string();
            let submitted = loader.submit(move || {
                std::thread::sleep(Duration::from_millis(10));
                let value = format!("{}-v{}", key_owned, key_owned.len());
                let _ = done.send(Loaded {
                    waiter: me,
                    key: key_owned,
                    value,
                });
            });
            if !submitted {
                // Loader saturated: let others run and retry
                s.yield_now();
                continue;
            }
            s.block(None);
        }
        s.yield_now();
    }
}
