//! Background Expiry Sweeper
//!
//! Lazy expiry only evicts keys that are accessed again. A key that expires
//! and is never touched would otherwise stay in memory forever, so a
//! dedicated thread runs [`StorageEngine::cleanup_expired`] at a fixed
//! interval.
//!
//! ## Design
//!
//! The sweeper thread:
//! 1. Runs one sweep pass (taking the engine lock for the pass)
//! 2. Waits on a condition variable for the interval or a stop signal
//! 3. Exits as soon as the stop flag is set
//!
//! [`ExpirySweeper::stop`] sets the flag, wakes the thread, and joins it, so
//! once it returns the sweeper no longer touches the engine.

use crate::storage::StorageEngine;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper thread is stopped and joined.
#[derive(Debug)]
pub struct ExpirySweeper {
    signal: Arc<StopSignal>,
    handle: Option<JoinHandle<()>>,
}

impl ExpirySweeper {
    /// Starts the expiry sweeper on its own thread.
    ///
    /// # Example
    ///
    /// ```
    /// use keystash::{ExpirySweeper, StorageEngine};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// let engine = Arc::new(StorageEngine::new());
    /// let sweeper = ExpirySweeper::start(Arc::clone(&engine), Duration::from_millis(250));
    ///
    /// // Sweeper runs in the background...
    ///
    /// // Dropping the sweeper stops it
    /// drop(sweeper);
    /// ```
    pub fn start(engine: Arc<StorageEngine>, interval: Duration) -> Self {
        let signal = Arc::new(StopSignal::default());
        let thread_signal = Arc::clone(&signal);

        let handle = thread::Builder::new()
            .name("keystash-sweeper".to_string())
            .spawn(move || sweeper_loop(engine, interval, thread_signal));

        let handle = match handle {
            Ok(handle) => {
                info!(interval_ms = interval.as_millis() as u64, "Background expiry sweeper started");
                Some(handle)
            }
            Err(e) => {
                warn!(error = %e, "Failed to spawn expiry sweeper, relying on lazy expiry");
                None
            }
        };

        Self { signal, handle }
    }

    /// Returns true while the sweeper thread is running.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stops the expiry sweeper and waits for the thread to exit.
    ///
    /// Calling this more than once is harmless. It is also called
    /// automatically when the handle is dropped.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        *self.signal.stopped.lock() = true;
        self.signal.wake.notify_all();

        if handle.join().is_err() {
            warn!("Expiry sweeper thread panicked");
        }
        info!("Background expiry sweeper stopped");
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
fn sweeper_loop(engine: Arc<StorageEngine>, interval: Duration, signal: Arc<StopSignal>) {
    loop {
        if *signal.stopped.lock() {
            break;
        }

        let expired = engine.cleanup_expired();
        if expired > 0 {
            debug!(
                expired = expired,
                keys_remaining = engine.len(),
                "Expired keys cleaned up"
            );
        }

        let mut stopped = signal.stopped.lock();
        if !*stopped {
            // Spurious wakeups just cause an early pass
            signal.wake.wait_for(&mut stopped, interval);
        }
        if *stopped {
            break;
        }
    }

    debug!("Expiry sweeper received shutdown signal");
}

/// Starts the expiry sweeper with the engine's configured interval.
///
/// This is a convenience function for simple use cases.
pub fn start_expiry_sweeper(engine: Arc<StorageEngine>) -> ExpirySweeper {
    let interval = engine.config().sweep_interval;
    ExpirySweeper::start(engine, interval)
}
