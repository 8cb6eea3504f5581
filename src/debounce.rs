//! Keyed debounce timers.
//!
//! Bursts of raw events for the same key collapse into one delayed action:
//! every trigger re-arms the key's timer and aborts the one it replaces.
//! Triggers may come from any thread; timers always run on the runtime the
//! debouncer was created with.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

/// A scheduled action and the trigger that armed it.
struct Pending {
    generation: u64,
    task: JoinHandle<()>,
}

/// At most one scheduled action per key at any time.
pub struct Debouncer<K> {
    window: Duration,
    runtime: Handle,
    pending: Arc<Mutex<HashMap<K, Pending>>>,
    generation: AtomicU64,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Copy + Send + std::fmt::Debug + 'static,
{
    /// Create a debouncer scheduling onto `runtime`.
    pub fn new(runtime: Handle, window: Duration) -> Self {
        Self {
            window,
            runtime,
            pending: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// (Re)arm the timer for `key`; `action` runs once the window elapses
    /// without another trigger for the same key.
    pub fn trigger<F, Fut>(&self, key: K, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.pending);
        let window = self.window;

        // Held across the spawn so the new timer cannot look itself up
        // before it is registered.
        let mut table = self.pending.lock();
        if let Some(previous) = table.remove(&key) {
            trace!("Re-arming debounce timer for {:?}", key);
            previous.task.abort();
        }

        let task = self.runtime.spawn(async move {
            tokio::time::sleep(window).await;

            {
                let mut table = pending.lock();
                match table.get(&key) {
                    Some(current) if current.generation == generation => {
                        table.remove(&key);
                    }
                    _ => return,
                }
            }

            action().await;
        });

        table.insert(key, Pending { generation, task });
    }

    /// Number of keys with an armed timer.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Abort every armed timer.
    pub fn cancel_all(&self) {
        for (_, pending) in self.pending.lock().drain() {
            pending.task.abort();
        }
    }
}

impl<K> std::fmt::Debug for Debouncer<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("window", &self.window)
            .field("pending", &self.pending.lock().len())
            .finish_non_exhaustive()
    }
}

impl<K> Drop for Debouncer<K> {
    fn drop(&mut self) {
        for (_, pending) in self.pending.lock().drain() {
            pending.task.abort();
        }
    }
}
