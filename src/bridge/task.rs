//! A small supervised-background-task primitive: idempotent start/stop,
//! safe to call repeatedly (including from a path that's already unwinding
//! a failure), built around a `running: Arc<AtomicBool>` flag that the
//! supervised task itself clears just before returning.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Owns at most one running background task. `ensure_running` is a no-op if
/// a task is already live; `ensure_stopped` is a no-op if none is.
pub struct BackgroundTaskManager {
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Default for BackgroundTaskManager {
    fn default() -> Self {
        BackgroundTaskManager {
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }
}

impl BackgroundTaskManager {
    pub fn new() -> BackgroundTaskManager {
        BackgroundTaskManager::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawns `make_future(running_flag)` unless a task is already running.
    /// The task is expected to clear `running_flag` itself just before it
    /// returns, so that `is_running` reflects reality even if nobody calls
    /// `ensure_stopped`.
    pub async fn ensure_running<F, Fut>(&self, make_future: F)
    where
        F: FnOnce(Arc<AtomicBool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut guard = self.handle.lock().await;
        if self.is_running() {
            return;
        }
        if let Some(finished) = guard.take() {
            if !finished.is_finished() {
                finished.abort();
            }
        }
        self.running.store(true, Ordering::SeqCst);
        let future = make_future(Arc::clone(&self.running));
        *guard = Some(tokio::spawn(future));
    }

    /// Stops the task if one is running. Safe to call when none is, and
    /// safe to call more than once.
    pub async fn ensure_stopped(&self) {
        self.running.store(false, Ordering::SeqCst);
        let mut guard = self.handle.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
        }
    }
}
