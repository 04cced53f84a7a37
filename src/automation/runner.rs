//! Worker threads for the long-running loops.
//!
//! At most one instance of each named loop runs at a time. The loop body
//! runs on its own thread; a panic inside it is logged and turned into a
//! failed [`Outcome`] instead of taking the process down.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, OnceLock};
use std::thread::{self, JoinHandle};

use crate::automation::state::Outcome;
use crate::error::{AutomationError, Result};

fn running() -> &'static Mutex<HashSet<String>> {
    static RUNNING: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    RUNNING.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Checks if a loop with this name is currently running.
pub fn is_running(name: &str) -> bool {
    running()
        .lock()
        .map(|set| set.contains(name))
        .unwrap_or(false)
}

/// Removes the name from the registry when the worker ends.
struct RunningGuard(String);

impl RunningGuard {
    fn acquire(name: &str) -> Result<Self> {
        let mut set = running().lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(name.to_string()) {
            return Err(AutomationError::AlreadyRunning(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut set = running().lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.0);
    }
}

/// Starts `job` on a thread named `name`.
///
/// # Errors
/// Returns an error if:
/// - A loop with the same name is already running
/// - The thread cannot be spawned
pub fn start<F>(name: &str, job: F) -> Result<JoinHandle<Outcome>>
where
    F: FnOnce() -> Outcome + Send + 'static,
{
    let guard = RunningGuard::acquire(name)?;
    let thread_name = name.to_string();

    let handle = thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            let _guard = guard;
            tracing::info!("{} started", thread_name);
            let outcome = match panic::catch_unwind(AssertUnwindSafe(job)) {
                Ok(outcome) => outcome,
                Err(payload) => {
                    let reason = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!("{} panicked: {}", thread_name, reason);
                    Outcome::failed(format!("发生意外错误：{}", reason))
                }
            };
            tracing::info!("{} finished: {}", thread_name, outcome);
            outcome
        })
        .map_err(anyhow::Error::from)?;

    Ok(handle)
}

/// Waits for a worker and unwraps its outcome.
pub fn join(handle: JoinHandle<Outcome>) -> Outcome {
    handle
        .join()
        .unwrap_or_else(|_| Outcome::failed("worker thread panicked"))
}
