//! Worker tasks
//!
//! Each long-running loop runs on its own named thread. The handle exposes a
//! cancellation flag that the loop polls once per cycle, so shutdown is
//! cooperative and never forced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Cooperative cancellation flag shared between a handle and its loop
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Handle to a spawned worker
pub struct TaskHandle {
    name: String,
    cancel: CancelToken,
    finished: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl TaskHandle {
    /// Spawn `work` on a named thread. The closure receives the task's token.
    pub fn spawn<F>(name: &str, work: F) -> std::io::Result<Self>
    where
        F: FnOnce(CancelToken) + Send + 'static,
    {
        let cancel = CancelToken::new();
        let finished = Arc::new(AtomicBool::new(false));

        let cancel_clone = cancel.clone();
        let finished_clone = Arc::clone(&finished);
        let thread_name = name.to_string();

        let thread_handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                tracing::info!("Worker '{}' started", thread_name);
                work(cancel_clone);
                finished_clone.store(true, Ordering::Release);
                tracing::info!("Worker '{}' finished", thread_name);
            })?;

        Ok(Self {
            name: name.to_string(),
            cancel,
            finished,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the loop to stop at its next cycle
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Wait for the worker to exit
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                tracing::error!("Worker '{}' panicked", self.name);
            }
        }
    }

    /// Stop tracking the thread without waiting for it. The token stays
    /// cancelled so the worker exits whenever it next polls.
    pub fn detach(&mut self) {
        if self.thread_handle.take().is_some() {
            tracing::debug!("Detached worker '{}'", self.name);
        }
    }
}
