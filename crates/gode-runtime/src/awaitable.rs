//! `Awaitable<T>`: the handle returned by `Queue::enqueue_awaitable`
//! (spec.md §4.5). A thin wrapper over a oneshot receiver so a native
//! caller on any thread can block for the result of work run on the
//! engine thread.

use std::time::Duration;

use gode_error::{ErrorKind, ModuleError};
use tokio::sync::oneshot;

/// The result of work submitted via `Queue::enqueue_awaitable`, carried
/// back from the engine thread over a one-shot channel.
pub struct Awaitable<T> {
    rx: oneshot::Receiver<Result<T, ModuleError>>,
}

impl<T> Awaitable<T> {
    pub(crate) fn new(rx: oneshot::Receiver<Result<T, ModuleError>>) -> Self {
        Awaitable { rx }
    }

    /// Block the calling thread until the work completes. If the
    /// engine thread is disposed before completing the work, the
    /// channel closes and this yields a `Scheduling` error.
    pub fn wait(self) -> Result<T, ModuleError> {
        self.rx
            .blocking_recv()
            .unwrap_or_else(|_| Err(scheduling_error("the execution serializer was disposed")))
    }

    /// Bound the wait with `timeout`. On timeout the work is left to
    /// run to completion on the engine thread (spec.md §4.5's
    /// cancellation note: timing out an awaitable never cancels the
    /// work); only the caller's wait is bounded.
    pub fn wait_with_timeout(self, timeout: Duration) -> Result<T, ModuleError> {
        // `blocking_recv` has no timeout variant, and this handle may be
        // used from a thread with no tokio runtime (a plugin's own
        // worker thread), so a plain thread-based deadline is used
        // instead of `tokio::time::timeout`.
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let _ = done_tx.send(self.rx.blocking_recv());
        });

        match done_rx.recv_timeout(timeout) {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(scheduling_error("the execution serializer was disposed")),
            Err(_) => Err(scheduling_error("timed out waiting for queued work")),
        }
    }
}

fn scheduling_error(message: &str) -> ModuleError {
    ModuleError::new(ErrorKind::Scheduling, "", "", "wait", message)
}
