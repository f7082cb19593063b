//! The execution serializer (spec.md §4.5): a single dedicated engine
//! thread pulling `QueueItem`s off an unbounded channel in FIFO order,
//! grounded on the `command_tx`/`event_rx` channel-pair shape of
//! `stam_mod_runtimes::api::graphic::proxy::GraphicProxy`, generalized
//! from graphics commands to arbitrary engine closures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread::JoinHandle;

use gode_error::{ErrorKind, ModuleError};
use rquickjs::Ctx;
use tokio::sync::{mpsc, oneshot};

use crate::awaitable::Awaitable;
use crate::engine::{self, EngineConfig};

/// A unit of engine-thread work. `for<'js>` because the `Ctx` handed to
/// the job only lives for the duration of one `AsyncContext::with`
/// call; the job itself is plain owned data until then, which is what
/// lets it cross the channel from an arbitrary producer thread.
pub(crate) type EngineJob = Box<dyn for<'js> FnOnce(Ctx<'js>) + Send + 'static>;

pub(crate) enum QueueItem {
    Exec(EngineJob),
    Shutdown,
}

/// The submission endpoint for the execution serializer. Cloning is
/// cheap (an `Arc`-backed sender); every clone submits to the same
/// engine thread.
pub struct Queue {
    tx: mpsc::UnboundedSender<QueueItem>,
    disposed: std::sync::Arc<AtomicBool>,
    dispose_started: std::sync::Arc<AtomicBool>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl Queue {
    /// Spawn the dedicated engine thread and block until it has
    /// finished bootstrapping the script engine (or failed to).
    pub fn start(config: EngineConfig) -> Result<Self, ModuleError> {
        let (tx, join, disposed) = engine::spawn(config)?;
        Ok(Queue {
            tx,
            disposed,
            dispose_started: std::sync::Arc::new(AtomicBool::new(false)),
            join: Mutex::new(Some(join)),
        })
    }

    /// Fire-and-forget: run `job` on the engine thread. Returns
    /// immediately; does not wait for `job` to run.
    pub fn enqueue(&self, job: impl for<'js> FnOnce(Ctx<'js>) + Send + 'static) -> Result<(), ModuleError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(disposed_error());
        }
        self.tx
            .send(QueueItem::Exec(Box::new(job)))
            .map_err(|_| disposed_error())
    }

    /// Run `work` on the engine thread and return a handle the caller
    /// can block on for the result.
    pub fn enqueue_awaitable<T, F>(&self, work: F) -> Result<Awaitable<T>, ModuleError>
    where
        T: Send + 'static,
        F: for<'js> FnOnce(Ctx<'js>) -> Result<T, ModuleError> + Send + 'static,
    {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(disposed_error());
        }
        let (done_tx, done_rx) = oneshot::channel();
        let job: EngineJob = Box::new(move |ctx| {
            engine::clear_pending_rejection();
            let result = work(ctx);
            // An unhandled promise rejection observed while `work` ran
            // threads back to this call rather than only being logged,
            // as long as `work` itself didn't already report a more
            // specific failure.
            let result = match (result, engine::take_pending_rejection()) {
                (Ok(value), None) => Ok(value),
                (Ok(_), Some(rejection)) => Err(rejection),
                (Err(e), _) => Err(e),
            };
            let _ = done_tx.send(result);
        });
        self.tx
            .send(QueueItem::Exec(job))
            .map_err(|_| disposed_error())?;
        Ok(Awaitable::new(done_rx))
    }

    /// Convenience path for native callers that just need to invoke a
    /// callable on the engine thread and observe any error, without
    /// otherwise touching its return value.
    pub fn call_script_callable<F>(&self, work: F) -> Result<(), ModuleError>
    where
        F: for<'js> FnOnce(Ctx<'js>) -> Result<(), ModuleError> + Send + 'static,
    {
        self.enqueue_awaitable(work)?.wait()
    }

    /// Orderly teardown: drains pending items, halts the engine thread,
    /// and joins it. Idempotent — a second call is a no-op.
    pub fn dispose(&self) -> Result<(), ModuleError> {
        if self.dispose_started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.disposed.store(true, Ordering::SeqCst);
        let _ = self.tx.send(QueueItem::Shutdown);

        if let Some(handle) = self.join.lock().unwrap().take() {
            let _ = handle.join();
        }
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// The engine-reference escape hatch, valid only for the duration
    /// of whatever job is currently running on this thread. Returns
    /// null when called from any other thread.
    pub fn engine_reference(&self) -> *mut std::ffi::c_void {
        engine::current_engine_reference()
    }
}

pub(crate) fn disposed_error() -> ModuleError {
    ModuleError::new(
        ErrorKind::Scheduling,
        "",
        "",
        "enqueue",
        "the execution serializer has been disposed",
    )
}
