//! Bootstraps the dedicated engine thread: its own single-threaded
//! tokio runtime owning an `rquickjs::AsyncRuntime`/`AsyncContext`,
//! grounded directly on `JsRuntimeAdapter::new`/`load_mod_async` in the
//! teacher. The `block_in_place`/`block_on` dance the teacher uses to
//! share a thread pool is replaced here by genuinely dedicating one OS
//! thread, since spec.md §4.5 requires a *real* engine thread rather
//! than a thread-pool-shared one.

use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use gode_error::{ErrorKind, ModuleError};
use rquickjs::{AsyncContext, AsyncRuntime};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::js_error::module_error_from_rejection;
use crate::queue::QueueItem;

thread_local! {
    /// The currently-executing job's `Ctx`, stashed as a raw pointer for
    /// the duration of one `AsyncContext::with` call. Backs
    /// `current_engine_reference`: valid only while read from inside a
    /// closure the queue is actively running.
    static CURRENT_CTX: Cell<*mut c_void> = const { Cell::new(std::ptr::null_mut()) };

    /// The most recent unhandled promise rejection observed while the
    /// currently-running job was executing, if any. `enqueue_awaitable`
    /// clears this before running its job and consumes it after, so that
    /// a rejection surfacing during an in-flight awaitable call threads
    /// back to whoever is waiting on it instead of only being logged.
    static PENDING_REJECTION: RefCell<Option<ModuleError>> = const { RefCell::new(None) };
}

/// Read the engine-reference pointer for the job currently running on
/// this thread. Returns null outside of a queued job (e.g. if called
/// from the wrong thread).
pub(crate) fn current_engine_reference() -> *mut c_void {
    CURRENT_CTX.with(|cell| cell.get())
}

/// Discard any rejection recorded for the job about to run.
pub(crate) fn clear_pending_rejection() {
    PENDING_REJECTION.with(|cell| *cell.borrow_mut() = None);
}

/// Take whatever rejection was recorded while the current job ran, if
/// any.
pub(crate) fn take_pending_rejection() -> Option<ModuleError> {
    PENDING_REJECTION.with(|cell| cell.borrow_mut().take())
}

fn record_pending_rejection(err: ModuleError) {
    PENDING_REJECTION.with(|cell| *cell.borrow_mut() = Some(err));
}

/// Bootstrap configuration for the engine thread. Kept intentionally
/// small: manifest-driven globals and built-ins are installed later, on
/// the engine thread itself, via `Queue::enqueue` from the facade's
/// `configure`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub thread_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            thread_name: "gode-engine".to_string(),
        }
    }
}

pub(crate) fn spawn(
    config: EngineConfig,
) -> Result<(mpsc::UnboundedSender<QueueItem>, JoinHandle<()>, Arc<AtomicBool>), ModuleError> {
    let (tx, rx) = mpsc::unbounded_channel::<QueueItem>();
    let disposed = Arc::new(AtomicBool::new(false));
    let disposed_for_thread = disposed.clone();

    // A plain `std::sync::mpsc` channel reports bootstrap success or
    // failure back to the caller, which blocks on it below — the
    // engine thread's own tokio runtime isn't available yet to do this
    // with an async handshake.
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), String>>();

    let handle = std::thread::Builder::new()
        .name(config.thread_name.clone())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("failed to build engine-thread runtime: {}", e)));
                    return;
                }
            };

            runtime.block_on(async move {
                let async_runtime = match AsyncRuntime::new() {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("failed to create script engine: {}", e)));
                        return;
                    }
                };

                async_runtime
                    .set_host_promise_rejection_tracker(Some(Box::new(
                        |_ctx, _promise, reason, is_handled| {
                            if !is_handled {
                                let err = module_error_from_rejection("<unhandled-promise>", &reason);
                                error!("{}", gode_error::format(&err));
                                record_pending_rejection(err);
                            }
                        },
                    )))
                    .await;

                let context = match AsyncContext::full(&async_runtime).await {
                    Ok(ctx) => ctx,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("failed to create script context: {}", e)));
                        return;
                    }
                };

                let _ = ready_tx.send(Ok(()));
                run_loop(rx, context).await;
                disposed_for_thread.store(true, Ordering::SeqCst);
                debug!("engine thread shutting down");
            });
        })
        .map_err(|e| ModuleError::new(ErrorKind::Initialization, "", "", "spawn", e.to_string()))?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok((tx, handle, disposed)),
        Ok(Err(message)) => Err(ModuleError::new(ErrorKind::Initialization, "", "", "configure", message)),
        Err(_) => Err(ModuleError::new(
            ErrorKind::Initialization,
            "",
            "",
            "configure",
            "engine thread exited before completing bootstrap",
        )),
    }
}

async fn run_loop(mut rx: mpsc::UnboundedReceiver<QueueItem>, context: AsyncContext) {
    while let Some(item) = rx.recv().await {
        match item {
            QueueItem::Shutdown => break,
            QueueItem::Exec(job) => {
                context
                    .with(|ctx| {
                        let ptr = ctx.as_raw().as_ptr() as *mut c_void;
                        CURRENT_CTX.with(|cell| cell.set(ptr));
                        job(ctx);
                        CURRENT_CTX.with(|cell| cell.set(std::ptr::null_mut()));
                    })
                    .await;
            }
        }
    }
}
