//! The scheduling capability the bridge needs from the execution
//! serializer, without depending on `gode-runtime` directly (the
//! dependency runs the other way: `gode-runtime` depends on
//! `gode-plugin`, not vice versa, to keep the plugin bridge usable
//! standalone).

use std::ffi::c_void;

/// Implemented by `gode_runtime::Queue` (or any execution serializer).
/// Lets native plugin callbacks re-enter the engine thread instead of
/// touching engine state directly from a worker thread.
pub trait Scheduler: Send + Sync {
    /// Schedule `work` to run on the engine thread. Must be safe to call
    /// from any thread, including ones the plugin itself spawned.
    fn enqueue(&self, work: Box<dyn FnOnce() + Send>);

    /// An opaque pointer to the engine instance, valid only while used
    /// inside a closure passed to `enqueue`. Plugins that need to build
    /// engine values directly (rather than via JSON marshalling) use
    /// this as an escape hatch.
    fn engine_reference(&self) -> *mut c_void;

    /// Invoke the script callable identified by `token` (a
    /// `$gode_callback` marker minted when a script function crossed
    /// into a plugin call) with JSON-encoded `args`, blocking the
    /// calling thread until the engine thread has run it. Safe to call
    /// from any native thread, including a worker thread a plugin
    /// spawned — the call re-enters the engine thread internally rather
    /// than touching script state directly.
    fn invoke_callback(&self, token: &str, args_json: &str) -> Result<String, String>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// A `Scheduler` that runs enqueued work immediately, inline, for
    /// unit tests that don't need real cross-thread scheduling.
    #[derive(Default)]
    pub struct InlineScheduler {
        pub ran: Arc<Mutex<Vec<()>>>,
    }

    impl Scheduler for InlineScheduler {
        fn enqueue(&self, work: Box<dyn FnOnce() + Send>) {
            work();
            self.ran.lock().unwrap().push(());
        }

        fn engine_reference(&self) -> *mut c_void {
            std::ptr::null_mut()
        }

        fn invoke_callback(&self, _token: &str, _args_json: &str) -> Result<String, String> {
            Err("InlineScheduler does not host any script callables".to_string())
        }
    }
}
