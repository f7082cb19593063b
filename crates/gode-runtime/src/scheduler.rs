//! Implements `gode_plugin::Scheduler` on top of `Queue`, letting a
//! native plugin's own worker thread re-enter the engine thread to
//! either run arbitrary work (`enqueue`) or invoke a script callback it
//! was handed earlier (`invoke_callback`).

use std::ffi::c_void;
use std::sync::Arc;

use gode_plugin::Scheduler;

use crate::callback::CallbackRegistry;
use crate::engine;
use crate::queue::Queue;
use crate::value_convert::{js_to_json, json_to_js};

/// The concrete scheduler the facade hands to `PluginBridge::new`.
/// Cheap to clone; everything it holds is already `Arc`-backed.
pub struct QueueScheduler {
    queue: Arc<Queue>,
    callbacks: Arc<CallbackRegistry>,
}

impl QueueScheduler {
    pub fn new(queue: Arc<Queue>, callbacks: Arc<CallbackRegistry>) -> Self {
        QueueScheduler { queue, callbacks }
    }
}

impl Scheduler for QueueScheduler {
    fn enqueue(&self, work: Box<dyn FnOnce() + Send>) {
        // The plugin's work doesn't touch script state directly, so the
        // `Ctx` handed to it by the engine thread is simply ignored;
        // what matters is that `work` runs while `CURRENT_CTX` is set,
        // so a nested `engine_reference()` call still resolves.
        let _ = self.queue.enqueue(move |_ctx| work());
    }

    fn engine_reference(&self) -> *mut c_void {
        engine::current_engine_reference()
    }

    fn invoke_callback(&self, token: &str, args_json: &str) -> Result<String, String> {
        let token = token.to_string();
        let args_json = args_json.to_string();
        let callbacks = self.callbacks.clone();

        let result = self
            .queue
            .enqueue_awaitable(move |ctx| {
                let args: serde_json::Value = serde_json::from_str(&args_json)
                    .map_err(|e| scheduling_error(format!("invalid callback arguments: {}", e)))?;
                let args = match args {
                    serde_json::Value::Array(items) => items,
                    other => vec![other],
                };

                let func = callbacks
                    .resolve(&ctx, &token)
                    .ok_or_else(|| scheduling_error(format!("unknown callback token: {}", token)))?;

                let mut js_args = Vec::with_capacity(args.len());
                for arg in &args {
                    let js_arg = json_to_js(&ctx, arg).map_err(scheduling_error)?;
                    js_args.push(js_arg);
                }

                let call_result = func
                    .call::<_, rquickjs::Value>(rquickjs::function::Rest(js_args));

                match call_result {
                    Ok(value) => js_to_json(&ctx, &value, &callbacks).map_err(scheduling_error),
                    Err(err) => Err(crate::js_error::module_error_from_exception(
                        "", "", "invoke_callback", &ctx, &err,
                    )),
                }
            })
            .map_err(|e| e.to_string())?
            .wait();

        match result {
            Ok(json_value) => {
                serde_json::to_string(&json_value).map_err(|e| format!("failed to encode callback result: {}", e))
            }
            Err(err) => Err(gode_error::format(&err)),
        }
    }
}

fn scheduling_error(message: impl Into<String>) -> gode_error::ModuleError {
    gode_error::ModuleError::new(
        gode_error::ErrorKind::Scheduling,
        "",
        "",
        "invoke_callback",
        message.into(),
    )
}
