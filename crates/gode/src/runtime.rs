//! `HostRuntime`: the minimal embedding surface (spec.md §4.6),
//! composing the manifest resolver/loader, the plugin bridge, and the
//! execution serializer behind `configure`/`run`/`execute`/
//! `register_module`/`set_global`/`dispose`. Grounded on the
//! `JsRuntimeAdapter` struct in the teacher, which plays the same
//! "owns the engine thread, exposes a narrow lifecycle API" role.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use gode_error::{ErrorKind, ModuleError};
use gode_manifest::Manifest;
use gode_plugin::{PluginBridge, Scheduler};
use gode_runtime::{CallbackRegistry, EngineConfig, Queue, QueueScheduler};
use rquickjs::{Ctx, Persistent, Value};

use crate::require;

/// State shared between every `require` call and the runtime itself.
/// Kept behind one `Arc` so nested `require` closures can clone a
/// handle to it cheaply.
pub(crate) struct RuntimeInner {
    pub(crate) manifest: RwLock<Manifest>,
    pub(crate) module_cache: gode_manifest::ModuleCache,
    js_module_cache: Mutex<HashMap<String, Persistent<Value<'static>>>>,
    pub(crate) builtins: RwLock<HashMap<String, serde_json::Value>>,
    pub(crate) plugin_bridge: Arc<PluginBridge>,
    pub(crate) callbacks: Arc<CallbackRegistry>,
}

impl RuntimeInner {
    /// Look up a previously-evaluated module's exports by input
    /// specifier, restoring the persisted value against the live
    /// `ctx`. Gives `require` its singleton-per-specifier semantics.
    pub(crate) fn get_cached_export<'js>(&self, ctx: &Ctx<'js>, specifier: &str) -> Option<Value<'js>> {
        let cache = self.js_module_cache.lock().unwrap();
        cache.get(specifier)?.clone().restore(ctx.clone()).ok()
    }

    pub(crate) fn cache_export<'js>(&self, ctx: &Ctx<'js>, specifier: &str, value: &Value<'js>) {
        let persistent = Persistent::save(ctx.clone(), value.clone());
        self.js_module_cache.lock().unwrap().insert(specifier.to_string(), persistent);
    }
}

/// Bootstrap configuration for a [`HostRuntime`]. `log_filter` seeds
/// `gode_log::init` so embedders get queue/resolution/plugin
/// diagnostics for free, matching every other crate in this workspace.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub log_filter: String,
    pub engine_thread_name: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            log_filter: "info".to_string(),
            engine_thread_name: "gode-engine".to_string(),
        }
    }
}

/// The host-facing handle passed as the first argument of plugin
/// exports per spec.md §4.4/§4.6: `enqueue`, `enqueue_awaitable`,
/// `get_engine_reference`.
pub struct HostHandle {
    queue: Arc<Queue>,
}

impl HostHandle {
    pub fn enqueue(&self, job: impl for<'js> FnOnce(Ctx<'js>) + Send + 'static) -> Result<(), ModuleError> {
        self.queue.enqueue(job)
    }

    pub fn enqueue_awaitable<T, F>(&self, work: F) -> Result<gode_runtime::Awaitable<T>, ModuleError>
    where
        T: Send + 'static,
        F: for<'js> FnOnce(Ctx<'js>) -> Result<T, ModuleError> + Send + 'static,
    {
        self.queue.enqueue_awaitable(work)
    }

    pub fn get_engine_reference(&self) -> *mut std::ffi::c_void {
        self.queue.engine_reference()
    }
}

/// Composes the resolver, loader, plugin bridge, and execution
/// serializer behind the minimal embedding surface spec.md §4.6
/// describes.
pub struct HostRuntime {
    queue: Arc<Queue>,
    inner: Arc<RuntimeInner>,
    configured: AtomicBool,
    disposed: AtomicBool,
}

impl HostRuntime {
    /// Spawn the engine thread and wire the plugin bridge's scheduler
    /// to it. Blocks until the script engine has finished bootstrapping.
    pub fn new(config: HostConfig) -> Result<Self, ModuleError> {
        gode_log::init(&config.log_filter);

        let queue = Arc::new(Queue::start(EngineConfig {
            thread_name: config.engine_thread_name,
        })?);
        let callbacks = Arc::new(CallbackRegistry::new());
        let scheduler: Arc<dyn Scheduler> = Arc::new(QueueScheduler::new(queue.clone(), callbacks.clone()));
        let plugin_bridge = Arc::new(PluginBridge::new(scheduler));

        let inner = Arc::new(RuntimeInner {
            manifest: RwLock::new(Manifest::default_at(".")),
            module_cache: gode_manifest::ModuleCache::default(),
            js_module_cache: Mutex::new(HashMap::new()),
            builtins: RwLock::new(HashMap::new()),
            plugin_bridge,
            callbacks,
        });

        Ok(HostRuntime {
            queue,
            inner,
            configured: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        })
    }

    /// Install `manifest` as the active project descriptor. Required
    /// once before `run`/`execute` resolve any non-trivial specifier;
    /// `run` calls this automatically via `Manifest::discover` if it
    /// hasn't been called yet.
    pub fn configure(&self, manifest: Manifest) -> Result<(), ModuleError> {
        *self.inner.manifest.write().unwrap() = manifest;
        self.configured.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Evaluate `entry_path` as the program entry. Reads the file
    /// off-thread, then enqueues evaluation and blocks until it
    /// completes.
    pub fn run(&self, entry_path: impl AsRef<Path>) -> Result<(), ModuleError> {
        self.ensure_not_disposed()?;
        let entry_path = entry_path.as_ref().to_path_buf();

        if !self.configured.swap(true, Ordering::SeqCst) {
            let manifest = Manifest::discover(&entry_path)
                .map_err(|e| e.into_module_error(&entry_path.display().to_string(), &entry_path.display().to_string()))?;
            *self.inner.manifest.write().unwrap() = manifest;
        }

        let source = std::fs::read_to_string(&entry_path)
            .map_err(|e| ModuleError::new(ErrorKind::Io, "", entry_path.display().to_string(), "read", e.to_string()))?;

        let inner = self.inner.clone();
        let label = entry_path.display().to_string();
        let referrer = entry_path.clone();

        self.queue.call_script_callable(move |ctx| {
            require::install(&ctx, &inner, referrer.clone())
                .map_err(|e| crate::error::js_error_to_module_error(&ctx, &label, &referrer, "configure", e))?;

            let _: Value = ctx
                .eval(source.into_bytes())
                .map_err(|e| crate::error::js_error_to_module_error(&ctx, &label, &referrer, "eval", e))?;

            Ok(())
        })
    }

    /// Evaluate `source` under file label `name`, returning its
    /// completion value as JSON. Used for in-process testing and REPL
    /// drivers rather than normal program entry.
    pub fn execute(&self, name: &str, source: &str) -> Result<serde_json::Value, ModuleError> {
        self.ensure_not_disposed()?;

        let inner = self.inner.clone();
        let label = name.to_string();
        let referrer = PathBuf::from(name);
        let source = source.to_string();
        let callbacks = self.inner.callbacks.clone();

        self.queue
            .enqueue_awaitable(move |ctx| {
                require::install(&ctx, &inner, referrer.clone())
                    .map_err(|e| crate::error::js_error_to_module_error(&ctx, &label, &referrer, "configure", e))?;

                let value: Value = ctx
                    .eval(source.into_bytes())
                    .map_err(|e| crate::error::js_error_to_module_error(&ctx, &label, &referrer, "eval", e))?;

                gode_runtime::js_to_json(&ctx, &value, &callbacks)
                    .map_err(|e| ModuleError::new(ErrorKind::Format, &label, "", "eval", e))
            })?
            .wait()
    }

    /// Register a host-provided JSON value as an importable built-in
    /// module, reachable from script as `require("gode:<name>")`.
    pub fn register_module(&self, name: &str, value: serde_json::Value) -> Result<(), ModuleError> {
        self.inner.builtins.write().unwrap().insert(name.to_string(), value);
        Ok(())
    }

    /// Install a global binding on the engine thread.
    pub fn set_global(&self, name: &str, value: serde_json::Value) -> Result<(), ModuleError> {
        self.ensure_not_disposed()?;
        let name = name.to_string();

        self.queue.call_script_callable(move |ctx| {
            let js_value = gode_runtime::json_to_js(&ctx, &value)
                .map_err(|e| ModuleError::new(ErrorKind::Format, &name, "", "set_global", e))?;
            ctx.globals()
                .set(name.as_str(), js_value)
                .map_err(|e| ModuleError::new(ErrorKind::Interface, &name, "", "set_global", e.to_string()))
        })
    }

    /// Orderly teardown: disposes every loaded plugin, then drains and
    /// joins the engine thread. Idempotent.
    pub fn dispose(&self) -> Result<(), ModuleError> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.plugin_bridge.dispose_all();
        self.queue.dispose()
    }

    /// The host-handle value usable as the first parameter of a plugin
    /// export that needs direct queue access (spec.md §4.6).
    pub fn host_handle(&self) -> HostHandle {
        HostHandle { queue: self.queue.clone() }
    }

    fn ensure_not_disposed(&self) -> Result<(), ModuleError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(ModuleError::new(
                ErrorKind::Scheduling,
                "",
                "",
                "run",
                "the host runtime has been disposed",
            ));
        }
        Ok(())
    }
}

impl Drop for HostRuntime {
    fn drop(&mut self) {
        let _ = self.dispose();
    }
}
