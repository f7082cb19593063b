//! `PluginBridge`: the facade over discovery, registry, and export
//! wrapping — the single entry point `gode-runtime` uses to satisfy a
//! `ResolvedSpecifier::NativePlugin`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gode_error::{safe_operation, safe_operation_with_result, ErrorKind, ModuleError};
use tracing::{info, instrument};

use crate::discovery::{self, DiscoveredPlugin};
use crate::error::PluginError;
use crate::export::PluginExport;
use crate::registry::{PluginRecord, PluginRegistry};
use crate::scheduler::Scheduler;

pub struct PluginBridge {
    registry: PluginRegistry,
    scheduler: Arc<Box<Arc<dyn Scheduler>>>,
}

impl PluginBridge {
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        PluginBridge {
            registry: PluginRegistry::default(),
            scheduler: Arc::new(Box::new(scheduler)),
        }
    }

    /// Load the plugin at `path` (if not already loaded) and return its
    /// record. `path` must already be absolute (the resolver's job).
    #[instrument(name = "plugin.load", skip(self), fields(path = %path.display()))]
    pub fn load(&self, path: &Path) -> Result<Arc<PluginRecord>, ModuleError> {
        if let Some(existing) = self.registry.get_by_path(path) {
            return Ok(existing);
        }

        let discovered = discovery::discover(path)
            .map_err(|e| e.into_module_error(&path.display().to_string()))?;

        if discovered.direct_mode {
            info!(path = %path.display(), name = %discovered.name, "plugin loaded in direct mode (no discovery protocol)");
        }

        let exports = self.wrap_exports(&discovered);

        if let Some(initialize) = discovered.initialize {
            let host_handle = self.host_handle();
            let name = discovered.name.clone();
            safe_operation_with_result(
                &name,
                "initialize",
                move || -> Result<(), String> {
                    let err_ptr = unsafe { initialize(host_handle) };
                    match unsafe { crate::abi::read_c_string(err_ptr) } {
                        Some(message) if !message.is_empty() => Err(message),
                        _ => Ok(()),
                    }
                },
                |message| ModuleError::new(ErrorKind::Initialization, &name, "", "initialize", message),
            )?;
        }

        let record = PluginRecord {
            canonical_name: discovered.name.clone(),
            version: discovered.version.clone(),
            path: path.to_path_buf(),
            exports,
            initialized: discovered.initialize.is_some(),
            dispose: discovered.dispose,
        };

        Ok(self.registry.insert(path.to_path_buf(), record))
    }

    fn wrap_exports(&self, discovered: &DiscoveredPlugin) -> HashMap<String, Arc<PluginExport>> {
        discovered
            .exports
            .iter()
            .map(|export| {
                let wrapped = PluginExport::new(
                    discovered.name.clone(),
                    export,
                    discovered.library.clone(),
                    self.scheduler.clone(),
                );
                (export.name.clone(), Arc::new(wrapped))
            })
            .collect()
    }

    fn host_handle(&self) -> crate::abi::HostHandleFfi {
        crate::abi::HostHandleFfi {
            ctx: Arc::as_ptr(&self.scheduler) as *mut std::ffi::c_void,
            vtable: &HOST_HANDLE_VTABLE_FOR_INIT,
        }
    }

    pub fn get_export(&self, canonical_name: &str, export_name: &str) -> Option<Arc<PluginExport>> {
        self.registry.get_export(canonical_name, export_name)
    }

    pub fn get_record(&self, canonical_name: &str) -> Option<Arc<PluginRecord>> {
        self.registry.get_by_name(canonical_name)
    }

    /// Unload one plugin: calls `Dispose` (if present) under
    /// `safe_operation`, then removes both registry entries. The shared
    /// object itself stays mapped (see spec.md §9's unload note); only
    /// the logical registration is removed.
    pub fn unload(&self, path: &Path) -> Result<(), ModuleError> {
        let Some(record) = self.registry.remove(path) else {
            return Err(PluginError::NotFound(path.display().to_string())
                .into_module_error(&path.display().to_string()));
        };

        let name = record.canonical_name.clone();
        if let Some(dispose) = record.dispose {
            safe_operation(&name, "dispose", move || {
                let err_ptr = unsafe { dispose() };
                if let Some(message) = unsafe { crate::abi::read_c_string(err_ptr) } {
                    if !message.is_empty() {
                        tracing::warn!(plugin = %name, "Dispose() reported an error: {}", message);
                    }
                }
            })?;
        }
        Ok(())
    }

    /// Dispose every loaded plugin. Used by the facade's `dispose()`.
    pub fn dispose_all(&self) {
        for path in self.registry.loaded_paths() {
            if let Err(err) = self.unload(&path) {
                tracing::warn!(path = %path.display(), "plugin dispose failed: {}", err);
            }
        }
    }
}

// `Initialize` runs before a `PluginExport` exists to carry the real
// vtable, so the bridge builds one private vtable instance for the
// init call alone. Functionally identical to `export::HOST_HANDLE_VTABLE`.
static HOST_HANDLE_VTABLE_FOR_INIT: crate::abi::HostHandleVTable = crate::abi::HostHandleVTable {
    enqueue: init_enqueue_trampoline,
    get_engine_reference: init_get_engine_reference_trampoline,
    invoke_callback: init_invoke_callback_trampoline,
};

unsafe extern "C-unwind" fn init_enqueue_trampoline(
    ctx: *mut std::ffi::c_void,
    work: crate::abi::PluginCallbackFfi,
    user_data: *mut std::ffi::c_void,
) {
    let scheduler: &Arc<dyn Scheduler> = &*(ctx as *const Arc<dyn Scheduler>);
    let work_addr = work as usize;
    let user_data_addr = user_data as usize;
    scheduler.enqueue(Box::new(move || {
        let work: crate::abi::PluginCallbackFfi = std::mem::transmute(work_addr);
        work(user_data_addr as *mut std::ffi::c_void);
    }));
}

unsafe extern "C-unwind" fn init_get_engine_reference_trampoline(ctx: *mut std::ffi::c_void) -> *mut std::ffi::c_void {
    let scheduler: &Arc<dyn Scheduler> = &*(ctx as *const Arc<dyn Scheduler>);
    scheduler.engine_reference()
}

unsafe extern "C-unwind" fn init_invoke_callback_trampoline(
    ctx: *mut std::ffi::c_void,
    token: *const std::os::raw::c_char,
    args_json: *const std::os::raw::c_char,
    _args_len: usize,
    out_json: *mut *mut std::os::raw::c_char,
) -> i32 {
    let scheduler: &Arc<dyn Scheduler> = &*(ctx as *const Arc<dyn Scheduler>);
    let Some(token) = crate::abi::read_c_string(token) else {
        *out_json = std::ffi::CString::new("invalid callback token").unwrap_or_default().into_raw();
        return 1;
    };
    let args_text = crate::abi::read_c_string(args_json).unwrap_or_default();
    match scheduler.invoke_callback(&token, &args_text) {
        Ok(result_json) => {
            *out_json = std::ffi::CString::new(result_json).unwrap_or_default().into_raw();
            0
        }
        Err(message) => {
            *out_json = std::ffi::CString::new(message).unwrap_or_default().into_raw();
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::test_support::InlineScheduler;

    #[test]
    fn unload_missing_plugin_errors() {
        let bridge = PluginBridge::new(Arc::new(InlineScheduler::default()));
        let err = bridge.unload(Path::new("/nonexistent.so")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resolution);
    }

    #[test]
    fn loading_missing_file_surfaces_open_error() {
        let bridge = PluginBridge::new(Arc::new(InlineScheduler::default()));
        let err = bridge.load(Path::new("/nonexistent/plugin.so")).unwrap_err();
        assert_eq!(err.operation(), "open");
    }
}
