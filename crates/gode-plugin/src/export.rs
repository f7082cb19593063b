//! Per-export wrapper: forgiving arity, host-handle injection, automatic
//! marshalling, fault isolation, and callback scheduling (spec.md
//! §4.4). Grounded on `stam_mod_runtimes::adapters::js::bindings`'s
//! pattern of synthesizing script-visible functions from Rust closures,
//! generalized here to dlopen'd native functions instead of in-process
//! Rust ones.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;
use std::sync::Arc;

use gode_error::{safe_operation_with_result, ErrorKind, ModuleError};
use libloading::Library;
use serde_json::Value;
use tracing::instrument;

use crate::abi::{self, HostHandleFfi, HostHandleVTable};
use crate::discovery::DiscoveredExport;
use crate::scheduler::Scheduler;
use crate::value::pad_args;

const HOST_HANDLE_VTABLE: HostHandleVTable = HostHandleVTable {
    enqueue: host_enqueue_trampoline,
    get_engine_reference: host_get_engine_reference_trampoline,
    invoke_callback: host_invoke_callback_trampoline,
};

/// Passed in the fixed ABI slot to exports that declare
/// `takes_host_handle = false`: a plugin that doesn't ask for the host
/// handle must not be handed a dereferenceable one.
const NULL_HOST_HANDLE: HostHandleFfi = HostHandleFfi {
    ctx: std::ptr::null_mut(),
    vtable: std::ptr::null(),
};

/// A conversion plan for one export, built once at registration time
/// per §9's "pre-analyze, don't re-reflect per call" guidance. For the
/// JSON-marshalled ABI this plan is just the declared arity and whether
/// a host handle is injected; richer native signatures would add a
/// per-parameter converter list here.
pub struct PluginExport {
    plugin_name: String,
    export_name: String,
    arity: usize,
    takes_host_handle: bool,
    func: abi::PluginFnFfi,
    host_handle: HostHandleFfi,
    /// Keeps the shared object mapped for as long as any export derived
    /// from it is reachable.
    _library: Arc<Library>,
    /// Keeps the scheduler trampoline's `ctx` pointer valid.
    _scheduler_anchor: Arc<Box<Arc<dyn Scheduler>>>,
}

impl PluginExport {
    pub(crate) fn new(
        plugin_name: String,
        discovered: &DiscoveredExport,
        library: Arc<Library>,
        scheduler_anchor: Arc<Box<Arc<dyn Scheduler>>>,
    ) -> Self {
        let ctx = Arc::as_ptr(&scheduler_anchor) as *mut c_void;
        PluginExport {
            plugin_name,
            export_name: discovered.name.clone(),
            arity: discovered.arity as usize,
            takes_host_handle: discovered.takes_host_handle,
            func: discovered.func,
            host_handle: HostHandleFfi {
                ctx,
                vtable: &HOST_HANDLE_VTABLE,
            },
            _library: library,
            _scheduler_anchor: scheduler_anchor,
        }
    }

    pub fn name(&self) -> &str {
        &self.export_name
    }

    /// Invoke the export with script-supplied `args`, applying forgiving
    /// arity and wrapping any native fault as a `ModuleError`. Exports
    /// that didn't declare `takes_host_handle` at discovery get a null
    /// handle in the fixed ABI slot rather than a live one.
    #[instrument(name = "plugin.call", skip_all, fields(plugin = %self.plugin_name, export = %self.export_name))]
    pub fn call(&self, args: Vec<Value>) -> Result<Value, ModuleError> {
        let padded = pad_args(args, self.arity);
        let plugin_name = self.plugin_name.clone();
        let export_name = self.export_name.clone();
        // Only Copy/owned, pointer-shaped data crosses into the
        // unwind-safe closure: the `Arc<Library>`/scheduler anchor kept
        // alive on `self` don't need to be (and, as trait objects,
        // can't trivially be proven) `UnwindSafe`.
        let func = self.func;
        let host_handle = if self.takes_host_handle {
            self.host_handle
        } else {
            NULL_HOST_HANDLE
        };

        safe_operation_with_result(
            &self.plugin_name,
            &self.export_name,
            move || -> Result<Value, String> { invoke(func, host_handle, &padded) },
            move |message| {
                ModuleError::new(ErrorKind::Invocation, &plugin_name, "", &export_name, message)
            },
        )
    }
}

fn invoke(func: abi::PluginFnFfi, host_handle: HostHandleFfi, args: &[Value]) -> Result<Value, String> {
    let args_json = serde_json::to_string(&Value::Array(args.to_vec()))
        .map_err(|e| format!("failed to encode arguments: {}", e))?;
    let c_args = CString::new(args_json).map_err(|e| format!("invalid argument encoding: {}", e))?;

    let mut out_ptr: *mut c_char = std::ptr::null_mut();
    let status = unsafe { func(host_handle, c_args.as_ptr(), c_args.as_bytes().len(), &mut out_ptr) };

    let out_text = unsafe { abi::read_c_string(out_ptr) }.unwrap_or_default();

    if status != 0 {
        return Err(if out_text.is_empty() {
            format!("export returned non-zero status {}", status)
        } else {
            out_text
        });
    }

    if out_text.is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&out_text).map_err(|e| format!("failed to decode result: {}", e))
}

unsafe extern "C-unwind" fn host_enqueue_trampoline(
    ctx: *mut c_void,
    work: abi::PluginCallbackFfi,
    user_data: *mut c_void,
) {
    let scheduler: &Arc<dyn Scheduler> = &*(ctx as *const Arc<dyn Scheduler>);
    let work_addr = work as usize;
    let user_data_addr = user_data as usize;
    scheduler.enqueue(Box::new(move || {
        let work: abi::PluginCallbackFfi = std::mem::transmute(work_addr);
        work(user_data_addr as *mut c_void);
    }));
}

unsafe extern "C-unwind" fn host_get_engine_reference_trampoline(ctx: *mut c_void) -> *mut c_void {
    let scheduler: &Arc<dyn Scheduler> = &*(ctx as *const Arc<dyn Scheduler>);
    scheduler.engine_reference()
}

unsafe extern "C-unwind" fn host_invoke_callback_trampoline(
    ctx: *mut c_void,
    token: *const c_char,
    args_json: *const c_char,
    _args_len: usize,
    out_json: *mut *mut c_char,
) -> i32 {
    let scheduler: &Arc<dyn Scheduler> = &*(ctx as *const Arc<dyn Scheduler>);
    let Some(token) = abi::read_c_string(token) else {
        *out_json = CString::new("invalid callback token").unwrap_or_default().into_raw();
        return 1;
    };
    let args_text = abi::read_c_string(args_json).unwrap_or_default();

    match scheduler.invoke_callback(&token, &args_text) {
        Ok(result_json) => {
            *out_json = CString::new(result_json).unwrap_or_default().into_raw();
            0
        }
        Err(message) => {
            *out_json = CString::new(message).unwrap_or_default().into_raw();
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::test_support::InlineScheduler;

    unsafe extern "C-unwind" fn echo_fn(
        _host: HostHandleFfi,
        args_json: *const c_char,
        _args_len: usize,
        out_json: *mut *mut c_char,
    ) -> i32 {
        let text = abi::read_c_string(args_json).unwrap_or_default();
        let out = CString::new(text).unwrap();
        *out_json = out.into_raw();
        0
    }

    unsafe extern "C-unwind" fn panics_fn(
        _host: HostHandleFfi,
        _args_json: *const c_char,
        _args_len: usize,
        _out_json: *mut *mut c_char,
    ) -> i32 {
        panic!("boom");
    }

    unsafe extern "C-unwind" fn reports_host_null_fn(
        host: HostHandleFfi,
        _args_json: *const c_char,
        _args_len: usize,
        out_json: *mut *mut c_char,
    ) -> i32 {
        let text = if host.ctx.is_null() { "\"null\"" } else { "\"live\"" };
        let out = CString::new(text).unwrap();
        *out_json = out.into_raw();
        0
    }

    fn fake_export(func: abi::PluginFnFfi, arity: usize) -> DiscoveredExport {
        fake_export_with_handle(func, arity, false)
    }

    fn fake_export_with_handle(func: abi::PluginFnFfi, arity: usize, takes_host_handle: bool) -> DiscoveredExport {
        DiscoveredExport {
            name: "test_export".to_string(),
            arity: arity as u32,
            takes_host_handle,
            func,
        }
    }

    fn anchor() -> Arc<Box<Arc<dyn Scheduler>>> {
        Arc::new(Box::new(Arc::new(InlineScheduler::default()) as Arc<dyn Scheduler>))
    }

    // `_library` normally pins a real dlopen'd handle; tests reopen the
    // running test binary itself so no shared-object path is needed.
    // `PluginExport` never dereferences it, only keeps it alive.
    fn fake_library() -> Arc<Library> {
        unsafe { Arc::new(Library::this()) }
    }

    #[test]
    fn forgiving_arity_pads_missing_args() {
        let discovered = fake_export(echo_fn, 3);
        let export = PluginExport::new(
            "plugin".to_string(),
            &discovered,
            fake_library(),
            anchor(),
        );
        let result = export.call(vec![Value::from(1)]).unwrap();
        assert_eq!(result, serde_json::json!([1, null, null]));
    }

    #[test]
    fn forgiving_arity_drops_extras() {
        let discovered = fake_export(echo_fn, 1);
        let export = PluginExport::new(
            "plugin".to_string(),
            &discovered,
            fake_library(),
            anchor(),
        );
        let result = export.call(vec![Value::from(1), Value::from(2)]).unwrap();
        assert_eq!(result, serde_json::json!([1]));
    }

    #[test]
    fn panic_in_export_becomes_module_error() {
        let discovered = fake_export(panics_fn, 0);
        let export = PluginExport::new(
            "plugin".to_string(),
            &discovered,
            fake_library(),
            anchor(),
        );
        let err = export.call(vec![]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invocation);
        assert!(err.message().contains("boom"));
        assert!(!err.native_stack().is_empty());
    }

    #[test]
    fn export_declining_host_handle_gets_null_handle() {
        let discovered = fake_export_with_handle(reports_host_null_fn, 0, false);
        let export = PluginExport::new(
            "plugin".to_string(),
            &discovered,
            fake_library(),
            anchor(),
        );
        let result = export.call(vec![]).unwrap();
        assert_eq!(result, serde_json::json!("null"));
    }

    #[test]
    fn export_requesting_host_handle_gets_live_handle() {
        let discovered = fake_export_with_handle(reports_host_null_fn, 0, true);
        let export = PluginExport::new(
            "plugin".to_string(),
            &discovered,
            fake_library(),
            anchor(),
        );
        let result = export.call(vec![]).unwrap();
        assert_eq!(result, serde_json::json!("live"));
    }
}
