//! The discovery protocol's C ABI.
//!
//! Values cross the FFI boundary as JSON text rather than as raw Rust
//! types: plugin authors compile against any toolchain that can emit
//! a `cdylib`, not necessarily the same `rustc` that built the host, so
//! the ABI surface is kept to primitives, pointers, and length-prefixed
//! byte buffers. Structured values (sequences, mappings, callables) are
//! carried as JSON, matching `PluginValue`'s encoding in `value.rs`.

use std::ffi::c_void;
use std::os::raw::c_char;

/// Opaque handle passed as the first argument to every discovered
/// export. Plugins never construct one; the bridge hands it out.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct HostHandleFfi {
    pub ctx: *mut c_void,
    pub vtable: *const HostHandleVTable,
}

unsafe impl Send for HostHandleFfi {}
unsafe impl Sync for HostHandleFfi {}

/// Function pointers a plugin uses to call back into the host.
#[repr(C)]
pub struct HostHandleVTable {
    /// Schedule `work(user_data)` to run on the engine thread. Must be
    /// callable from any native thread.
    pub enqueue: unsafe extern "C-unwind" fn(ctx: *mut c_void, work: PluginCallbackFfi, user_data: *mut c_void),
    /// Returns an opaque engine-reference pointer, valid only while used
    /// inside a closure scheduled via `enqueue`.
    pub get_engine_reference: unsafe extern "C-unwind" fn(ctx: *mut c_void) -> *mut c_void,
    /// Invoke a script callable previously passed to this plugin as a
    /// `{"$gode_callback": "<token>"}` marker. Blocks the calling thread
    /// (which may be a plugin-owned worker thread) until the engine
    /// thread has run it; `out_json` receives the JSON-encoded result
    /// (or error message, on non-zero return), freed the same way as an
    /// export's `out_json`.
    pub invoke_callback: unsafe extern "C-unwind" fn(
        ctx: *mut c_void,
        token: *const c_char,
        args_json: *const c_char,
        args_len: usize,
        out_json: *mut *mut c_char,
    ) -> i32,
}

pub type InvokeCallbackFn = unsafe extern "C-unwind" fn(
    ctx: *mut c_void,
    token: *const c_char,
    args_json: *const c_char,
    args_len: usize,
    out_json: *mut *mut c_char,
) -> i32;

/// A native closure a plugin schedules via the host handle's `enqueue`.
pub type PluginCallbackFfi = unsafe extern "C-unwind" fn(user_data: *mut c_void);

/// One discovered export: its name, declared arity, whether its first
/// native parameter is the host-handle type, and the function pointer
/// itself.
///
/// `args_json`/`args_len` carry a JSON array of already arity-padded
/// argument values (see `export.rs`); `out_json` receives an
/// owned, NUL-terminated string the bridge frees via `FreeString` (or,
/// absent that export, via `libc`-compatible `free`-equivalent — core
/// plugins are expected to export `FreeString` when they allocate with
/// a non-Rust-default allocator).
#[repr(C)]
pub struct ExportDescriptorFfi {
    pub name: *const c_char,
    pub arity: u32,
    pub takes_host_handle: bool,
    pub func: PluginFnFfi,
}

pub type PluginFnFfi = unsafe extern "C-unwind" fn(
    host: HostHandleFfi,
    args_json: *const c_char,
    args_len: usize,
    out_json: *mut *mut c_char,
) -> i32;

#[repr(C)]
pub struct ExportsFfi {
    pub entries: *const ExportDescriptorFfi,
    pub count: usize,
}

pub type NameFn = unsafe extern "C-unwind" fn() -> *const c_char;
pub type VersionFn = unsafe extern "C-unwind" fn() -> *const c_char;
pub type ExportsFn = unsafe extern "C-unwind" fn() -> ExportsFfi;
pub type InitializeFn = unsafe extern "C-unwind" fn(host: HostHandleFfi) -> *const c_char;
pub type DisposeFn = unsafe extern "C-unwind" fn() -> *const c_char;
pub type FreeStringFn = unsafe extern "C-unwind" fn(ptr: *mut c_char);

/// Read a NUL-terminated C string produced by a plugin. Returns an
/// owned `String`; the caller is responsible for freeing the original
/// pointer via the plugin's `FreeString` export, if present.
///
/// # Safety
/// `ptr` must be either null or point to a valid NUL-terminated buffer.
pub unsafe fn read_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(std::ffi::CStr::from_ptr(ptr).to_string_lossy().into_owned())
}
