//! dlopen + symbol lookup for the discovery protocol (spec.md §4.4),
//! grounded on `querymt`'s `NativeLoader::load_library` for the
//! `libloading::Library` + `Symbol` lookup shape.

use std::path::Path;
use std::sync::Arc;

use libloading::{Library, Symbol};
use tracing::{debug, instrument, warn};

use crate::abi::{self, DisposeFn, ExportDescriptorFfi, ExportsFn, InitializeFn, NameFn, VersionFn};
use crate::error::{PluginError, Result};

/// One discovered export, with its name already copied out of the
/// plugin's buffer (the descriptor array itself may be owned by static
/// plugin memory for the library's lifetime).
#[derive(Clone)]
pub struct DiscoveredExport {
    pub name: String,
    pub arity: u32,
    pub takes_host_handle: bool,
    pub func: abi::PluginFnFfi,
}

/// The result of loading and probing a shared object: either it speaks
/// the full discovery protocol, or it falls back to "direct" mode
/// (name from file stem, version `"unknown"`, no exports).
pub struct DiscoveredPlugin {
    pub library: Arc<Library>,
    pub name: String,
    pub version: String,
    pub exports: Vec<DiscoveredExport>,
    pub initialize: Option<InitializeFn>,
    pub dispose: Option<DisposeFn>,
    pub direct_mode: bool,
}

#[instrument(name = "plugin.discover", skip_all, fields(path = %path.display()))]
pub fn discover(path: &Path) -> Result<DiscoveredPlugin> {
    let library = unsafe {
        Library::new(path).map_err(|source| PluginError::Open {
            path: path.display().to_string(),
            source,
        })?
    };
    let library = Arc::new(library);

    let name_sym: std::result::Result<Symbol<NameFn>, _> = unsafe { library.get(b"Name\0") };
    let version_sym: std::result::Result<Symbol<VersionFn>, _> = unsafe { library.get(b"Version\0") };
    let exports_sym: std::result::Result<Symbol<ExportsFn>, _> = unsafe { library.get(b"Exports\0") };

    let (name_sym, version_sym, exports_sym) = match (name_sym, version_sym, exports_sym) {
        (Ok(n), Ok(v), Ok(e)) => (n, v, e),
        _ => {
            warn!(
                path = %path.display(),
                "plugin missing one or more required discovery symbols (Name/Version/Exports); falling back to direct mode"
            );
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string();
            return Ok(DiscoveredPlugin {
                library,
                name,
                version: "unknown".to_string(),
                exports: Vec::new(),
                initialize: None,
                dispose: None,
                direct_mode: true,
            });
        }
    };

    let name = unsafe { abi::read_c_string(name_sym()) }
        .ok_or_else(|| PluginError::Interface {
            path: path.display().to_string(),
            reason: "Name() returned null".to_string(),
        })?;
    let version = unsafe { abi::read_c_string(version_sym()) }.unwrap_or_else(|| "unknown".to_string());

    let exports_ffi = unsafe { exports_sym() };
    let exports = unsafe { read_exports(&exports_ffi) }?;

    let initialize = unsafe { library.get::<InitializeFn>(b"Initialize\0") }
        .ok()
        .map(|sym| *sym);
    let dispose = unsafe { library.get::<DisposeFn>(b"Dispose\0") }
        .ok()
        .map(|sym| *sym);

    debug!(name = %name, version = %version, export_count = exports.len(), "plugin discovered");

    Ok(DiscoveredPlugin {
        library,
        name,
        version,
        exports,
        initialize,
        dispose,
        direct_mode: false,
    })
}

unsafe fn read_exports(exports_ffi: &abi::ExportsFfi) -> Result<Vec<DiscoveredExport>> {
    if exports_ffi.count == 0 || exports_ffi.entries.is_null() {
        return Ok(Vec::new());
    }
    let slice: &[ExportDescriptorFfi] =
        std::slice::from_raw_parts(exports_ffi.entries, exports_ffi.count);

    let mut out = Vec::with_capacity(slice.len());
    for entry in slice {
        let name = abi::read_c_string(entry.name).ok_or_else(|| PluginError::Interface {
            path: String::new(),
            reason: "export descriptor had a null name".to_string(),
        })?;
        out.push(DiscoveredExport {
            name,
            arity: entry.arity,
            takes_host_handle: entry.takes_host_handle,
            func: entry.func,
        });
    }
    Ok(out)
}
