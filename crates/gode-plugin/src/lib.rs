//! Native shared-object plugin bridge for the gode-core embedding
//! layer: dlopen, discovery-protocol validation, export marshalling,
//! and panic isolation.

pub mod abi;
mod bridge;
mod discovery;
mod error;
mod export;
mod registry;
mod scheduler;
mod value;

pub use bridge::PluginBridge;
pub use discovery::{discover, DiscoveredExport, DiscoveredPlugin};
pub use error::{PluginError, Result};
pub use export::PluginExport;
pub use registry::{PluginRecord, PluginRegistry};
pub use scheduler::Scheduler;
pub use value::{
    callback_marker, is_callback_marker, is_native_fn_marker, pad_args, rewrite_native_fn_markers,
    CALLBACK_MARKER_KEY, NATIVE_FN_MARKER_KEY,
};
