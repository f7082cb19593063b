//! Embeddable script-runtime host integration layer: wires the
//! manifest resolver/loader, the native plugin bridge, and the
//! execution serializer behind the minimal [`HostRuntime`] surface an
//! embedding application programs against.

mod error;
mod require;
mod runtime;

pub use gode_manifest::Manifest;
pub use runtime::{HostConfig, HostHandle, HostRuntime};
