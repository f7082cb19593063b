//! The execution serializer and script-engine host for the gode-core
//! embedding layer: one dedicated thread owning the script engine, a
//! queue for serializing access to it, and the marshalling/callback
//! glue that lets native plugins cross back into script code safely.

mod awaitable;
mod callback;
mod engine;
mod js_error;
mod native_module;
mod queue;
mod scheduler;
mod value_convert;

pub use awaitable::Awaitable;
pub use callback::CallbackRegistry;
pub use engine::EngineConfig;
pub use native_module::build_plugin_object;
pub use queue::Queue;
pub use scheduler::QueueScheduler;
pub use value_convert::{js_to_json, json_to_js};
