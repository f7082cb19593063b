//! Cross-boundary error model for the gode-core embedding layer.
//!
//! Provides a uniform error representation ([`ModuleError`]) that
//! survives crossings between native code and script code, a
//! stack-frame parser that copes with multiple script-engine dialects,
//! and panic-to-error conversion ([`safe_operation`] /
//! [`safe_operation_with_result`]) so that a native fault can never
//! crash the embedding process.

mod dialect;
mod error;
mod safe;
mod stack;

pub use dialect::{parse_stack_frame, parse_stack_trace_text};
pub use error::{format, parse_script_error, ErrorKind, ModuleError, ParsedScriptError, ScriptErrorInput};
pub use safe::{safe_operation, safe_operation_with_result};
pub use stack::{capture_native_stack, StackFrame, StackTrace};
