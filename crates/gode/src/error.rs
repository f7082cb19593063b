//! Converts an `rquickjs::Error` raised during `require`/`execute` into
//! a `ModuleError`, the same dialect-agnostic parsing `gode-runtime`
//! uses for engine-level failures, applied here at the facade's own
//! evaluation call sites.

use std::collections::HashMap;
use std::path::Path;

use gode_error::{parse_script_error, ErrorKind, ModuleError, ScriptErrorInput};
use rquickjs::{Ctx, Value};

pub(crate) fn js_error_to_module_error(
    ctx: &Ctx,
    module: &str,
    path: &Path,
    operation: &str,
    err: rquickjs::Error,
) -> ModuleError {
    if !matches!(err, rquickjs::Error::Exception) {
        return ModuleError::new(ErrorKind::Script, module, &path.display().to_string(), operation, err.to_string());
    }

    let exception = ctx.catch();
    let parsed = describe_js_value(&exception);
    let message = if parsed.message.is_empty() {
        parsed.error_type.clone()
    } else {
        format!("{}: {}", parsed.error_type, parsed.message)
    };

    let mut out = ModuleError::new(ErrorKind::Script, module, &path.display().to_string(), operation, message);
    if let (Some(line), Some(column)) = (parsed.line, parsed.column) {
        out = out.with_line(line, column);
    }
    if !parsed.frames.is_empty() {
        let stack_text = parsed.frames.iter().map(|f| f.to_string()).collect::<Vec<_>>().join("\n");
        out = out.with_script_stack(stack_text);
    }
    out
}

fn describe_js_value(value: &Value) -> gode_error::ParsedScriptError {
    if let Some(obj) = value.as_object() {
        let mut props = HashMap::new();
        for key in ["name", "message", "stack"] {
            if let Ok(prop) = obj.get::<_, Value>(key) {
                if let Some(s) = prop.as_string() {
                    if let Ok(text) = s.to_string() {
                        props.insert(key.to_string(), text);
                    }
                }
            }
        }
        if !props.is_empty() {
            return parse_script_error(ScriptErrorInput::Properties(props));
        }
    }
    if let Some(s) = value.as_string() {
        if let Ok(text) = s.to_string() {
            return parse_script_error(ScriptErrorInput::Text(text));
        }
    }
    parse_script_error(ScriptErrorInput::Text(format!("{:?}", value)))
}
