//! Converts rquickjs-side errors and promise-rejection reasons into
//! `ModuleError`s, folding them through `gode_error`'s dialect-agnostic
//! script-stack parser so the same four line formats spec.md §4.1
//! describes are recognized regardless of which rquickjs API surfaced
//! the failure.

use gode_error::{parse_script_error, ErrorKind, ModuleError, ParsedScriptError, ScriptErrorInput};
use rquickjs::{Ctx, Value};

fn describe_js_value(value: &Value) -> ParsedScriptError {
    if let Some(obj) = value.as_object() {
        let mut props = std::collections::HashMap::new();
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

fn module_error_from_parsed(module: &str, path: &str, operation: &str, parsed: ParsedScriptError) -> ModuleError {
    let message = if parsed.message.is_empty() {
        parsed.error_type.clone()
    } else {
        format!("{}: {}", parsed.error_type, parsed.message)
    };
    let mut err = ModuleError::new(ErrorKind::Script, module, path, operation, message);

    if let (Some(line), Some(column)) = (parsed.line, parsed.column) {
        err = err.with_line(line, column);
    }

    if !parsed.frames.is_empty() {
        let stack_text = parsed
            .frames
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        err = err.with_script_stack(stack_text);
    }

    err
}

/// Build a `ModuleError` from an unhandled promise-rejection reason.
pub(crate) fn module_error_from_rejection(module: &str, reason: &Value) -> ModuleError {
    module_error_from_parsed(module, "", "promise", describe_js_value(reason))
}

/// Build a `ModuleError` from the exception an `rquickjs::Error::Exception`
/// carries, fetched via `ctx.catch()` at the call site that observed the
/// error.
pub(crate) fn module_error_from_exception(module: &str, path: &str, operation: &str, ctx: &Ctx, _err: &rquickjs::Error) -> ModuleError {
    let exception = ctx.catch();
    module_error_from_parsed(module, path, operation, describe_js_value(&exception))
}
