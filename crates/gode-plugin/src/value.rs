//! Marshalling conventions between script values and plugin JSON.
//!
//! Plain JSON covers primitives, strings, ordered sequences, and
//! unordered mappings directly. Two sentinel object shapes carry the
//! remaining cases spec.md §4.4 calls out:
//!
//! - a script callable passed as an argument becomes
//!   `{"$gode_callback": "<token>"}`, where `<token>` is an opaque
//!   handle the caller (gode-runtime) can later dispatch back through.
//! - a native callable nested inside a plugin's return value becomes
//!   `{"$gode_native_fn": "<export-name>"}`, naming a sibling export of
//!   the same plugin to wrap with the same calling semantics (the
//!   "promise-like chainable" case).

use serde_json::Value;

pub const CALLBACK_MARKER_KEY: &str = "$gode_callback";
pub const NATIVE_FN_MARKER_KEY: &str = "$gode_native_fn";

/// Truncate or null-pad `args` to exactly `arity` entries, the
/// "forgiving arity" rule: extras are dropped, missing trailing
/// arguments become `null`.
pub fn pad_args(mut args: Vec<Value>, arity: usize) -> Vec<Value> {
    args.truncate(arity);
    while args.len() < arity {
        args.push(Value::Null);
    }
    args
}

pub fn is_callback_marker(value: &Value) -> Option<&str> {
    value.as_object()?.get(CALLBACK_MARKER_KEY)?.as_str()
}

pub fn callback_marker(token: &str) -> Value {
    serde_json::json!({ CALLBACK_MARKER_KEY: token })
}

pub fn is_native_fn_marker(value: &Value) -> Option<&str> {
    value.as_object()?.get(NATIVE_FN_MARKER_KEY)?.as_str()
}

/// Walk `value` looking for `$gode_native_fn` markers at any depth and
/// invoke `on_marker` with the export name each time one is found,
/// replacing it in place with whatever `on_marker` returns. Used to
/// implement the nested-chainable recursive-wrap rule without requiring
/// plugins to hand-wrap callables themselves.
pub fn rewrite_native_fn_markers(value: Value, on_marker: &mut impl FnMut(&str) -> Value) -> Value {
    match value {
        Value::Object(map) => {
            if let Some(name) = map.get(NATIVE_FN_MARKER_KEY).and_then(Value::as_str) {
                return on_marker(name);
            }
            let rewritten = map
                .into_iter()
                .map(|(k, v)| (k, rewrite_native_fn_markers(v, on_marker)))
                .collect();
            Value::Object(rewritten)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| rewrite_native_fn_markers(v, on_marker))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_args_truncates_extras() {
        let args = vec![Value::from(1), Value::from(2), Value::from(3)];
        assert_eq!(pad_args(args, 2), vec![Value::from(1), Value::from(2)]);
    }

    #[test]
    fn pad_args_fills_missing_with_null() {
        let args = vec![Value::from(1)];
        assert_eq!(pad_args(args, 3), vec![Value::from(1), Value::Null, Value::Null]);
    }

    #[test]
    fn rewrite_finds_nested_markers() {
        let value = serde_json::json!({
            "then": { "$gode_native_fn": "then_impl" },
            "data": [1, 2, { "$gode_native_fn": "catch_impl" }],
        });
        let mut seen = Vec::new();
        let rewritten = rewrite_native_fn_markers(value, &mut |name| {
            seen.push(name.to_string());
            Value::String(format!("wrapped:{}", name))
        });
        assert_eq!(seen, vec!["then_impl".to_string(), "catch_impl".to_string()]);
        assert_eq!(rewritten["then"], Value::String("wrapped:then_impl".to_string()));
        assert_eq!(rewritten["data"][2], Value::String("wrapped:catch_impl".to_string()));
    }
}
