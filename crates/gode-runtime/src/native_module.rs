//! Installs a loaded native plugin's exports as a script-visible object
//! of callables (spec.md §4.4's export-wrapping step, the half of the
//! plugin bridge that lives on the engine thread rather than inside
//! `gode-plugin` itself — `PluginExport::call` only knows JSON in/out,
//! this module is what gives script code a callable `Function` for
//! each one).

use std::sync::Arc;

use gode_plugin::PluginRecord;
use rquickjs::{Ctx, Function, Object, Value as JsValue};
use serde_json::Value;

use crate::callback::CallbackRegistry;
use crate::value_convert::{js_to_json, json_to_js};

/// Build a JS object exposing every export of `record` as a native
/// function.
pub fn build_plugin_object<'js>(
    ctx: &Ctx<'js>,
    record: Arc<PluginRecord>,
    callbacks: Arc<CallbackRegistry>,
) -> rquickjs::Result<Object<'js>> {
    let obj = Object::new(ctx.clone())?;
    for export_name in record.exports.keys() {
        let func = export_function(ctx, record.clone(), export_name.clone(), callbacks.clone())?;
        obj.set(export_name.as_str(), func)?;
    }
    Ok(obj)
}

/// Wrap one export as a native `Function`. `$gode_native_fn` markers in
/// its result are rewritten recursively into further native functions
/// of the same plugin (rather than plain JSON), implementing the
/// "chainable" nested-callable rule.
fn export_function<'js>(
    ctx: &Ctx<'js>,
    record: Arc<PluginRecord>,
    export_name: String,
    callbacks: Arc<CallbackRegistry>,
) -> rquickjs::Result<Function<'js>> {
    Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, args: rquickjs::function::Rest<JsValue<'js>>| -> rquickjs::Result<JsValue<'js>> {
            call_export(&ctx, &record, &export_name, &callbacks, args.0).map_err(|message| {
                let js_message = rquickjs::String::from_str(ctx.clone(), &message).unwrap();
                ctx.throw(js_message.into())
            })
        },
    )
}

fn call_export<'js>(
    ctx: &Ctx<'js>,
    record: &Arc<PluginRecord>,
    export_name: &str,
    callbacks: &Arc<CallbackRegistry>,
    args: Vec<JsValue<'js>>,
) -> Result<JsValue<'js>, String> {
    let export = record
        .exports
        .get(export_name)
        .ok_or_else(|| format!("export '{}' is no longer registered", export_name))?;

    let mut json_args = Vec::with_capacity(args.len());
    for arg in &args {
        json_args.push(js_to_json(ctx, arg, callbacks)?);
    }

    let result = export.call(json_args).map_err(|e| gode_error::format(&e))?;
    value_with_native_fns(ctx, result, record, callbacks)
}

/// Like `json_to_js`, but a `$gode_native_fn` marker becomes a real
/// native function wrapping the named sibling export, instead of an
/// inert object carrying the marker property.
fn value_with_native_fns<'js>(
    ctx: &Ctx<'js>,
    value: Value,
    record: &Arc<PluginRecord>,
    callbacks: &Arc<CallbackRegistry>,
) -> Result<JsValue<'js>, String> {
    if let Some(sibling) = gode_plugin::is_native_fn_marker(&value) {
        let func = export_function(ctx, record.clone(), sibling.to_string(), callbacks.clone())
            .map_err(|e| format!("failed to wrap sibling export '{}': {}", sibling, e))?;
        return Ok(func.into_value());
    }

    match value {
        Value::Array(items) => {
            let array = rquickjs::Array::new(ctx.clone()).map_err(|e| e.to_string())?;
            for (i, item) in items.into_iter().enumerate() {
                let js_item = value_with_native_fns(ctx, item, record, callbacks)?;
                array.set(i, js_item).map_err(|e| e.to_string())?;
            }
            Ok(array.into_value())
        }
        Value::Object(map) => {
            let obj = Object::new(ctx.clone()).map_err(|e| e.to_string())?;
            for (key, val) in map {
                let js_val = value_with_native_fns(ctx, val, record, callbacks)?;
                obj.set(key.as_str(), js_val).map_err(|e| e.to_string())?;
            }
            Ok(obj.into_value())
        }
        other => json_to_js(ctx, &other),
    }
}
