//! `serde_json::Value` <-> `rquickjs::Value` conversion, the marshalling
//! layer that lets `Queue`/`PluginBridge` exchange values with plugins
//! and scripts using plain JSON as the wire format (spec.md §4.4).
//! Script functions crossing into a plugin call become `$gode_callback`
//! markers rather than being serialized directly; everything else
//! converts structurally.

use rquickjs::{Ctx, Object, Value as JsValue};
use serde_json::{Map, Value};

use crate::callback::CallbackRegistry;

/// Convert a JS value into JSON, minting a `$gode_callback` token for
/// any function encountered (at any depth) via `registry`.
pub fn js_to_json<'js>(ctx: &Ctx<'js>, value: &JsValue<'js>, registry: &CallbackRegistry) -> Result<Value, String> {
    if value.is_undefined() || value.is_null() {
        Ok(Value::Null)
    } else if let Some(b) = value.as_bool() {
        Ok(Value::Bool(b))
    } else if let Some(n) = value.as_int() {
        Ok(Value::from(n))
    } else if let Some(n) = value.as_float() {
        Ok(serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null))
    } else if let Some(s) = value.as_string() {
        let text = s.to_string().map_err(|e| format!("failed to read string: {}", e))?;
        Ok(Value::String(text))
    } else if value.is_function() {
        let func = value.as_function().unwrap().clone();
        let token = registry.register(ctx, func);
        Ok(gode_plugin::callback_marker(&token))
    } else if let Some(array) = value.as_array() {
        let mut items = Vec::with_capacity(array.len());
        for item in array.iter::<JsValue>() {
            let item = item.map_err(|e| format!("failed to read array element: {}", e))?;
            items.push(js_to_json(ctx, &item, registry)?);
        }
        Ok(Value::Array(items))
    } else if let Some(obj) = value.as_object() {
        let mut map = Map::new();
        for key in obj.keys::<String>() {
            let key = key.map_err(|e| format!("failed to read object key: {}", e))?;
            let prop: JsValue = obj
                .get(key.as_str())
                .map_err(|e| format!("failed to read property {}: {}", key, e))?;
            map.insert(key, js_to_json(ctx, &prop, registry)?);
        }
        Ok(Value::Object(map))
    } else {
        Ok(Value::Null)
    }
}

/// Convert JSON into a JS value. `$gode_native_fn` markers are left to
/// the native-module installer to rewrite before this is called; any
/// that reach here unexpectedly become a JS object with the marker
/// property intact, which is at worst inert in script code.
pub fn json_to_js<'js>(ctx: &Ctx<'js>, value: &Value) -> Result<JsValue<'js>, String> {
    match value {
        Value::Null => Ok(JsValue::new_null(ctx.clone())),
        Value::Bool(b) => Ok(JsValue::new_bool(ctx.clone(), *b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i >= i32::MIN as i64 && i <= i32::MAX as i64 {
                    return Ok(JsValue::new_int(ctx.clone(), i as i32));
                }
            }
            let f = n.as_f64().ok_or_else(|| "non-finite number".to_string())?;
            Ok(JsValue::new_float(ctx.clone(), f))
        }
        Value::String(s) => {
            let js_string = rquickjs::String::from_str(ctx.clone(), s)
                .map_err(|e| format!("failed to build string: {}", e))?;
            Ok(js_string.into_value())
        }
        Value::Array(items) => {
            let array = rquickjs::Array::new(ctx.clone()).map_err(|e| format!("failed to build array: {}", e))?;
            for (i, item) in items.iter().enumerate() {
                let js_item = json_to_js(ctx, item)?;
                array
                    .set(i, js_item)
                    .map_err(|e| format!("failed to set array element {}: {}", i, e))?;
            }
            Ok(array.into_value())
        }
        Value::Object(map) => {
            let obj = Object::new(ctx.clone()).map_err(|e| format!("failed to build object: {}", e))?;
            for (key, val) in map {
                let js_val = json_to_js(ctx, val)?;
                obj.set(key.as_str(), js_val)
                    .map_err(|e| format!("failed to set property {}: {}", key, e))?;
            }
            Ok(obj.into_value())
        }
    }
}
