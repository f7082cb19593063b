//! CommonJS-style `require()`: composes the resolver, loader, plugin
//! bridge, and native-module installer behind one script-visible
//! function (spec.md §4.6's "compose resolver + loader + plugin bridge
//! + native-module installer"), grounded on the
//! `Module::declare`/`.eval()` evaluation shape in the teacher's
//! `JsRuntimeAdapter::load_mod_async`, adapted from ES-module
//! evaluation to a synchronous CommonJS wrapper since every loaded
//! source here already takes the `module.exports = ...` shape
//! `gode_manifest::ModuleLoader` produces.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gode_error::{ErrorKind, ModuleError};
use gode_manifest::{ExtensionClass, ModuleLoader, ResolvedSpecifier, Resolver, NATIVE_EXPORTS_GLOBAL};
use rquickjs::{Ctx, Function, Object, Value as JsValue};

use crate::runtime::RuntimeInner;

/// Install the global `require` function, bound to `referrer` (the
/// module doing the requiring — the entry file for the top-level
/// call).
pub(crate) fn install<'js>(ctx: &Ctx<'js>, inner: &Arc<RuntimeInner>, referrer: PathBuf) -> rquickjs::Result<()> {
    let func = build_require(ctx, inner.clone(), referrer)?;
    ctx.globals().set("require", func)
}

fn build_require<'js>(ctx: &Ctx<'js>, inner: Arc<RuntimeInner>, referrer: PathBuf) -> rquickjs::Result<Function<'js>> {
    Function::new(ctx.clone(), move |ctx: Ctx<'js>, specifier: String| -> rquickjs::Result<JsValue<'js>> {
        require_one(&ctx, &inner, &referrer, &specifier).map_err(|e| {
            let js_message = rquickjs::String::from_str(ctx.clone(), &gode_error::format(&e)).unwrap();
            ctx.throw(js_message.into())
        })
    })
}

fn require_one<'js>(
    ctx: &Ctx<'js>,
    inner: &Arc<RuntimeInner>,
    referrer: &Path,
    specifier: &str,
) -> Result<JsValue<'js>, ModuleError> {
    if let Some(cached) = inner.get_cached_export(ctx, specifier) {
        return Ok(cached);
    }

    let resolved = {
        let manifest = inner.manifest.read().unwrap();
        Resolver::new(&manifest)
            .resolve(specifier, referrer)
            .map_err(|e| e.into_module_error(specifier, &referrer.display().to_string()))?
    };

    let exports = match &resolved {
        ResolvedSpecifier::Builtin(name) => load_builtin(ctx, inner, name)?,
        ResolvedSpecifier::NativePlugin(path, canonical_name) => {
            load_native_plugin(ctx, inner, specifier, path, canonical_name)?
        }
        ResolvedSpecifier::File(path, class) => load_file(ctx, inner, specifier, path, *class)?,
        ResolvedSpecifier::Remote(url) => {
            return Err(ModuleError::new(
                ErrorKind::Resolution,
                "",
                url,
                "require",
                "remote modules are not implemented",
            ))
        }
    };

    inner.cache_export(ctx, specifier, &exports);
    Ok(exports)
}

fn load_builtin<'js>(ctx: &Ctx<'js>, inner: &Arc<RuntimeInner>, name: &str) -> Result<JsValue<'js>, ModuleError> {
    let value = inner.builtins.read().unwrap().get(name).cloned().ok_or_else(|| {
        ModuleError::new(
            ErrorKind::Resolution,
            name,
            "",
            "require",
            format!("no built-in module registered under '{}'", name),
        )
    })?;
    gode_runtime::json_to_js(ctx, &value).map_err(|e| ModuleError::new(ErrorKind::Format, name, "", "require", e))
}

fn load_native_plugin<'js>(
    ctx: &Ctx<'js>,
    inner: &Arc<RuntimeInner>,
    specifier: &str,
    path: &Path,
    canonical_name: &str,
) -> Result<JsValue<'js>, ModuleError> {
    let record = inner.plugin_bridge.load(path)?;
    let plugin_object = gode_runtime::build_plugin_object(ctx, record, inner.callbacks.clone())
        .map_err(|e| eval_error(specifier, path, e.to_string()))?;

    let globals = ctx.globals();
    let natives: Object = match globals.get(NATIVE_EXPORTS_GLOBAL) {
        Ok(obj) => obj,
        Err(_) => {
            let obj = Object::new(ctx.clone()).map_err(|e| eval_error(specifier, path, e.to_string()))?;
            globals
                .set(NATIVE_EXPORTS_GLOBAL, obj.clone())
                .map_err(|e| eval_error(specifier, path, e.to_string()))?;
            obj
        }
    };
    natives
        .set(canonical_name, plugin_object)
        .map_err(|e| eval_error(specifier, path, e.to_string()))?;

    eval_loader_source(
        ctx,
        inner,
        specifier,
        path,
        ResolvedSpecifier::NativePlugin(path.to_path_buf(), canonical_name.to_string()),
    )
}

fn load_file<'js>(
    ctx: &Ctx<'js>,
    inner: &Arc<RuntimeInner>,
    specifier: &str,
    path: &Path,
    class: ExtensionClass,
) -> Result<JsValue<'js>, ModuleError> {
    eval_loader_source(ctx, inner, specifier, path, ResolvedSpecifier::File(path.to_path_buf(), class))
}

/// Read `resolved`'s source via the shared `ModuleLoader`, then
/// evaluate it as a CommonJS body: `(function(module, exports,
/// require) { <source> })(module, module.exports, require)`. A fresh
/// `require` bound to this module's own path is installed as the
/// global before evaluating, so relative requires inside it resolve
/// against the right directory; the previous global `require` is left
/// in place afterward since each module body captures its own closure
/// over the function at call time, not the live global.
fn eval_loader_source<'js>(
    ctx: &Ctx<'js>,
    inner: &Arc<RuntimeInner>,
    specifier: &str,
    path: &Path,
    resolved: ResolvedSpecifier,
) -> Result<JsValue<'js>, ModuleError> {
    let loader = ModuleLoader::new(&inner.module_cache);
    let entry = loader
        .load(specifier, resolved)
        .map_err(|e| e.into_module_error(specifier, &path.display().to_string()))?;

    if entry.source.is_empty() {
        return Ok(JsValue::new_null(ctx.clone()));
    }

    let module_obj = Object::new(ctx.clone()).map_err(|e| eval_error(specifier, path, e.to_string()))?;
    let exports_obj = Object::new(ctx.clone()).map_err(|e| eval_error(specifier, path, e.to_string()))?;
    module_obj
        .set("exports", exports_obj.clone())
        .map_err(|e| eval_error(specifier, path, e.to_string()))?;

    let nested_require = build_require(ctx, inner.clone(), path.to_path_buf())
        .map_err(|e| eval_error(specifier, path, e.to_string()))?;

    let wrapped = format!("(function(module, exports, require) {{\n{}\n}})", entry.source);

    let wrapper_fn: Function = ctx
        .eval(wrapped.into_bytes())
        .map_err(|e| crate::error::js_error_to_module_error(ctx, specifier, path, "eval", e))?;

    wrapper_fn
        .call::<_, JsValue>((module_obj.clone(), exports_obj, nested_require))
        .map_err(|e| crate::error::js_error_to_module_error(ctx, specifier, path, "eval", e))?;

    module_obj.get("exports").map_err(|e| eval_error(specifier, path, e.to_string()))
}

fn eval_error(specifier: &str, path: &Path, message: impl Into<String>) -> ModuleError {
    ModuleError::new(ErrorKind::Script, specifier, &path.display().to_string(), "eval", message.into())
}
