//! End-to-end scenarios against the real engine thread: built-in
//! import, alias resolution, JSON data files, and cross-module script
//! error stacks. Plugin-bridge scenarios (native load/call/callback
//! ordering, panic isolation) are exercised at the `gode-plugin` layer
//! instead, since they require a real compiled shared object that
//! this workspace cannot build without invoking the toolchain.

use std::fs;

use gode::{HostConfig, HostRuntime, Manifest};

fn runtime() -> HostRuntime {
    HostRuntime::new(HostConfig::default()).expect("engine thread should start")
}

#[test]
fn built_in_import_resolves_to_registered_module() {
    let rt = runtime();
    rt.register_module("core", serde_json::json!({ "flavor": "builtin" })).unwrap();

    let result = rt.execute("entry", "require('gode:core').flavor").unwrap();
    assert_eq!(result, serde_json::json!("builtin"));
}

#[test]
fn alias_with_suffix_resolves_relative_to_alias_target() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/main.js"), "module.exports = { loaded: true };").unwrap();

    let manifest_json = serde_json::json!({
        "gode": { "imports": { "@app": "./src" } }
    });
    let manifest = Manifest::from_json_str(&manifest_json.to_string(), dir.path()).unwrap();

    let rt = runtime();
    rt.configure(manifest).unwrap();

    let entry = dir.path().join("index.js");
    fs::write(&entry, "globalThis.__result = require('@app/main.js').loaded;").unwrap();
    rt.run(&entry).unwrap();

    let value = rt.execute("check", "globalThis.__result").unwrap();
    assert_eq!(value, serde_json::json!(true));
}

#[test]
fn json_data_file_is_wrapped_as_an_object_export() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("config.json"), r#"{"name":"test-config","debug":true}"#).unwrap();

    let rt = runtime();
    rt.configure(Manifest::default_at(dir.path())).unwrap();

    let entry = dir.path().join("index.js");
    fs::write(&entry, "globalThis.__cfg = require('./config.json');").unwrap();
    rt.run(&entry).unwrap();

    let value = rt.execute("check", "JSON.stringify(globalThis.__cfg)").unwrap();
    let parsed: serde_json::Value = serde_json::from_str(value.as_str().unwrap()).unwrap();
    assert_eq!(parsed["name"], serde_json::json!("test-config"));
    assert_eq!(parsed["debug"], serde_json::json!(true));
}

#[test]
fn script_error_reports_location_and_message() {
    let rt = runtime();
    let err = rt.execute("broken", "\n\n\nsuchUndefinedName;\n").unwrap_err();
    let report = gode_error::format(&err);
    assert!(report.contains("ReferenceError") || report.contains("suchUndefinedName"), "{report}");
}

#[test]
fn cached_module_is_only_evaluated_once() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("counter.js"), "globalThis.__loads = (globalThis.__loads || 0) + 1; module.exports = globalThis.__loads;").unwrap();
    fs::write(
        dir.path().join("index.js"),
        "require('./counter.js'); require('./counter.js'); globalThis.__final = require('./counter.js');",
    )
    .unwrap();

    let rt = runtime();
    rt.configure(Manifest::default_at(dir.path())).unwrap();
    rt.run(dir.path().join("index.js")).unwrap();

    let value = rt.execute("check", "globalThis.__final").unwrap();
    assert_eq!(value, serde_json::json!(1));
}

#[test]
fn set_global_is_visible_to_script() {
    let rt = runtime();
    rt.set_global("injected", serde_json::json!(42)).unwrap();
    let value = rt.execute("check", "injected").unwrap();
    assert_eq!(value, serde_json::json!(42));
}

#[test]
fn dispose_is_idempotent() {
    let rt = runtime();
    rt.dispose().unwrap();
    rt.dispose().unwrap();
}
