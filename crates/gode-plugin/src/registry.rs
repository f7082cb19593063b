//! The bridge's two bookkeeping maps (spec.md §4.4), grounded on the
//! static two-map shape of `stam_mod_runtimes`'s `MOD_ALIAS_REGISTRY`
//! generalized from a single process-global to instance-owned state
//! (the facade owns one bridge, not a static).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::abi::DisposeFn;
use crate::export::PluginExport;

/// Everything the bridge knows about one loaded plugin.
pub struct PluginRecord {
    pub canonical_name: String,
    pub version: String,
    pub path: PathBuf,
    pub exports: HashMap<String, Arc<PluginExport>>,
    pub initialized: bool,
    pub dispose: Option<DisposeFn>,
}

/// `absolute-path -> PluginRecord` (de-duplicates repeat loads) and
/// `canonical-name -> exports` (answers bridge queries by name). A
/// single exclusive lock guards each map, per spec.md §5's
/// shared-resource policy.
#[derive(Default)]
pub struct PluginRegistry {
    by_path: RwLock<HashMap<PathBuf, Arc<PluginRecord>>>,
    by_name: RwLock<HashMap<String, Arc<PluginRecord>>>,
}

impl PluginRegistry {
    pub fn get_by_path(&self, path: &std::path::Path) -> Option<Arc<PluginRecord>> {
        self.by_path.read().unwrap().get(path).cloned()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<PluginRecord>> {
        self.by_name.read().unwrap().get(name).cloned()
    }

    pub fn get_export(&self, canonical_name: &str, export_name: &str) -> Option<Arc<PluginExport>> {
        self.get_by_name(canonical_name)?.exports.get(export_name).cloned()
    }

    pub fn insert(&self, path: PathBuf, record: PluginRecord) -> Arc<PluginRecord> {
        let record = Arc::new(record);
        self.by_path.write().unwrap().insert(path, record.clone());
        self.by_name
            .write()
            .unwrap()
            .insert(record.canonical_name.clone(), record.clone());
        record
    }

    /// Remove both entries for `path`. Does not invoke `Dispose`; the
    /// caller (`PluginBridge::unload`) does that before or after, under
    /// `safe_operation`.
    pub fn remove(&self, path: &std::path::Path) -> Option<Arc<PluginRecord>> {
        let record = self.by_path.write().unwrap().remove(path)?;
        self.by_name.write().unwrap().remove(&record.canonical_name);
        Some(record)
    }

    pub fn loaded_paths(&self) -> Vec<PathBuf> {
        self.by_path.read().unwrap().keys().cloned().collect()
    }
}
