//! Project manifest: the key→value document described in spec.md §3/§6.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::dependency::DependencySpec;
use crate::error::{ManifestError, Result};

pub const MANIFEST_FILE_NAME: &str = "gode.json";

/// Permission lists. Advisory in the core: nothing in this crate or
/// `gode-runtime`/`gode-plugin` enforces them, but embedders can read
/// them to build their own sandboxing policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "kebab-case")]
pub struct Permissions {
    #[serde(rename = "allow-net")]
    pub allow_net: Vec<String>,
    #[serde(rename = "allow-read")]
    pub allow_read: Vec<String>,
    #[serde(rename = "allow-write")]
    pub allow_write: Vec<String>,
    #[serde(rename = "allow-env")]
    pub allow_env: Vec<String>,
}

/// Build hints: advisory metadata for downstream bundlers/packagers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BuildHints {
    pub embed: Vec<String>,
    pub external: Vec<String>,
    pub target: Option<String>,
    #[serde(default)]
    pub minify: bool,
}

/// The `gode` namespace of the manifest: everything specific to this
/// runtime rather than generic package metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GodeSection {
    pub imports: HashMap<String, String>,
    pub registries: HashMap<String, String>,
    pub permissions: Permissions,
    pub build: BuildHints,
}

/// A project descriptor, constructed once at runtime configuration and
/// immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(title = "Project Manifest")]
#[schemars(description = "Manifest file for a gode-core embedded project")]
pub struct Manifest {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(rename = "type", default)]
    pub module_type: Option<String>,
    #[serde(default)]
    pub dependencies: HashMap<String, DependencySpec>,
    #[serde(default, rename = "devDependencies")]
    pub dev_dependencies: HashMap<String, DependencySpec>,
    #[serde(default, rename = "gode")]
    pub gode: GodeSection,

    /// The directory the manifest was discovered in. Not part of the
    /// on-disk JSON; filled in by [`Manifest::load_for_entry`] /
    /// [`Manifest::from_json_str`] callers.
    #[serde(skip, default = "default_root")]
    pub root: PathBuf,
}

fn default_name() -> String {
    "gode-project".to_string()
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

impl Manifest {
    /// Load and validate a manifest from a JSON string, rooted at
    /// `root`.
    pub fn from_json_str(json: &str, root: impl Into<PathBuf>) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;

        let schema = schemars::schema_for!(Manifest);
        let schema_json = serde_json::to_value(&schema)?;
        let compiled = jsonschema::validator_for(&schema_json)
            .map_err(|e| ManifestError::Validation(e.to_string()))?;
        compiled
            .validate(&value)
            .map_err(|e| ManifestError::Validation(format!("{}", e)))?;

        let mut manifest: Manifest = serde_json::from_value(value)?;
        manifest.root = root.into();
        Ok(manifest)
    }

    /// Load and validate a manifest from a file on disk.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| ManifestError::Io(path.display().to_string(), e))?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_json_str(&content, root)
    }

    /// The default manifest: used when no manifest file is found.
    /// Rooted at `entry_dir`.
    pub fn default_at(entry_dir: impl Into<PathBuf>) -> Self {
        Manifest {
            name: default_name(),
            version: String::new(),
            description: String::new(),
            main: None,
            module_type: None,
            dependencies: HashMap::new(),
            dev_dependencies: HashMap::new(),
            gode: GodeSection::default(),
            root: entry_dir.into(),
        }
    }

    /// Discover the project manifest by ascending from `entry_file`'s
    /// directory until a `gode.json` is found. If none is found, returns
    /// the default manifest rooted at the entry file's directory.
    pub fn discover(entry_file: &Path) -> Result<Self> {
        let mut dir = entry_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        loop {
            let candidate = dir.join(MANIFEST_FILE_NAME);
            if candidate.is_file() {
                return Self::from_json_file(&candidate);
            }
            if !dir.pop() {
                break;
            }
        }

        let fallback_dir = entry_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self::default_at(fallback_dir))
    }

    pub fn generate_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Manifest)
    }

    pub fn schema_json() -> Result<String> {
        Ok(serde_json::to_string_pretty(&Self::generate_schema())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_fields_missing() {
        let manifest = Manifest::from_json_str("{}", ".").unwrap();
        assert_eq!(manifest.name, "gode-project");
        assert!(manifest.dependencies.is_empty());
    }

    #[test]
    fn parses_dependencies_and_imports() {
        let json = r#"{
            "name": "demo",
            "dependencies": { "math": "file:./plugins/math.so" },
            "gode": {
                "imports": { "@app": "./src" },
                "registries": { "jsr": "https://jsr.io" }
            }
        }"#;
        let manifest = Manifest::from_json_str(json, ".").unwrap();
        assert_eq!(manifest.name, "demo");
        assert_eq!(
            manifest.dependencies.get("math"),
            Some(&DependencySpec::File("./plugins/math.so".to_string()))
        );
        assert_eq!(manifest.gode.imports.get("@app"), Some(&"./src".to_string()));
        assert_eq!(
            manifest.gode.registries.get("jsr"),
            Some(&"https://jsr.io".to_string())
        );
    }

    #[test]
    fn discover_falls_back_to_default_without_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("index.js");
        fs::write(&entry, "// empty").unwrap();

        let manifest = Manifest::discover(&entry).unwrap();
        assert_eq!(manifest.name, "gode-project");
        assert_eq!(manifest.root, dir.path());
    }

    #[test]
    fn discover_ascends_to_nearest_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("src");
        fs::create_dir_all(&sub).unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE_NAME),
            r#"{"name": "top-level"}"#,
        )
        .unwrap();
        let entry = sub.join("index.js");
        fs::write(&entry, "// empty").unwrap();

        let manifest = Manifest::discover(&entry).unwrap();
        assert_eq!(manifest.name, "top-level");
        assert_eq!(manifest.root, dir.path());
    }
}
