//! Dependency spec grammar: `file:<path>` | `<registry>:<rest>` | `npm:<version>` | `<version>`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A parsed dependency specifier, matching spec.md §6's grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencySpec {
    /// `file:<path>` — a local path dependency. May resolve to either a
    /// source file or a native plugin, depending on extension (decided
    /// by the resolver, not here).
    File(String),
    /// `<registry>:<rest>` — a non-`file`/`npm` scheme naming a registry
    /// from the manifest's registry map.
    Registry { registry: String, rest: String },
    /// `npm:<version>` — explicit npm-style registry reference.
    Npm(String),
    /// A bare version string, treated as an implicit npm-style dependency.
    Bare(String),
}

impl DependencySpec {
    pub fn parse(spec: &str) -> Self {
        if let Some(path) = spec.strip_prefix("file:") {
            return DependencySpec::File(path.to_string());
        }
        if let Some(version) = spec.strip_prefix("npm:") {
            return DependencySpec::Npm(version.to_string());
        }
        if let Some(colon) = spec.find(':') {
            let (scheme, rest) = spec.split_at(colon);
            let rest = &rest[1..];
            // A bare semver-ish string like "1.0.0" has no meaningful
            // "scheme" before a colon in practice, but if the manifest
            // spelled one out explicitly, honor it as a named registry.
            return DependencySpec::Registry {
                registry: scheme.to_string(),
                rest: rest.to_string(),
            };
        }
        DependencySpec::Bare(spec.to_string())
    }

    /// Whether the path named by a `file:` spec has the platform's
    /// shared-library extension (and should therefore resolve to a
    /// native plugin rather than a source file).
    pub fn is_native_plugin_path(path: &str) -> bool {
        let ext = std::path::Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        matches!(ext, "so" | "dylib" | "dll")
    }
}

impl fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencySpec::File(p) => write!(f, "file:{}", p),
            DependencySpec::Registry { registry, rest } => write!(f, "{}:{}", registry, rest),
            DependencySpec::Npm(v) => write!(f, "npm:{}", v),
            DependencySpec::Bare(v) => write!(f, "{}", v),
        }
    }
}

impl Serialize for DependencySpec {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DependencySpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(DependencySpec::parse(&s))
    }
}

// schemars represents this as a plain string in the generated schema,
// matching how the manifest file actually looks on disk.
impl schemars::JsonSchema for DependencySpec {
    fn schema_name() -> String {
        "DependencySpec".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_file_spec() {
        assert_eq!(
            DependencySpec::parse("file:./plugins/math.so"),
            DependencySpec::File("./plugins/math.so".to_string())
        );
    }

    #[test]
    fn parses_npm_spec() {
        assert_eq!(
            DependencySpec::parse("npm:1.2.3"),
            DependencySpec::Npm("1.2.3".to_string())
        );
    }

    #[test]
    fn parses_registry_spec() {
        assert_eq!(
            DependencySpec::parse("jsr:^2.0.0"),
            DependencySpec::Registry {
                registry: "jsr".to_string(),
                rest: "^2.0.0".to_string()
            }
        );
    }

    #[test]
    fn parses_bare_version() {
        assert_eq!(
            DependencySpec::parse("1.0.0"),
            DependencySpec::Bare("1.0.0".to_string())
        );
    }

    #[test]
    fn detects_native_plugin_extension() {
        assert!(DependencySpec::is_native_plugin_path("./plugins/math.so"));
        assert!(DependencySpec::is_native_plugin_path("./plugins/math.dylib"));
        assert!(!DependencySpec::is_native_plugin_path("./plugins/math.js"));
    }
}
