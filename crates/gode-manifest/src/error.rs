use thiserror::Error;

pub type Result<T> = std::result::Result<T, ManifestError>;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest '{0}': {1}")]
    Io(String, #[source] std::io::Error),

    #[error("manifest JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("manifest schema validation failed: {0}")]
    Validation(String),

    #[error("invalid dependency spec '{0}' for '{1}'")]
    InvalidDependencySpec(String, String),

    #[error("cannot resolve module: {0}")]
    Unresolvable(String),
}

impl ManifestError {
    pub fn into_module_error(self, module: &str, path: &str) -> gode_error::ModuleError {
        use gode_error::ErrorKind;
        let kind = match &self {
            ManifestError::Io(..) => ErrorKind::Io,
            ManifestError::Parse(_) => ErrorKind::Format,
            ManifestError::Validation(_) => ErrorKind::Format,
            ManifestError::InvalidDependencySpec(..) => ErrorKind::Resolution,
            ManifestError::Unresolvable(_) => ErrorKind::Resolution,
        };
        let op = match &self {
            ManifestError::Io(..) => "read",
            ManifestError::Parse(_) => "parse",
            ManifestError::Validation(_) => "validate",
            ManifestError::InvalidDependencySpec(..) => "resolve",
            ManifestError::Unresolvable(_) => "resolve",
        };
        gode_error::ModuleError::new(kind, module, path, op, self.to_string())
    }
}
