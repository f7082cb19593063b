use thiserror::Error;

pub type Result<T> = std::result::Result<T, PluginError>;

/// Failure taxonomy for the plugin bridge (spec.md §4.4's failure table).
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("cannot resolve plugin path '{0}'")]
    ResolvePath(String),

    #[error("failed to open shared object '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: libloading::Error,
    },

    #[error("plugin '{path}' does not satisfy the discovery protocol: {reason}")]
    Interface { path: String, reason: String },

    #[error("plugin '{name}' initialization failed: {message}")]
    Initialization { name: String, message: String },

    #[error("plugin '{name}' call to '{function}' failed: {message}")]
    Invocation {
        name: String,
        function: String,
        message: String,
    },

    #[error("no plugin registered under '{0}'")]
    NotFound(String),
}

impl PluginError {
    pub fn into_module_error(self, path: &str) -> gode_error::ModuleError {
        use gode_error::ErrorKind;
        let (kind, module, operation): (ErrorKind, String, String) = match &self {
            PluginError::ResolvePath(p) => (ErrorKind::Resolution, p.clone(), "resolve-path".to_string()),
            PluginError::Open { path, .. } => (ErrorKind::Io, path.clone(), "open".to_string()),
            PluginError::Interface { path, .. } => {
                (ErrorKind::Interface, path.clone(), "interface".to_string())
            }
            PluginError::Initialization { name, .. } => {
                (ErrorKind::Initialization, name.clone(), "initialize".to_string())
            }
            PluginError::Invocation { name, function, .. } => {
                (ErrorKind::Invocation, name.clone(), function.clone())
            }
            PluginError::NotFound(name) => (ErrorKind::Resolution, name.clone(), "resolve".to_string()),
        };
        gode_error::ModuleError::new(kind, &module, path, &operation, self.to_string())
    }
}
