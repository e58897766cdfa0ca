use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistencyError {
    #[error("not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("missing required parameter '{0}': pass it explicitly or record it in a previous run")]
    MissingParameter(String),

    #[error("no existing persistency layer at {0}: strict mode requires a layer to migrate from")]
    LayerNotFound(PathBuf),

    #[error("invalid layer directory '{0}': must be a relative path inside the project")]
    InvalidLayerDir(String),

    #[error("invalid value for '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("backup of {path} failed: {source}")]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: Box<PersistencyError>,
    },

    #[error("template placeholder '{{{{{0}}}}}' has no value")]
    TemplateKey(String),

    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    #[error("invalid config file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{stage} failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<PersistencyError>,
    },

    #[error("{path}: {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Walk(#[from] walkdir::Error),
}

/// Coarse classification a caller maps onto its own exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    NotARepository,
    InvalidArguments,
    Failure,
}

impl PersistencyError {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::NotARepository(_) => FailureClass::NotARepository,
            Self::MissingParameter(_)
            | Self::LayerNotFound(_)
            | Self::InvalidLayerDir(_)
            | Self::InvalidParameter { .. } => FailureClass::InvalidArguments,
            Self::Stage { source, .. } | Self::BackupFailed { source, .. } => source.class(),
            _ => FailureClass::Failure,
        }
    }

    /// Attach the offending path to a bare I/O error.
    pub fn at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::PathIo {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PersistencyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_wrapper_keeps_inner_class() {
        let err = PersistencyError::Stage {
            stage: "resolve_path",
            source: Box::new(PersistencyError::LayerNotFound(PathBuf::from("/p/ai"))),
        };
        assert_eq!(err.class(), FailureClass::InvalidArguments);
        assert!(err.to_string().contains("resolve_path failed"));
        assert!(err.to_string().contains("/p/ai"));
    }

    #[test]
    fn io_errors_are_generic_failures() {
        let err = PersistencyError::at(
            "/p/ai/functional",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.class(), FailureClass::Failure);
        assert!(err.to_string().starts_with("/p/ai/functional"));
    }

    #[test]
    fn template_key_message_shows_braces() {
        let err = PersistencyError::TemplateKey("project".into());
        assert_eq!(err.to_string(), "template placeholder '{{project}}' has no value");
    }
}
