use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("Invalid signature '{name}': {reason}")]
    InvalidSignature { name: String, reason: String },

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Duplicate signature name: {0}")]
    DuplicateSignature(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CoreError {
    pub(crate) fn invalid_signature(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSignature {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// True for the three device/sink failure kinds.
    #[must_use]
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied(_) | Self::NotFound(_) | Self::Io(_)
        )
    }
}

impl From<io::Error> for CoreError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(err.to_string()),
            io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
