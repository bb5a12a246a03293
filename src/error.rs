//! Error types for filedrop.

use thiserror::Error;

/// Common error type for filedrop.
#[derive(Error, Debug)]
pub enum FiledropError {
    /// The file name is empty, a dot entry, or contains a path separator.
    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    /// A fresh upload would clobber a file that exists on disk but is not tracked.
    #[error("file {0} already exists on disk")]
    AlreadyExists(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No record is stored under the name.
    #[error("file {0} not stored")]
    NotFound(String),

    /// The expiration time of the file has passed.
    #[error("file {0} expired")]
    Expired(String),

    /// The download limit of the file has been used up.
    #[error("download limit of {0} exceeded")]
    LimitExceeded(String),

    /// Textual constraint input could not be parsed.
    #[error("invalid constraint: {0}")]
    InvalidConstraint(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl FiledropError {
    /// Whether the error refuses access to a file rather than reporting a failure.
    ///
    /// Refusals are expected outcomes of the access constraints and are
    /// usually answered with "not found" by a front end.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            FiledropError::NotFound(_) | FiledropError::Expired(_) | FiledropError::LimitExceeded(_)
        )
    }
}

/// Result type alias for filedrop operations.
pub type Result<T> = std::result::Result<T, FiledropError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_name_display() {
        let err = FiledropError::InvalidName("a/b".to_string());
        assert_eq!(err.to_string(), "invalid file name: \"a/b\"");
    }

    #[test]
    fn test_refusal_display() {
        assert_eq!(
            FiledropError::NotFound("a.txt".to_string()).to_string(),
            "file a.txt not stored"
        );
        assert_eq!(
            FiledropError::Expired("a.txt".to_string()).to_string(),
            "file a.txt expired"
        );
        assert_eq!(
            FiledropError::LimitExceeded("a.txt".to_string()).to_string(),
            "download limit of a.txt exceeded"
        );
    }

    #[test]
    fn test_is_refusal() {
        assert!(FiledropError::NotFound("x".to_string()).is_refusal());
        assert!(FiledropError::Expired("x".to_string()).is_refusal());
        assert!(FiledropError::LimitExceeded("x".to_string()).is_refusal());
        assert!(!FiledropError::InvalidName("x".to_string()).is_refusal());
        assert!(!FiledropError::AlreadyExists("x".to_string()).is_refusal());
        assert!(!FiledropError::Config("x".to_string()).is_refusal());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: FiledropError = io_err.into();
        assert!(matches!(err, FiledropError::Io(_)));
        assert!(err.to_string().contains("read-only"));
        assert!(!err.is_refusal());
    }
}
