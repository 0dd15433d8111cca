//! Error types for asset loading

use thiserror::Error;

/// Error raised while issuing or completing an asset load
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The path cannot name an asset (empty, NUL byte, no file name)
    #[error("Invalid asset path: {0:?}")]
    InvalidPath(String),
    /// Asset not found
    #[error("Asset not found: {0}")]
    NotFound(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(String),
    /// Parse/decode error
    #[error("Parse error: {0}")]
    Parse(String),
    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    /// A cubemap archive lacks one of its six faces
    #[error("Cubemap {archive} is missing face {face}")]
    MissingCubemapFace { archive: String, face: &'static str },
    /// The worker pool has shut down
    #[error("Asset server is not running")]
    Disconnected,
}

impl LoadError {
    /// Map an IO error, keeping "not found" distinct
    pub fn from_io(path: &str, err: &std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            LoadError::NotFound(path.to_string())
        } else {
            LoadError::Io(format!("{}: {}", path, err))
        }
    }
}

/// Result type for asset loading
pub type LoadResult<T> = Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_distinct() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(
            LoadError::from_io("a/box.obj", &err),
            LoadError::NotFound("a/box.obj".into())
        );

        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(LoadError::from_io("a/box.obj", &err), LoadError::Io(_)));
    }
}
