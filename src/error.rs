//! Error types for array and record operations

use thiserror::Error;

/// Main error type for array, section and record operations
#[derive(Error, Debug)]
pub enum ArrayError {
    /// Invalid constructor input, storage/shape mismatch or wrong element kind
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Multi-index or flat index outside the array bounds
    #[error("Index out of range: {0}")]
    IndexOutOfRange(String),

    /// Malformed range or section, or a size mismatch while reshaping
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Specialized Result type for array operations
pub type Result<T> = std::result::Result<T, ArrayError>;

impl From<serde_json::Error> for ArrayError {
    fn from(err: serde_json::Error) -> Self {
        ArrayError::Serialization(err.to_string())
    }
}

impl ArrayError {
    pub(crate) fn argument(msg: impl Into<String>) -> Self {
        ArrayError::Argument(msg.into())
    }

    pub(crate) fn out_of_range(msg: impl Into<String>) -> Self {
        ArrayError::IndexOutOfRange(msg.into())
    }

    pub(crate) fn invalid_range(msg: impl Into<String>) -> Self {
        ArrayError::InvalidRange(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        ArrayError::Unsupported(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ArrayError::argument("storage length 5 != shape size 6");
        assert_eq!(
            err.to_string(),
            "Invalid argument: storage length 5 != shape size 6"
        );
        let err = ArrayError::out_of_range("index 3 >= 3");
        assert!(err.to_string().starts_with("Index out of range"));
    }

    #[test]
    fn test_from_json_error() {
        let bad: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: ArrayError = bad.unwrap_err().into();
        assert!(matches!(err, ArrayError::Serialization(_)));
    }
}
