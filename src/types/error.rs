use thiserror::Error;

/// voxmeter error types
#[derive(Error, Debug)]
pub enum VoxmeterError {
    /// Failed to parse JSON/JSONL or a date
    #[error("parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Record source (file or backend) failed
    #[error("source error: {0}")]
    Source(String),

    /// CSV serialization or delivery failed
    #[error("export error: {0}")]
    Export(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

/// Result type alias for voxmeter
pub type Result<T> = std::result::Result<T, VoxmeterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VoxmeterError::Parse("invalid json".into());
        assert_eq!(err.to_string(), "parse error: invalid json");
    }

    #[test]
    fn test_source_error_display() {
        let err = VoxmeterError::Source("HTTP 502".into());
        assert_eq!(err.to_string(), "source error: HTTP 502");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: VoxmeterError = io_err.into();
        assert!(err.to_string().contains("io error"));
    }
}
