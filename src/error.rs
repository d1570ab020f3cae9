//! Error types for pacer.

use thiserror::Error;

/// Main error type for pacer operations.
///
/// Errors raised by the wrapped source during a read are not represented
/// here: the `Read` impl hands them back as the original `std::io::Error`.
#[derive(Error, Debug)]
pub enum PacerError {
    /// The rate was zero, negative, NaN or infinite
    #[error("Invalid rate: {0} kbps (must be a finite number greater than zero)")]
    InvalidRate(f64),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for PacerError {
    fn from(err: config::ConfigError) -> Self {
        PacerError::Config(err.to_string())
    }
}

/// Result type alias for pacer operations.
pub type Result<T> = std::result::Result<T, PacerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_rate_message() {
        let err = PacerError::InvalidRate(-2.5);
        assert_eq!(
            err.to_string(),
            "Invalid rate: -2.5 kbps (must be a finite number greater than zero)"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PacerError = io.into();
        assert!(matches!(err, PacerError::Io(_)));
        assert_eq!(err.to_string(), "I/O error: missing");
    }
}
