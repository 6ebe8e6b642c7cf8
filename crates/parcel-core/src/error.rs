//! Error types for the parcel attachment pipeline.
//!
//! Only resource and configuration failures are errors. Detection ambiguity and
//! extraction degradation are encoded in the result shape instead.

use thiserror::Error;

/// Result type alias using parcel's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for pipeline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Source path does not exist or cannot be stat'ed
    #[error("Not found: {0}")]
    NotFound(String),

    /// Temp directory or staged file could not be created or written
    #[error("Staging error: {0}")]
    Staging(String),

    /// Raw payload could not be decoded (bad data URI, invalid base64)
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No extractor could be resolved for a canonical type
    #[error("No extractor registered for type: {0}")]
    NoExtractor(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// Whether this error signals a defect in pipeline wiring rather than bad input.
    pub fn is_configuration_defect(&self) -> bool {
        matches!(self, Error::NoExtractor(_) | Error::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("/tmp/missing.txt".to_string());
        assert_eq!(err.to_string(), "Not found: /tmp/missing.txt");
    }

    #[test]
    fn test_error_display_staging() {
        let err = Error::Staging("read-only filesystem".to_string());
        assert_eq!(err.to_string(), "Staging error: read-only filesystem");
    }

    #[test]
    fn test_error_display_invalid_payload() {
        let err = Error::InvalidPayload("missing comma".to_string());
        assert_eq!(err.to_string(), "Invalid payload: missing comma");
    }

    #[test]
    fn test_error_display_no_extractor() {
        let err = Error::NoExtractor("text/plain".to_string());
        assert_eq!(
            err.to_string(),
            "No extractor registered for type: text/plain"
        );
    }

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.to_string().contains("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        match err {
            Error::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_from_serde_json_error_maintains_message() {
        let json_err = serde_json::from_str::<serde_json::Value>(r#"{"invalid": json}"#);
        let err: Error = json_err.unwrap_err().into();
        assert!(err.to_string().contains("Serialization error:"));
    }

    #[test]
    fn test_configuration_defect_classification() {
        assert!(Error::NoExtractor("x/y".into()).is_configuration_defect());
        assert!(Error::Config("bad".into()).is_configuration_defect());
        assert!(!Error::NotFound("x".into()).is_configuration_defect());
        assert!(!Error::Staging("x".into()).is_configuration_defect());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
