//! Error types for Riffle
//!
//! Provides a unified error type for all stream, codec and record operations.
//! Objects keep the first failure they hit; it is cloned out through
//! `status()`, which is why the type is `Clone`.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Result type alias using RiffleError
pub type Result<T> = std::result::Result<T, RiffleError>;

/// Unified error type for Riffle operations
#[derive(Debug, Clone, Error)]
pub enum RiffleError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(Arc<io::Error>),

    // -------------------------------------------------------------------------
    // Object State Errors
    // -------------------------------------------------------------------------
    #[error("Object closed")]
    Closed,

    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Position Errors
    // -------------------------------------------------------------------------
    #[error("Position overflow: {0}")]
    Overflow(String),

    // -------------------------------------------------------------------------
    // Capability Errors
    // -------------------------------------------------------------------------
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    // -------------------------------------------------------------------------
    // Data Errors
    // -------------------------------------------------------------------------
    #[error("Data loss: {0}")]
    DataLoss(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Other Errors
    // -------------------------------------------------------------------------
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl RiffleError {
    /// Returns true for corruption-class failures that record recovery may skip.
    pub fn is_data_loss(&self) -> bool {
        matches!(self, RiffleError::DataLoss(_))
    }

    /// Returns true if the operation is not supported by this object.
    pub fn is_unimplemented(&self) -> bool {
        matches!(self, RiffleError::Unimplemented(_))
    }

    /// Human readable message without the category prefix.
    pub fn message(&self) -> String {
        match self {
            RiffleError::Io(err) => err.to_string(),
            RiffleError::Closed => "Object closed".to_string(),
            RiffleError::FailedPrecondition(msg)
            | RiffleError::InvalidArgument(msg)
            | RiffleError::Overflow(msg)
            | RiffleError::Unimplemented(msg)
            | RiffleError::DataLoss(msg)
            | RiffleError::Serialization(msg)
            | RiffleError::Internal(msg)
            | RiffleError::Unknown(msg) => msg.clone(),
        }
    }
}

impl From<io::Error> for RiffleError {
    fn from(err: io::Error) -> Self {
        // Failures that crossed a `std::io` bridge come back unchanged.
        if let Some(inner) = err.get_ref().and_then(|inner| inner.downcast_ref::<RiffleError>()) {
            return inner.clone();
        }
        // Errors that carry neither a specific kind nor an OS code.
        if err.kind() == io::ErrorKind::Other && err.raw_os_error().is_none() {
            return RiffleError::Unknown(err.to_string());
        }
        RiffleError::Io(Arc::new(err))
    }
}

impl From<bincode::Error> for RiffleError {
    fn from(err: bincode::Error) -> Self {
        RiffleError::Serialization(err.to_string())
    }
}

impl From<RiffleError> for io::Error {
    fn from(err: RiffleError) -> Self {
        let kind = match &err {
            RiffleError::Io(inner) => inner.kind(),
            RiffleError::DataLoss(_) => io::ErrorKind::InvalidData,
            RiffleError::InvalidArgument(_) => io::ErrorKind::InvalidInput,
            RiffleError::Unimplemented(_) => io::ErrorKind::Unsupported,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_with_specific_kind_maps_to_io() {
        let err: RiffleError = io::Error::from(io::ErrorKind::NotFound).into();
        assert!(matches!(err, RiffleError::Io(_)));
    }

    #[test]
    fn test_io_error_without_code_maps_to_unknown() {
        let err: RiffleError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(matches!(err, RiffleError::Unknown(ref msg) if msg == "boom"));
    }

    #[test]
    fn test_data_loss_round_trips_through_io_error() {
        let err: io::Error = RiffleError::DataLoss("bad crc".into()).into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        let back: RiffleError = err.into();
        assert!(matches!(back, RiffleError::DataLoss(ref msg) if msg == "bad crc"));
    }
}
