//! Raised error kinds for the store boundary.
//!
//! Most failures never surface as errors: read-path I/O and codec failures
//! demote to the absent sentinel (`None`), write-path failures demote to a
//! `false` result, both with a warn-level log. The variants here are the
//! only kinds a caller can observe as an `Err`.

use std::io;
use thiserror::Error;

/// Errors raised at the store boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A join or registry argument was empty or otherwise malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A bitemporal write carried an empty valid-time interval.
    #[error("invalid valid-time interval: validTo {valid_to} <= validFrom {valid_from}")]
    InvalidInterval { valid_from: i64, valid_to: i64 },

    /// `partition_by_name` was asked for a name never registered.
    #[error("unknown partition '{0}'")]
    UnknownPartition(String),

    /// I/O failure from an operation that does surface errors
    /// (registry open, backup).
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Convenience alias for boundary operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offending_interval() {
        let e = StoreError::InvalidInterval {
            valid_from: 50,
            valid_to: 25,
        };
        let msg = e.to_string();
        assert!(msg.contains("25"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn io_errors_convert_transparently() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        let e: StoreError = io_err.into();
        assert!(matches!(e, StoreError::Io(_)));
    }
}
