//! Error types for mapping, change tracking and result access.
//!
//! Errors fall into four families:
//!
//! - **Configuration** ([`OdmError::Configuration`], [`OdmError::Conversion`]): a record
//!   type's declarations are inconsistent with itself or with the stored data shape.
//!   These are fatal and abort the current mapping immediately.
//! - **Data** ([`OdmError::FieldNotFound`]): a generic accessor was asked for a field
//!   path that does not exist. Recoverable.
//! - **Usage** ([`OdmError::Usage`], [`OdmError::IndexOutOfRange`],
//!   [`OdmError::NotFound`], [`OdmError::UnexpectedResult`]): the caller used a
//!   [`ResultSet`](crate::result::ResultSet) in a way its current state forbids.
//! - **Timeout** ([`OdmError::Timeout`], [`OdmError::Cancelled`]): a deadline or
//!   cancellation fired while waiting on the driver.
//!
//! ```rust
//! use docmap::{ErrorKind, OdmError};
//!
//! let err = OdmError::not_found("users");
//! assert!(err.is_not_found());
//! assert_eq!(err.kind(), ErrorKind::Usage);
//! ```

use std::time::Duration;

use thiserror::Error;

/// Result type for ODM operations.
pub type OdmResult<T> = Result<T, OdmError>;

/// Coarse classification of an [`OdmError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Record type definition is inconsistent. Fatal.
    Configuration,
    /// Requested field path does not exist. Recoverable.
    Data,
    /// The caller broke a result-set usage rule. Fatal.
    Usage,
    /// A deadline or cancellation fired.
    Timeout,
    /// The driver failed. Not retried.
    Driver,
}

/// Errors that can occur while mapping, tracking or reading records.
#[derive(Error, Debug)]
pub enum OdmError {
    /// A record type's field declarations are self-inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A stored value could not be converted into the declared field type.
    #[error("conversion error at '{path}': {message}")]
    Conversion {
        /// Document key path of the failing field.
        path: String,
        /// What went wrong.
        message: String,
    },

    /// The requested field path does not exist on the record.
    #[error("field not found: {0}")]
    FieldNotFound(String),

    /// A result-set method was called in a state that forbids it.
    #[error("invalid operation [{method}]: {reason}")]
    Usage {
        /// Name of the offending method.
        method: &'static str,
        /// Why the call is not allowed.
        reason: String,
    },

    /// Indexed past the end of a result set.
    #[error("index {index} out of range for result of {len} record(s)")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of records actually available.
        len: usize,
    },

    /// A single record was required but none matched.
    #[error("record not found: {0}")]
    NotFound(String),

    /// A single record was required but more than one matched.
    #[error("unexpected result: expected exactly one record, found {found}")]
    UnexpectedResult {
        /// Number of records found (at least two).
        found: usize,
    },

    /// A deadline elapsed while waiting on the driver.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// The underlying driver reported a failure.
    #[error("driver error: {0}")]
    Driver(String),
}

impl OdmError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a conversion error for the given key path.
    pub fn conversion(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a field-not-found error.
    pub fn field_not_found(path: impl Into<String>) -> Self {
        Self::FieldNotFound(path.into())
    }

    /// Create a usage error.
    pub fn usage(method: &'static str, reason: impl Into<String>) -> Self {
        Self::Usage {
            method,
            reason: reason.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a driver error.
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver(message.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) | Self::Conversion { .. } => ErrorKind::Configuration,
            Self::FieldNotFound(_) => ErrorKind::Data,
            Self::Usage { .. }
            | Self::IndexOutOfRange { .. }
            | Self::NotFound(_)
            | Self::UnexpectedResult { .. } => ErrorKind::Usage,
            Self::Timeout(_) | Self::Cancelled => ErrorKind::Timeout,
            Self::Driver(_) => ErrorKind::Driver,
        }
    }

    /// Check if this is a configuration (or conversion) error.
    pub fn is_configuration_error(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    /// Check if this is a result-set usage error.
    pub fn is_usage_error(&self) -> bool {
        self.kind() == ErrorKind::Usage
    }

    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a missing field error.
    pub fn is_field_not_found(&self) -> bool {
        matches!(self, Self::FieldNotFound(_))
    }

    /// Check if this is an index out of range error.
    pub fn is_index_out_of_range(&self) -> bool {
        matches!(self, Self::IndexOutOfRange { .. })
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if the operation was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this error signals a programming mistake rather than a runtime condition.
    ///
    /// Fatal errors are never retried or masked anywhere in this crate.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Configuration | ErrorKind::Usage | ErrorKind::Driver
        ) && !self.is_not_found()
    }

    /// Prefix the key path of a conversion error with a parent key.
    pub(crate) fn within(self, parent: &str) -> Self {
        match self {
            Self::Conversion { path, message } if path.is_empty() => Self::Conversion {
                path: parent.to_string(),
                message,
            },
            Self::Conversion { path, message } => Self::Conversion {
                path: format!("{parent}.{path}"),
                message,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = OdmError::configuration("inline field is not a record");
        assert!(err.is_configuration_error());
        assert!(err.is_fatal());

        let err = OdmError::Timeout(Duration::from_millis(50));
        assert!(err.is_timeout());
        assert!(!err.is_fatal());

        let err = OdmError::not_found("users");
        assert!(err.is_not_found());
        assert!(err.is_usage_error());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = OdmError::field_not_found("address.zip");
        assert_eq!(err.to_string(), "field not found: address.zip");

        let err = OdmError::IndexOutOfRange { index: 2, len: 2 };
        assert_eq!(
            err.to_string(),
            "index 2 out of range for result of 2 record(s)"
        );

        let err = OdmError::usage("streaming", "random access already used");
        assert_eq!(
            err.to_string(),
            "invalid operation [streaming]: random access already used"
        );
    }

    #[test]
    fn test_conversion_path_nesting() {
        let err = OdmError::conversion("", "expected int32")
            .within("zip")
            .within("address");
        match err {
            OdmError::Conversion { path, .. } => assert_eq!(path, "address.zip"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_kinds() {
        assert_eq!(OdmError::Cancelled.kind(), ErrorKind::Timeout);
        assert_eq!(OdmError::driver("boom").kind(), ErrorKind::Driver);
        assert_eq!(
            OdmError::field_not_found("x").kind(),
            ErrorKind::Data
        );
        assert_eq!(
            OdmError::UnexpectedResult { found: 3 }.kind(),
            ErrorKind::Usage
        );
    }
}
