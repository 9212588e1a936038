//! Error types for the MongoDB driver.

use std::time::Duration;

use docmap::OdmError;
use thiserror::Error;

/// Result type for MongoDB operations.
pub type MongoResult<T> = Result<T, MongoError>;

/// Errors that can occur during MongoDB operations.
#[derive(Error, Debug)]
pub enum MongoError {
    /// MongoDB driver error.
    #[error("mongodb error: {0}")]
    Driver(#[from] mongodb::error::Error),

    /// BSON deserialization error.
    #[error("bson deserialization error: {0}")]
    BsonDe(#[from] bson::de::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// The cursor was used after it was closed.
    #[error("cursor error: {0}")]
    Cursor(String),

    /// Timeout error.
    #[error("operation timed out after {0}ms")]
    Timeout(u64),
}

impl MongoError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a cursor error.
    pub fn cursor(message: impl Into<String>) -> Self {
        Self::Cursor(message.into())
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<MongoError> for OdmError {
    fn from(err: MongoError) -> Self {
        match err {
            MongoError::Driver(e) => OdmError::driver(e.to_string()),
            MongoError::BsonDe(e) => OdmError::driver(format!("undecodable document: {e}")),
            MongoError::Config(msg) => OdmError::configuration(msg),
            MongoError::Connection(msg) => OdmError::driver(msg),
            MongoError::Cursor(msg) => OdmError::driver(msg),
            MongoError::Timeout(ms) => OdmError::Timeout(Duration::from_millis(ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = MongoError::config("invalid URI");
        assert!(matches!(err, MongoError::Config(_)));

        let err = MongoError::connection("connection refused");
        assert!(err.is_connection_error());

        let err = MongoError::Timeout(5000);
        assert!(err.is_timeout());
    }

    #[test]
    fn test_error_display() {
        let err = MongoError::config("test error");
        assert_eq!(err.to_string(), "configuration error: test error");

        let err = MongoError::cursor("closed");
        assert_eq!(err.to_string(), "cursor error: closed");
    }

    #[test]
    fn test_into_odm_error() {
        let odm: OdmError = MongoError::Timeout(1000).into();
        assert!(odm.is_timeout());

        let odm: OdmError = MongoError::config("bad uri").into();
        assert!(odm.is_configuration_error());

        let odm: OdmError = MongoError::connection("refused").into();
        assert_eq!(odm.kind(), docmap::ErrorKind::Driver);
    }
}
