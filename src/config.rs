//! ODM-wide configuration.
//!
//! ```rust
//! use std::time::Duration;
//! use docmap::OdmConfig;
//!
//! let config = OdmConfig::builder()
//!     .default_database("app")
//!     .query_timeout(Duration::from_secs(5))
//!     .build();
//! assert_eq!(config.default_database(), Some("app"));
//!
//! let source = "default_database = \"app\"\nquery_timeout_ms = 5000";
//! let parsed = OdmConfig::from_toml_str(source).unwrap();
//! assert_eq!(parsed, config);
//! ```

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::QueryContext;
use crate::error::{OdmError, OdmResult};

/// Environment variable holding the default database name.
pub const DEFAULT_DATABASE_VAR: &str = "DOCMAP_DEFAULT_DATABASE";
/// Environment variable holding the default query timeout in milliseconds.
pub const QUERY_TIMEOUT_VAR: &str = "DOCMAP_QUERY_TIMEOUT_MS";

/// Settings shared by every collection handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdmConfig {
    /// Database used when a model does not name one.
    pub default_database: Option<String>,
    /// Deadline applied to queries without an explicit context, in milliseconds.
    pub query_timeout_ms: Option<u64>,
}

impl OdmConfig {
    /// Start a builder.
    pub fn builder() -> OdmConfigBuilder {
        OdmConfigBuilder::default()
    }

    /// Read `DOCMAP_DEFAULT_DATABASE` and `DOCMAP_QUERY_TIMEOUT_MS`.
    pub fn from_env() -> OdmResult<Self> {
        let default_database = env::var(DEFAULT_DATABASE_VAR).ok().filter(|v| !v.is_empty());
        let query_timeout_ms = match env::var(QUERY_TIMEOUT_VAR) {
            Ok(raw) => Some(raw.trim().parse::<u64>().map_err(|e| {
                OdmError::configuration(format!("{QUERY_TIMEOUT_VAR}='{raw}': {e}"))
            })?),
            Err(_) => None,
        };
        Ok(Self {
            default_database,
            query_timeout_ms,
        })
    }

    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> OdmResult<Self> {
        toml::from_str(source)
            .map_err(|e| OdmError::configuration(format!("invalid docmap config: {e}")))
    }

    /// Database used when a model does not name one.
    pub fn default_database(&self) -> Option<&str> {
        self.default_database.as_deref()
    }

    /// Default query timeout.
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }

    /// Context for a query that did not supply one.
    pub fn default_context(&self) -> QueryContext {
        match self.query_timeout() {
            Some(timeout) => QueryContext::new().with_timeout(timeout),
            None => QueryContext::new(),
        }
    }
}

/// Builder for [`OdmConfig`].
#[derive(Debug, Default)]
pub struct OdmConfigBuilder {
    config: OdmConfig,
}

impl OdmConfigBuilder {
    /// Set the default database.
    pub fn default_database(mut self, database: impl Into<String>) -> Self {
        self.config.default_database = Some(database.into());
        self
    }

    /// Set the default query timeout.
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.config.query_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Finish.
    pub fn build(self) -> OdmConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = OdmConfig::builder()
            .default_database("app")
            .query_timeout(Duration::from_millis(250))
            .build();
        assert_eq!(config.default_database(), Some("app"));
        assert_eq!(config.query_timeout(), Some(Duration::from_millis(250)));
        assert!(config.default_context().deadline().is_some());
        assert!(OdmConfig::default().default_context().deadline().is_none());
    }

    #[test]
    fn test_toml() {
        let config = OdmConfig::from_toml_str("default_database = \"crm\"").unwrap();
        assert_eq!(config.default_database(), Some("crm"));
        assert_eq!(config.query_timeout(), None);

        let err = OdmConfig::from_toml_str("query_timeout_ms = \"soon\"").unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_from_env() {
        // SAFETY: only this test touches these variables.
        unsafe {
            env::set_var(DEFAULT_DATABASE_VAR, "envdb");
            env::set_var(QUERY_TIMEOUT_VAR, "1500");
        }
        let config = OdmConfig::from_env().unwrap();
        assert_eq!(config.default_database(), Some("envdb"));
        assert_eq!(config.query_timeout(), Some(Duration::from_millis(1500)));

        unsafe {
            env::set_var(QUERY_TIMEOUT_VAR, "later");
        }
        assert!(OdmConfig::from_env().is_err());

        unsafe {
            env::remove_var(DEFAULT_DATABASE_VAR);
            env::remove_var(QUERY_TIMEOUT_VAR);
        }
    }
}
