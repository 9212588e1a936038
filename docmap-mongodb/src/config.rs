//! MongoDB connection settings.
//!
//! Only what opening a client needs lives here. Query deadlines belong to
//! [`docmap::OdmConfig`], whose default database also seeds
//! [`MongoConfigBuilder::from_odm`].

use std::time::Duration;

use docmap::OdmConfig;
use mongodb::options::ClientOptions;

use crate::error::{MongoError, MongoResult};

const DEFAULT_URI: &str = "mongodb://localhost:27017";
const DEFAULT_APP_NAME: &str = "docmap";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const SCHEMES: [&str; 2] = ["mongodb://", "mongodb+srv://"];

/// Settings for opening a [`MongoClient`](crate::MongoClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoConfig {
    /// Connection string.
    pub uri: String,
    /// Database used for namespaces that name none.
    pub database: String,
    /// Application name reported to the server.
    pub app_name: Option<String>,
    /// How long to wait for a connection to open.
    pub connect_timeout: Option<Duration>,
}

impl MongoConfig {
    /// Settings for `database` at `uri`, with the default app name and timeout.
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            app_name: Some(DEFAULT_APP_NAME.to_string()),
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
        }
    }

    /// Start building settings.
    pub fn builder() -> MongoConfigBuilder {
        MongoConfigBuilder::default()
    }

    /// Parse the connection string and apply these settings on top of it.
    pub async fn to_client_options(&self) -> MongoResult<ClientOptions> {
        let mut options = ClientOptions::parse(&self.uri)
            .await
            .map_err(|e| MongoError::config(format!("failed to parse URI: {e}")))?;

        if let Some(app_name) = &self.app_name {
            options.app_name = Some(app_name.clone());
        }
        if let Some(timeout) = self.connect_timeout {
            options.connect_timeout = Some(timeout);
        }
        Ok(options)
    }
}

/// Builder for [`MongoConfig`].
#[derive(Debug, Default, Clone)]
pub struct MongoConfigBuilder {
    uri: Option<String>,
    database: Option<String>,
    app_name: Option<String>,
    connect_timeout: Option<Duration>,
}

impl MongoConfigBuilder {
    /// A builder whose database comes from the ODM's default database, if set.
    pub fn from_odm(config: &OdmConfig) -> Self {
        Self {
            database: config.default_database().map(str::to_string),
            ..Self::default()
        }
    }

    /// Set the connection string.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Set the default database.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Validate and build the settings.
    ///
    /// Fails when no database is named or the URI has no MongoDB scheme.
    pub fn build(self) -> MongoResult<MongoConfig> {
        let database = self
            .database
            .filter(|name| !name.is_empty())
            .ok_or_else(|| MongoError::config("database name is required"))?;
        let uri = self.uri.unwrap_or_else(|| DEFAULT_URI.to_string());
        if !SCHEMES.iter().any(|scheme| uri.starts_with(scheme)) {
            return Err(MongoError::config(format!(
                "URI must start with {}",
                SCHEMES.join(" or ")
            )));
        }

        let mut config = MongoConfig::new(uri, database);
        if self.app_name.is_some() {
            config.app_name = self.app_name;
        }
        if self.connect_timeout.is_some() {
            config.connect_timeout = self.connect_timeout;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builder_defaults() {
        let config = MongoConfig::builder().database("app").build().unwrap();
        assert_eq!(config, MongoConfig::new("mongodb://localhost:27017", "app"));
        assert_eq!(config.app_name.as_deref(), Some("docmap"));
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_builder_overrides() {
        let config = MongoConfig::builder()
            .uri("mongodb+srv://cluster.example.net")
            .database("billing")
            .app_name("invoicer")
            .connect_timeout(Duration::from_secs(2))
            .build()
            .unwrap();

        assert_eq!(config.uri, "mongodb+srv://cluster.example.net");
        assert_eq!(config.database, "billing");
        assert_eq!(config.app_name.as_deref(), Some("invoicer"));
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_database_from_odm_config() {
        let odm = OdmConfig::builder().default_database("crm").build();
        let config = MongoConfigBuilder::from_odm(&odm).build().unwrap();
        assert_eq!(config.database, "crm");

        let config = MongoConfigBuilder::from_odm(&odm)
            .database("audit")
            .build()
            .unwrap();
        assert_eq!(config.database, "audit");
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let result = MongoConfig::builder().uri("mongodb://localhost:27017").build();
        assert!(matches!(result, Err(MongoError::Config(_))));

        assert!(MongoConfig::builder().database("").build().is_err());

        let result = MongoConfig::builder()
            .uri("postgres://localhost")
            .database("app")
            .build();
        assert!(matches!(result, Err(MongoError::Config(_))));
    }
}
