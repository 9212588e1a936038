//! MongoDB client wrapper resolving docmap namespaces to collections.

use std::sync::Arc;
use std::time::Duration;

use bson::{Document, doc};
use docmap::{Namespace, OdmConfig};
use mongodb::{Client, Collection, Database};
use tracing::info;

use crate::config::{MongoConfig, MongoConfigBuilder};
use crate::error::{MongoError, MongoResult};

/// A MongoDB client bound to a default database.
///
/// Namespaces that name no database resolve against the configured default.
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    database: Database,
    config: Arc<MongoConfig>,
}

impl MongoClient {
    /// Create a new client from configuration.
    pub async fn new(config: MongoConfig) -> MongoResult<Self> {
        let options = config.to_client_options().await?;

        let client = Client::with_options(options)
            .map_err(|e| MongoError::connection(format!("failed to create client: {e}")))?;

        let database = client.database(&config.database);

        info!(
            uri = %config.uri,
            database = %config.database,
            "MongoDB client created"
        );

        Ok(Self {
            client,
            database,
            config: Arc::new(config),
        })
    }

    /// Create a builder for the client.
    pub fn builder() -> MongoClientBuilder {
        MongoClientBuilder::new()
    }

    /// The default database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// The collection a namespace resolves to.
    pub fn collection(&self, namespace: &Namespace) -> Collection<Document> {
        match &namespace.database {
            Some(name) => self.client.database(name).collection(&namespace.collection),
            None => self.database.collection(&namespace.collection),
        }
    }

    /// Get the underlying MongoDB client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the configuration.
    pub fn config(&self) -> &MongoConfig {
        &self.config
    }

    /// Check if the client is healthy by pinging the server.
    pub async fn is_healthy(&self) -> bool {
        self.database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .is_ok()
    }
}

/// Builder for [`MongoClient`].
#[derive(Debug, Default)]
pub struct MongoClientBuilder {
    config: MongoConfigBuilder,
}

impl MongoClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the ODM's default database.
    pub fn from_odm(config: &OdmConfig) -> Self {
        Self {
            config: MongoConfigBuilder::from_odm(config),
        }
    }

    /// Set the MongoDB URI.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.config = self.config.uri(uri);
        self
    }

    /// Set the default database name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.config = self.config.database(database);
        self
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.config = self.config.app_name(name);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.config = self.config.connect_timeout(duration);
        self
    }

    /// The configuration this builder describes.
    pub fn to_config(&self) -> MongoResult<MongoConfig> {
        self.config.clone().build()
    }

    /// Build the client.
    pub async fn build(self) -> MongoResult<MongoClient> {
        MongoClient::new(self.config.build()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builder_to_config() {
        let config = MongoClient::builder()
            .uri("mongodb://db.internal:27017")
            .database("app")
            .connect_timeout(Duration::from_secs(3))
            .to_config()
            .unwrap();

        assert_eq!(config.uri, "mongodb://db.internal:27017");
        assert_eq!(config.database, "app");
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_builder_requires_database() {
        let err = MongoClient::builder().to_config().unwrap_err();
        assert!(matches!(err, MongoError::Config(_)));

        let odm = OdmConfig::builder().default_database("crm").build();
        let config = MongoClientBuilder::from_odm(&odm).to_config().unwrap();
        assert_eq!(config.database, "crm");
    }
}
