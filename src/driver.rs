//! The contract docmap consumes from a document database driver.
//!
//! Drivers only need to find documents, insert one and update one. Everything else
//! (wire protocol, pooling, authentication, transactions) stays inside the driver.

use std::fmt;

use async_trait::async_trait;
use bson::{Bson, Document};

use crate::error::OdmResult;

/// Database and collection a query runs against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    /// Database name; `None` selects the driver's default database.
    pub database: Option<String>,
    /// Collection name.
    pub collection: String,
}

impl Namespace {
    /// Namespace in the driver's default database.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            database: None,
            collection: collection.into(),
        }
    }

    /// Set the database.
    pub fn in_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.database {
            Some(database) => write!(f, "{database}.{}", self.collection),
            None => f.write_str(&self.collection),
        }
    }
}

/// A document database driver.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Run a query and return a forward cursor over the matching documents.
    async fn find(&self, namespace: &Namespace, filter: Document)
    -> OdmResult<Box<dyn ForwardCursor>>;

    /// Insert one document, returning its identity (generated when absent).
    async fn insert_one(&self, namespace: &Namespace, document: Document) -> OdmResult<Bson>;

    /// Apply an update document to the first document matching `filter`.
    async fn update_one(
        &self,
        namespace: &Namespace,
        filter: Document,
        update: Document,
    ) -> OdmResult<()>;
}

/// A forward-only, server-side cursor.
///
/// The cursor must be closed exactly once. Dropping an unclosed cursor must release
/// its server resource as well.
#[async_trait]
pub trait ForwardCursor: Send {
    /// Move to the next document. `Ok(false)` once the cursor is exhausted.
    async fn advance(&mut self) -> OdmResult<bool>;

    /// Decode the document at the current position.
    fn current(&self) -> OdmResult<Document>;

    /// Release the server-side resource.
    async fn close(&mut self) -> OdmResult<()>;
}
