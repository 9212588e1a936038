//! [`Driver`] implementation backed by the official MongoDB driver.

use async_trait::async_trait;
use bson::{Bson, Document};
use docmap::{Driver, ForwardCursor, Namespace, OdmResult};
use mongodb::Cursor;
use tracing::{debug, trace};

use crate::client::MongoClient;
use crate::error::MongoError;

/// MongoDB driver for docmap.
#[derive(Clone)]
pub struct MongoDriver {
    client: MongoClient,
}

impl MongoDriver {
    /// Create a driver over an existing client.
    pub fn new(client: MongoClient) -> Self {
        Self { client }
    }

    /// Get a reference to the client.
    pub fn client(&self) -> &MongoClient {
        &self.client
    }
}

#[async_trait]
impl Driver for MongoDriver {
    async fn find(
        &self,
        namespace: &Namespace,
        filter: Document,
    ) -> OdmResult<Box<dyn ForwardCursor>> {
        debug!(namespace = %namespace, filter = %filter, "Executing find");

        let cursor = self
            .client
            .collection(namespace)
            .find(filter, None)
            .await
            .map_err(MongoError::from)?;

        Ok(Box::new(MongoCursor::new(cursor)))
    }

    async fn insert_one(&self, namespace: &Namespace, document: Document) -> OdmResult<Bson> {
        debug!(namespace = %namespace, "Executing insert_one");

        let result = self
            .client
            .collection(namespace)
            .insert_one(document, None)
            .await
            .map_err(MongoError::from)?;

        Ok(result.inserted_id)
    }

    async fn update_one(
        &self,
        namespace: &Namespace,
        filter: Document,
        update: Document,
    ) -> OdmResult<()> {
        debug!(namespace = %namespace, filter = %filter, update = %update, "Executing update_one");

        let result = self
            .client
            .collection(namespace)
            .update_one(filter, update, None)
            .await
            .map_err(MongoError::from)?;

        trace!(
            matched = result.matched_count,
            modified = result.modified_count,
            "update_one finished"
        );
        Ok(())
    }
}

/// Forward cursor over a MongoDB server-side cursor.
///
/// Closing drops the driver cursor, which kills it on the server if it is not
/// exhausted yet.
pub struct MongoCursor {
    inner: Option<Cursor<Document>>,
}

impl MongoCursor {
    fn new(cursor: Cursor<Document>) -> Self {
        Self {
            inner: Some(cursor),
        }
    }

    fn open(&self) -> Result<&Cursor<Document>, MongoError> {
        self.inner
            .as_ref()
            .ok_or_else(|| MongoError::cursor("cursor is closed"))
    }
}

#[async_trait]
impl ForwardCursor for MongoCursor {
    async fn advance(&mut self) -> OdmResult<bool> {
        let cursor = self
            .inner
            .as_mut()
            .ok_or_else(|| MongoError::cursor("cursor is closed"))?;
        Ok(cursor.advance().await.map_err(MongoError::from)?)
    }

    fn current(&self) -> OdmResult<Document> {
        Ok(self
            .open()?
            .deserialize_current()
            .map_err(MongoError::from)?)
    }

    async fn close(&mut self) -> OdmResult<()> {
        if self.inner.take().is_some() {
            trace!("MongoDB cursor closed");
        }
        Ok(())
    }
}
