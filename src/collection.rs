//! Typed collection handles: queries and saves for one record type.

use std::sync::Arc;
use std::time::Duration;

use bson::{Bson, Document, doc};
use futures::future::BoxFuture;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::OdmConfig;
use crate::context::QueryContext;
use crate::driver::{Driver, Namespace};
use crate::error::{OdmError, OdmResult};
use crate::model::{Model, ModelRegistry};
use crate::naming::ID_KEY;
use crate::record::Record;
use crate::result::ResultSet;
use crate::tracked::Tracked;

/// Entry point tying a driver to a model registry.
#[derive(Clone)]
pub struct Odm {
    driver: Arc<dyn Driver>,
    registry: Arc<ModelRegistry>,
    config: Arc<OdmConfig>,
}

impl Odm {
    /// Create an ODM with default configuration.
    pub fn new(driver: Arc<dyn Driver>, registry: ModelRegistry) -> Self {
        Self {
            driver,
            registry: Arc::new(registry),
            config: Arc::new(OdmConfig::default()),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: OdmConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// The model registry.
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// The configuration.
    pub fn config(&self) -> &OdmConfig {
        &self.config
    }

    /// Handle for a registered record type.
    pub fn collection<R: Record>(&self) -> OdmResult<Collection<R>> {
        let model = self.registry.model::<R>()?;
        let mut namespace = Namespace::new(model.collection_name());
        namespace.database = model
            .database_name()
            .or(self.config.default_database())
            .map(str::to_string);

        Ok(Collection {
            driver: Arc::clone(&self.driver),
            model,
            namespace,
            config: Arc::clone(&self.config),
        })
    }
}

impl std::fmt::Debug for Odm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Odm")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Build the identity filter for `find`.
///
/// No ids selects everything, one id uses equality and several use `$in`.
pub fn id_filter<I, V>(ids: I) -> Document
where
    I: IntoIterator<Item = V>,
    V: Into<Bson>,
{
    let mut ids: Vec<Bson> = ids.into_iter().map(Into::into).collect();
    match ids.len() {
        0 => Document::new(),
        1 => {
            let mut filter = Document::new();
            filter.insert(ID_KEY, ids.remove(0));
            filter
        }
        _ => {
            let mut filter = Document::new();
            filter.insert(ID_KEY, doc! { "$in": ids });
            filter
        }
    }
}

/// Queries and saves for one record type.
pub struct Collection<R: Record> {
    driver: Arc<dyn Driver>,
    model: Arc<Model<R>>,
    namespace: Namespace,
    config: Arc<OdmConfig>,
}

impl<R: Record> Collection<R> {
    /// The model backing this collection.
    pub fn model(&self) -> &Model<R> {
        &self.model
    }

    /// Where the records are stored.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// A new, unsaved record seeded from the model's defaults.
    pub fn new_record(&self) -> OdmResult<Tracked<R>> {
        self.model.new_record()
    }

    /// Records by identity. No ids selects every record.
    pub async fn find<I, V>(&self, ids: I) -> OdmResult<ResultSet<R>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.find_where(id_filter(ids)).await
    }

    /// Every record in the collection.
    pub async fn find_all(&self) -> OdmResult<ResultSet<R>> {
        self.find_where(Document::new()).await
    }

    /// Records matching a driver filter, under the default context.
    pub async fn find_where(&self, filter: Document) -> OdmResult<ResultSet<R>> {
        self.find_with(filter, self.config.default_context()).await
    }

    /// Records matching a driver filter, under an explicit context.
    pub async fn find_with(
        &self,
        filter: Document,
        context: QueryContext,
    ) -> OdmResult<ResultSet<R>> {
        debug!(namespace = %self.namespace, filter = %filter, "find");
        let cursor = context
            .run(self.driver.find(&self.namespace, filter))
            .await?;
        Ok(ResultSet::new(
            Arc::clone(&self.model),
            self.namespace.clone(),
            cursor,
            context,
        ))
    }

    /// Records by identity, failing reads that outlast `timeout`.
    pub async fn find_by_timeout<I, V>(&self, timeout: Duration, ids: I) -> OdmResult<ResultSet<R>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.find_with(id_filter(ids), QueryContext::new().with_timeout(timeout))
            .await
    }

    /// Records by identity, failing reads that complete after `deadline`.
    pub async fn find_by_deadline<I, V>(&self, deadline: Instant, ids: I) -> OdmResult<ResultSet<R>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.find_with(id_filter(ids), QueryContext::new().with_deadline(deadline))
            .await
    }

    /// Run `f` against the matching records; the cursor is closed on every exit path.
    pub async fn find_scoped<T, F>(&self, filter: Document, f: F) -> OdmResult<T>
    where
        F: for<'a> FnOnce(&'a mut ResultSet<R>) -> BoxFuture<'a, OdmResult<T>>,
    {
        self.find_where(filter).await?.scoped(f).await
    }

    /// Insert a new record or update a persisted one.
    ///
    /// Inserting drops a zero identity so the store assigns one, then writes the
    /// assigned identity back. Updating sends only the changes and does nothing when
    /// there are none. The snapshot is refreshed after success.
    pub async fn save(&self, record: &mut Tracked<R>) -> OdmResult<()> {
        let context = self.config.default_context();

        if !record.is_persisted() {
            let mut document = record.to_document()?.unwrap_or_default();
            let zero_id = record.has_zero_id()?;
            if zero_id {
                document.remove(ID_KEY);
            }

            let id = context
                .run(self.driver.insert_one(&self.namespace, document))
                .await?;
            if zero_id && R::layout()?.identity().is_some() {
                record.set_field(ID_KEY, id.clone())?;
            }
            record.mark_saved()?;
            info!(namespace = %self.namespace, id = %id, "record inserted");
            return Ok(());
        }

        let Some(update) = record.update_document()? else {
            debug!(namespace = %self.namespace, "save skipped, no changes");
            return Ok(());
        };
        let filter = record.id_filter()?;
        if matches!(filter.get(ID_KEY), Some(Bson::Null) | None) {
            return Err(OdmError::usage("save", "persisted record has no identity"));
        }

        context
            .run(self.driver.update_one(&self.namespace, filter, update))
            .await?;
        record.mark_saved()?;
        info!(namespace = %self.namespace, "record updated");
        Ok(())
    }
}

impl<R: Record> std::fmt::Debug for Collection<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("model", &self.model.name())
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl<R: Record> Clone for Collection<R> {
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            model: Arc::clone(&self.model),
            namespace: self.namespace.clone(),
            config: Arc::clone(&self.config),
        }
    }
}
