//! Model registration and the process-wide model registry.
//!
//! A [`Model`] captures everything docmap needs to know about one record type:
//! its names and the default document taken from the example instance supplied at
//! registration. The [`ModelRegistry`] is built once at startup and only read
//! afterwards.
//!
//! ```rust
//! use docmap::Record;
//! use docmap::bson::oid::ObjectId;
//! use docmap::model::ModelRegistry;
//! use docmap::value::ZeroValue;
//!
//! #[derive(Debug, Clone, PartialEq, Record)]
//! struct BlogPost {
//!     #[docmap(id)]
//!     id: ObjectId,
//!     title: String,
//!     views: i64,
//! }
//!
//! let registry = ModelRegistry::builder()
//!     .register(BlogPost { title: "untitled".into(), ..BlogPost::zero() })
//!     .unwrap()
//!     .build();
//!
//! let model = registry.model::<BlogPost>().unwrap();
//! assert_eq!(model.collection_name(), "blog_posts");
//!
//! let post = model.new_record().unwrap();
//! assert_eq!(post.title, "untitled");
//! ```

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use bson::Document;
use tracing::{debug, info};

use crate::error::{OdmError, OdmResult};
use crate::mapping::{apply_document, to_document};
use crate::naming::to_collection_name;
use crate::record::Record;
use crate::tracked::Tracked;

/// Registration data for one record type.
pub struct Model<R: Record> {
    name: String,
    full_name: &'static str,
    collection: String,
    database: Option<String>,
    defaults: Document,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Model<R> {
    /// Register a record type, capturing the example instance as the default value.
    ///
    /// Mapping the example validates the type's declarations, so inline and layout
    /// errors surface here.
    pub fn new(example: &R) -> OdmResult<Self> {
        let layout = R::layout()?;
        let options = R::model_options();
        let defaults = to_document(example)?.unwrap_or_default();

        let model = Self {
            name: options.name.to_string(),
            full_name: type_name::<R>(),
            collection: options
                .collection
                .map(str::to_string)
                .unwrap_or_else(|| to_collection_name(layout.type_name())),
            database: options.database.map(str::to_string),
            defaults,
            _record: PhantomData,
        };

        debug!(
            model = %model.name,
            collection = %model.collection,
            fields = layout.fields().len(),
            "model registered"
        );
        Ok(model)
    }

    /// Override the model name.
    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override the collection name.
    pub fn with_collection_name(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Override the database name.
    pub fn with_database_name(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Registered model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully qualified Rust type name.
    pub fn full_name(&self) -> &'static str {
        self.full_name
    }

    /// Collection the records live in.
    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    /// Database override, if any.
    pub fn database_name(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// The default document captured at registration.
    pub fn default_document(&self) -> &Document {
        &self.defaults
    }

    /// Build a record seeded from the defaults.
    fn seeded(&self) -> OdmResult<R> {
        let mut record = R::zero();
        // Applying clones each value out of the captured defaults.
        apply_document(&mut record, &self.defaults)?;
        Ok(record)
    }

    /// A new, unsaved record starting from the registered defaults.
    pub fn new_record(&self) -> OdmResult<Tracked<R>> {
        let record = self.seeded()?;
        debug!(model = %self.name, "new record");
        Tracked::capture(record, false)
    }

    /// A persisted record built from a stored document.
    ///
    /// Starts from the zero record, not the defaults: a key missing from `doc` was
    /// saved as zero (or never mapped), so it must load as zero.
    pub fn hydrate(&self, doc: &Document) -> OdmResult<Tracked<R>> {
        let mut record = R::zero();
        apply_document(&mut record, doc)?;
        Tracked::capture(record, true)
    }
}

impl<R: Record> std::fmt::Debug for Model<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("full_name", &self.full_name)
            .field("collection", &self.collection)
            .field("database", &self.database)
            .finish()
    }
}

/// Type-erased summary of a registered model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Registered model name.
    pub name: String,
    /// Fully qualified Rust type name.
    pub full_name: &'static str,
    /// Collection name.
    pub collection: String,
    /// Database override.
    pub database: Option<String>,
}

struct Entry {
    model: Arc<dyn Any + Send + Sync>,
    info: ModelInfo,
}

/// Registry of every model, keyed by Rust type and by model name.
pub struct ModelRegistry {
    by_type: HashMap<TypeId, Entry>,
    by_name: HashMap<String, TypeId>,
}

impl ModelRegistry {
    /// Start building a registry.
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::default()
    }

    /// The model for a record type.
    pub fn model<R: Record>(&self) -> OdmResult<Arc<Model<R>>> {
        self.by_type
            .get(&TypeId::of::<R>())
            .and_then(|entry| Arc::clone(&entry.model).downcast::<Model<R>>().ok())
            .ok_or_else(|| {
                OdmError::configuration(format!("model {} is not registered", type_name::<R>()))
            })
    }

    /// Summary of a model by name.
    pub fn info(&self, name: &str) -> Option<&ModelInfo> {
        self.by_name
            .get(name)
            .and_then(|id| self.by_type.get(id))
            .map(|entry| &entry.info)
    }

    /// Summary of a model by record type.
    pub fn info_of<R: Record>(&self) -> Option<&ModelInfo> {
        self.by_type.get(&TypeId::of::<R>()).map(|entry| &entry.info)
    }

    /// Whether a model name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Registered model names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    /// Whether no model is registered.
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.names())
            .finish()
    }
}

/// Builder for [`ModelRegistry`].
#[derive(Default)]
pub struct ModelRegistryBuilder {
    by_type: HashMap<TypeId, Entry>,
    by_name: HashMap<String, TypeId>,
}

impl ModelRegistryBuilder {
    /// Register a record type from an example instance.
    pub fn register<R: Record>(self, example: R) -> OdmResult<Self> {
        self.register_model(Model::new(&example)?)
    }

    /// Register a prepared model, such as one with overridden names.
    pub fn register_model<R: Record>(mut self, model: Model<R>) -> OdmResult<Self> {
        let type_id = TypeId::of::<R>();
        if self.by_name.contains_key(model.name()) {
            return Err(OdmError::configuration(format!(
                "model name '{}' is already registered",
                model.name()
            )));
        }
        if self.by_type.contains_key(&type_id) {
            return Err(OdmError::configuration(format!(
                "{} is already registered",
                model.full_name()
            )));
        }

        let info = ModelInfo {
            name: model.name().to_string(),
            full_name: model.full_name(),
            collection: model.collection_name().to_string(),
            database: model.database_name().map(str::to_string),
        };
        self.by_name.insert(info.name.clone(), type_id);
        self.by_type.insert(
            type_id,
            Entry {
                model: Arc::new(model),
                info,
            },
        );
        Ok(self)
    }

    /// Freeze the registry.
    pub fn build(self) -> ModelRegistry {
        info!(models = self.by_type.len(), "model registry built");
        ModelRegistry {
            by_type: self.by_type,
            by_name: self.by_name,
        }
    }
}

impl std::fmt::Debug for ModelRegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ModelRegistryBuilder")
            .field("models", &names)
            .finish()
    }
}
