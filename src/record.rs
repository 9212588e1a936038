//! Record types: the per-type field table produced by `#[derive(Record)]`.
//!
//! ```rust
//! use docmap::Record;
//! use docmap::bson::oid::ObjectId;
//!
//! #[derive(Debug, Clone, PartialEq, Record)]
//! #[docmap(collection = "people")]
//! struct Person {
//!     #[docmap(id)]
//!     id: ObjectId,
//!     name: String,
//!     nickname: Option<String>,
//! }
//!
//! let layout = Person::layout().unwrap();
//! assert_eq!(layout.field(1).unwrap().key, "name");
//! ```

use std::sync::OnceLock;

use crate::error::{OdmError, OdmResult};
use crate::naming::{FieldSpec, RecordLayout};
use crate::value::{FieldValue, ZeroValue};

/// Model-level options declared on the struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelOptions {
    /// Registered model name. Defaults to the type's identifier.
    pub name: &'static str,
    /// Collection name override.
    pub collection: Option<&'static str>,
    /// Database name override.
    pub database: Option<&'static str>,
}

impl ModelOptions {
    /// Options with only a model name.
    pub const fn named(name: &'static str) -> Self {
        Self {
            name,
            collection: None,
            database: None,
        }
    }
}

/// A typed structure mapped to and from documents.
///
/// Implemented by `#[derive(Record)]`; the derive also implements [`FieldValue`] and
/// [`ZeroValue`] so records can nest inside other records, optionals and lists.
pub trait Record: FieldValue + ZeroValue + Send + Sync + 'static {
    /// The resolved field table for this type.
    fn layout() -> OdmResult<&'static RecordLayout>;

    /// Options from the struct-level `#[docmap(...)]` attribute.
    fn model_options() -> ModelOptions;

    /// Field at a declaration index. `None` for excluded fields.
    fn field(&self, index: usize) -> Option<&dyn FieldValue>;

    /// Mutable field at a declaration index. `None` for excluded fields.
    fn field_mut(&mut self, index: usize) -> Option<&mut dyn FieldValue>;
}

/// Object-safe view of a record, used by the mapping engine.
pub trait RecordFields {
    /// The resolved field table.
    fn record_layout(&self) -> OdmResult<&'static RecordLayout>;

    /// Field at a declaration index.
    fn field_at(&self, index: usize) -> Option<&dyn FieldValue>;

    /// Mutable field at a declaration index.
    fn field_at_mut(&mut self, index: usize) -> Option<&mut dyn FieldValue>;
}

impl<R: Record> RecordFields for R {
    fn record_layout(&self) -> OdmResult<&'static RecordLayout> {
        R::layout()
    }

    fn field_at(&self, index: usize) -> Option<&dyn FieldValue> {
        self.field(index)
    }

    fn field_at_mut(&mut self, index: usize) -> Option<&mut dyn FieldValue> {
        self.field_mut(index)
    }
}

/// Resolve a layout once and cache it in the type's own cell.
#[doc(hidden)]
pub fn cached_layout(
    cell: &'static OnceLock<Result<RecordLayout, String>>,
    type_name: &'static str,
    specs: &[FieldSpec],
) -> OdmResult<&'static RecordLayout> {
    cell.get_or_init(|| {
        tracing::trace!(record = type_name, fields = specs.len(), "resolving record layout");
        RecordLayout::resolve(type_name, specs).map_err(|e| e.to_string())
    })
    .as_ref()
    .map_err(|message| OdmError::configuration(message.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;

    #[derive(Debug, Clone, PartialEq, crate::Record)]
    #[docmap(model = "Member", database = "club")]
    struct Person {
        #[docmap(id)]
        id: ObjectId,
        first_name: String,
        #[docmap(skip)]
        scratch: Vec<u8>,
    }

    #[derive(Debug, crate::Record)]
    struct Clash {
        name: String,
        #[docmap(name = "name")]
        other: String,
    }

    #[test]
    fn test_generated_layout() {
        let layout = Person::layout().unwrap();
        assert_eq!(layout.type_name(), "Person");
        assert_eq!(layout.fields().len(), 3);
        assert_eq!(layout.identity().unwrap().key, "_id");
        assert_eq!(layout.field(1).unwrap().key, "first_name");
        assert!(layout.field(2).unwrap().excluded);
    }

    #[test]
    fn test_excluded_fields_have_no_accessor() {
        let person = Person::zero();
        assert!(person.field(0).is_some());
        assert!(person.field(2).is_none());
        assert!(person.field(9).is_none());
    }

    #[test]
    fn test_model_options() {
        let options = Person::model_options();
        assert_eq!(options.name, "Member");
        assert_eq!(options.collection, None);
        assert_eq!(options.database, Some("club"));
    }

    #[test]
    fn test_invalid_layout_is_configuration_error() {
        let err = Clash::layout().unwrap_err();
        assert!(err.is_configuration_error());
        // Cached failure is reported again on every access.
        assert!(Clash::layout().is_err());
    }
}
