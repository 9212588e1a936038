//! Field resolution: document key names, exclusion, inline and omission rules.
//!
//! The `#[derive(Record)]` macro emits one [`FieldSpec`] per struct field. At first
//! use those specs are resolved into a [`RecordLayout`], the per-type descriptor table
//! the mapping engine walks instead of reflecting over the type at runtime.
//!
//! ```rust
//! use docmap::naming::{FieldSpec, RecordLayout, to_document_key};
//!
//! assert_eq!(to_document_key("createdAt"), "created_at");
//!
//! const FIELDS: &[FieldSpec] = &[
//!     FieldSpec::new("id").identity(),
//!     FieldSpec::new("display_name").rename("name"),
//!     FieldSpec::new("cache").skip(),
//! ];
//! let layout = RecordLayout::resolve("User", FIELDS).unwrap();
//! assert_eq!(layout.field(0).unwrap().key, "_id");
//! assert_eq!(layout.field(1).unwrap().key, "name");
//! assert!(layout.field(2).unwrap().excluded);
//! ```

use std::collections::HashSet;

use convert_case::{Case, Casing};

use crate::error::{OdmError, OdmResult};

/// Document key used for record identity.
pub const ID_KEY: &str = "_id";

/// Convert a declared field name into its default document key.
///
/// Keys are lowercase and underscore separated.
pub fn to_document_key(ident: &str) -> String {
    let ident = ident.strip_prefix("r#").unwrap_or(ident);
    ident.to_case(Case::Snake)
}

/// Convert a type name into its default collection name (snake case, pluralized).
pub fn to_collection_name(type_name: &str) -> String {
    pluralize(&type_name.to_case(Case::Snake))
}

fn pluralize(word: &str) -> String {
    if ["s", "x", "ch", "sh"].iter().any(|suffix| word.ends_with(suffix)) {
        return format!("{word}es");
    }
    if let Some(stem) = word.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) && !stem.is_empty() {
            return format!("{stem}ies");
        }
    }
    format!("{word}s")
}

/// Raw field declaration as written on the struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Rust identifier of the field.
    pub ident: &'static str,
    /// Explicit document key, if any.
    pub rename: Option<&'static str>,
    /// Field is excluded from mapping.
    pub skip: bool,
    /// Nested record's fields are promoted into the parent document.
    pub inline: bool,
    /// Omit the key when the value is zero or empty.
    pub omit_empty: bool,
    /// Write `null` instead of a zero or empty value.
    pub null_on_zero: bool,
    /// This field is the record identity (`_id`).
    pub identity: bool,
    /// The declared type is optional (`Option<T>`).
    pub nullable: bool,
}

impl FieldSpec {
    /// Create a field declaration with default rules for the given identifier.
    pub const fn new(ident: &'static str) -> Self {
        Self {
            ident,
            rename: None,
            skip: false,
            inline: false,
            omit_empty: false,
            null_on_zero: false,
            identity: false,
            nullable: false,
        }
    }

    /// Override the document key.
    pub const fn rename(mut self, key: &'static str) -> Self {
        self.rename = Some(key);
        self
    }

    /// Exclude the field from mapping.
    pub const fn skip(mut self) -> Self {
        self.skip = true;
        self
    }

    /// Promote the nested record's fields into the parent document.
    pub const fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    /// Omit the key when the value is zero.
    pub const fn omit_empty(mut self) -> Self {
        self.omit_empty = true;
        self
    }

    /// Replace zero values with `null`.
    pub const fn null_on_zero(mut self) -> Self {
        self.null_on_zero = true;
        self
    }

    /// Mark as the identity field.
    pub const fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    /// Mark the declared type as optional.
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Resolved mapping rules for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Position of the field in declaration order.
    pub index: usize,
    /// Rust identifier.
    pub ident: &'static str,
    /// Document key. Meaningless for inline fields.
    pub key: String,
    /// Field is not mapped at all.
    pub excluded: bool,
    /// `null` / absent is an observable state for this field.
    pub nullable: bool,
    /// Nested record fields are promoted to the parent level.
    pub inline: bool,
    /// Zero values are omitted.
    pub omit_empty: bool,
    /// Zero values are written as `null`.
    pub null_on_zero: bool,
    /// Identity field.
    pub identity: bool,
}

impl FieldDescriptor {
    /// Resolve a single field declaration.
    pub fn resolve(index: usize, spec: &FieldSpec) -> Self {
        let key = match (spec.rename, spec.identity) {
            (_, true) => ID_KEY.to_string(),
            (Some(name), false) => name.to_string(),
            (None, false) => to_document_key(spec.ident),
        };

        Self {
            index,
            ident: spec.ident,
            key,
            excluded: spec.skip,
            nullable: spec.nullable,
            inline: spec.inline && !spec.skip,
            omit_empty: spec.omit_empty,
            null_on_zero: spec.null_on_zero,
            identity: spec.identity,
        }
    }

    /// Whether this field produces its own key in the document.
    pub fn is_keyed(&self) -> bool {
        !self.excluded && !self.inline
    }
}

/// Descriptor table for one record type, built once per type.
#[derive(Debug, Clone)]
pub struct RecordLayout {
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
}

impl RecordLayout {
    /// Resolve every field of a record type.
    ///
    /// Fails when two mapped fields resolve to the same key, more than one field
    /// claims the identity, or the identity is renamed away from `_id`.
    pub fn resolve(type_name: &'static str, specs: &[FieldSpec]) -> OdmResult<Self> {
        if let Some(spec) = specs
            .iter()
            .find(|s| s.identity && s.rename.is_some_and(|name| name != ID_KEY))
        {
            return Err(OdmError::configuration(format!(
                "{type_name}.{}: the identity field is always stored as '{ID_KEY}'",
                spec.ident
            )));
        }

        let fields: Vec<FieldDescriptor> = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| FieldDescriptor::resolve(index, spec))
            .collect();

        let mut seen = HashSet::new();
        for field in fields.iter().filter(|f| f.is_keyed()) {
            if !seen.insert(field.key.as_str()) {
                return Err(OdmError::configuration(format!(
                    "{type_name}: document key '{}' is declared more than once",
                    field.key
                )));
            }
        }

        if fields.iter().filter(|f| f.identity && !f.excluded).count() > 1 {
            return Err(OdmError::configuration(format!(
                "{type_name}: more than one identity field"
            )));
        }

        if let Some(field) = fields.iter().find(|f| f.inline && f.identity) {
            return Err(OdmError::configuration(format!(
                "{type_name}.{}: an inline field cannot be the identity",
                field.ident
            )));
        }

        Ok(Self { type_name, fields })
    }

    /// Name of the record type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Field at a declaration index.
    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    /// Find a directly keyed field by document key.
    pub fn by_key(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.is_keyed() && f.key == key)
    }

    /// Inline fields, whose subfields live at this level.
    pub fn inline_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.inline)
    }

    /// The identity field, if declared.
    pub fn identity(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.identity && !f.excluded)
    }
}
