//! Procedural macros for docmap.
//!
//! `#[derive(Record)]` generates the per-type field table docmap's mapping engine
//! walks, plus field accessors and the record's zero value. Nothing is resolved by
//! reflection at runtime.
//!
//! # Example
//!
//! ```rust,ignore
//! #[derive(docmap::Record)]
//! #[docmap(collection = "users")]
//! struct User {
//!     #[docmap(id)]
//!     id: ObjectId,
//!     #[docmap(name = "mail")]
//!     email: String,
//!     nickname: Option<String>,
//! }
//! ```

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod derive;

/// Derive macro for docmap records.
///
/// # Attributes
///
/// ## Struct-level
/// - `#[docmap(model = "Name")]` - Registered model name (default: the type name)
/// - `#[docmap(collection = "name")]` - Collection name (default: snake_case plural)
/// - `#[docmap(database = "name")]` - Database name
///
/// ## Field-level
/// - `#[docmap(id)]` - Identity field, always stored as `_id` (cannot be combined with `name`)
/// - `#[docmap(name = "key")]` - Document key (default: snake_case field name)
/// - `#[docmap(skip)]` - Not mapped; initialized with `Default` in the zero value
/// - `#[docmap(inline)]` - Promote the nested record's fields into this document
/// - `#[docmap(omit_empty)]` - Omit the key when the value is zero or empty
/// - `#[docmap(null)]` - Write `null` when the value is zero or empty
///
/// Every mapped field type must implement `FieldValue` and `ZeroValue`.
#[proc_macro_derive(Record, attributes(docmap))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive::derive_record_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
