//! The mapping engine: records to documents and back.
//!
//! Record → document walks the field table in declaration order. Excluded fields are
//! skipped, inlined records are merged into the parent document, embedded records
//! become sub-documents, lists are mapped element by element and scalars go through
//! the value converter. Zero values are kept unless the field asks for omission or
//! `null` replacement.
//!
//! Document → record is a partial apply: keys missing from the document leave the
//! field untouched. A nested record, embedded or inlined, is built on a fresh zero
//! instance and only assigned when at least one of its own fields was found.
//!
//! ```rust
//! use docmap::Record;
//! use docmap::bson::doc;
//! use docmap::mapping::{apply_document, to_document};
//! use docmap::value::ZeroValue;
//!
//! #[derive(Debug, Clone, PartialEq, Record)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! let doc = to_document(&Point { x: 1, y: 0 }).unwrap().unwrap();
//! assert_eq!(doc, doc! { "x": 1, "y": 0 });
//!
//! let mut point = Point::zero();
//! assert!(apply_document(&mut point, &doc! { "y": 7 }).unwrap());
//! assert_eq!(point, Point { x: 0, y: 7 });
//! ```

use bson::{Bson, Document};

use crate::error::{OdmError, OdmResult};
use crate::naming::FieldDescriptor;
use crate::record::{Record, RecordFields};
use crate::value::{FieldShape, FieldValue};

fn missing_accessor(type_name: &str, field: &FieldDescriptor) -> OdmError {
    OdmError::configuration(format!(
        "{type_name}.{}: no accessor for a mapped field",
        field.ident
    ))
}

/// Map a record into a document.
///
/// Returns `Ok(None)` when no field produced a key.
pub fn to_document(record: &dyn RecordFields) -> OdmResult<Option<Document>> {
    let layout = record.record_layout()?;
    let mut doc = Document::new();

    for field in layout.fields().iter().filter(|f| !f.excluded) {
        let value = record
            .field_at(field.index)
            .ok_or_else(|| missing_accessor(layout.type_name(), field))?;

        if field.inline {
            merge_inline(&mut doc, layout.type_name(), field, value)?;
            continue;
        }

        if value.is_zero() {
            if field.omit_empty {
                continue;
            }
            if field.null_on_zero {
                doc.insert(field.key.clone(), Bson::Null);
                continue;
            }
        }

        let stored = value.to_bson().map_err(|e| e.within(&field.key))?;
        doc.insert(field.key.clone(), stored);
    }

    Ok((!doc.is_empty()).then_some(doc))
}

fn merge_inline(
    doc: &mut Document,
    type_name: &str,
    field: &FieldDescriptor,
    value: &dyn FieldValue,
) -> OdmResult<()> {
    if value.shape() != FieldShape::Record {
        return Err(OdmError::configuration(format!(
            "{type_name}.{}: only record fields can be inlined",
            field.ident
        )));
    }

    // An empty optional inline record contributes no keys.
    let Some(nested) = value.as_record() else {
        return Ok(());
    };

    if let Some(promoted) = to_document(nested)? {
        for (key, stored) in promoted {
            doc.insert(key, stored);
        }
    }
    Ok(())
}

/// Apply a document onto a record.
///
/// Only keys present in `doc` are written. Returns whether any of the record's
/// fields were found.
pub fn apply_document(record: &mut dyn RecordFields, doc: &Document) -> OdmResult<bool> {
    let layout = record.record_layout()?;
    let mut found = false;

    for field in layout.fields().iter().filter(|f| !f.excluded) {
        let value = record
            .field_at_mut(field.index)
            .ok_or_else(|| missing_accessor(layout.type_name(), field))?;

        if field.inline {
            if value.shape() != FieldShape::Record {
                return Err(OdmError::configuration(format!(
                    "{}.{}: only record fields can be inlined",
                    layout.type_name(),
                    field.ident
                )));
            }
            found |= value.apply_inline(doc)?;
            continue;
        }

        let Some(stored) = doc.get(&field.key) else {
            continue;
        };
        value.apply_bson(stored).map_err(|e| e.within(&field.key))?;
        found = true;
    }

    Ok(found)
}

/// Map a single field value.
pub fn to_bson_value(value: &dyn FieldValue) -> OdmResult<Bson> {
    value.to_bson()
}

/// Apply a stored value onto a single field.
pub fn apply_bson_value(value: &mut dyn FieldValue, stored: &Bson) -> OdmResult<bool> {
    value.apply_bson(stored)
}

/// Whether every mapped field of a record holds its zero value.
pub fn is_zero_record(record: &dyn RecordFields) -> bool {
    let Ok(layout) = record.record_layout() else {
        return false;
    };
    layout
        .fields()
        .iter()
        .filter(|f| !f.excluded)
        .all(|f| record.field_at(f.index).is_none_or(|value| value.is_zero()))
}

/// Map a record stored under its own key.
///
/// A record that produces no keys is stored as an empty sub-document.
pub fn embed_record(record: &dyn RecordFields) -> OdmResult<Bson> {
    Ok(Bson::Document(to_document(record)?.unwrap_or_default()))
}

/// Apply a stored sub-document to an embedded record.
///
/// `null` resets the record to zero. A sub-document is applied to a fresh zero
/// instance, which replaces the target only if at least one field was found.
pub fn apply_embedded<R: Record>(target: &mut R, stored: &Bson) -> OdmResult<bool> {
    match stored {
        Bson::Null => {
            *target = R::zero();
            Ok(true)
        }
        Bson::Document(sub) => {
            let mut fresh = R::zero();
            let found = apply_document(&mut fresh, sub)?;
            if found {
                *target = fresh;
            }
            Ok(found)
        }
        other => Err(OdmError::conversion(
            "",
            format!(
                "expected a document for {}, found {:?}",
                R::layout()?.type_name(),
                other.element_type()
            ),
        )),
    }
}

/// Apply the parent document to an inlined record.
///
/// The record is replaced only if at least one of its own fields was found, so an
/// entirely absent inline record is left untouched.
pub fn apply_inlined<R: Record>(target: &mut R, parent: &Document) -> OdmResult<bool> {
    let mut fresh = R::zero();
    let found = apply_document(&mut fresh, parent)?;
    if found {
        *target = fresh;
    }
    Ok(found)
}

/// Resolve a dotted key path to a field value, searching inlined records too.
pub(crate) fn lookup_path<'a>(
    record: &'a dyn RecordFields,
    path: &[&str],
) -> OdmResult<Option<&'a dyn FieldValue>> {
    let Some((head, rest)) = path.split_first() else {
        return Ok(None);
    };
    let layout = record.record_layout()?;

    if let Some(field) = layout.by_key(head) {
        let Some(value) = record.field_at(field.index) else {
            return Ok(None);
        };
        if rest.is_empty() {
            return Ok(Some(value));
        }
        return match value.as_record() {
            Some(nested) => lookup_path(nested, rest),
            None => Ok(None),
        };
    }

    for field in layout.inline_fields() {
        if let Some(nested) = record.field_at(field.index).and_then(|v| v.as_record()) {
            if let Some(found) = lookup_path(nested, path)? {
                return Ok(Some(found));
            }
        }
    }
    Ok(None)
}

/// Mutable counterpart of [`lookup_path`].
pub(crate) fn lookup_path_mut<'a>(
    record: &'a mut dyn RecordFields,
    path: &[&str],
) -> OdmResult<Option<&'a mut dyn FieldValue>> {
    let Some((head, rest)) = path.split_first() else {
        return Ok(None);
    };
    let layout = record.record_layout()?;

    if let Some(field) = layout.by_key(head) {
        let Some(value) = record.field_at_mut(field.index) else {
            return Ok(None);
        };
        if rest.is_empty() {
            return Ok(Some(value));
        }
        return match value.as_record_mut() {
            Some(nested) => lookup_path_mut(nested, rest),
            None => Ok(None),
        };
    }

    // Find which inline field owns the path before borrowing it mutably.
    let mut owner = None;
    for field in layout.inline_fields() {
        if let Some(nested) = record.field_at(field.index).and_then(|v| v.as_record()) {
            if lookup_path(nested, path)?.is_some() {
                owner = Some(field.index);
                break;
            }
        }
    }

    match owner {
        Some(index) => match record.field_at_mut(index).and_then(|v| v.as_record_mut()) {
            Some(nested) => lookup_path_mut(nested, path),
            None => Ok(None),
        },
        None => Ok(None),
    }
}
