//! Document diffing for change tracking.

use bson::{Bson, Document};

/// Compute the minimal set of top-level changes from `snapshot` to `current`.
///
/// - keys in both documents with different values map to the current value
/// - snapshot keys missing from `current` map to `null`
/// - keys only in `current` map to the current value
///
/// Returns `None` when nothing changed. Snapshot key order is kept, with new keys
/// appended in the order they appear in `current`.
pub fn diff_documents(snapshot: Option<&Document>, current: Option<&Document>) -> Option<Document> {
    let mut diff = Document::new();

    if let Some(snapshot) = snapshot {
        for (key, previous) in snapshot {
            match current.and_then(|doc| doc.get(key)) {
                Some(value) if value == previous => {}
                Some(value) => {
                    diff.insert(key.clone(), value.clone());
                }
                None => {
                    diff.insert(key.clone(), Bson::Null);
                }
            }
        }
    }

    if let Some(current) = current {
        for (key, value) in current {
            if !snapshot.is_some_and(|doc| doc.contains_key(key)) {
                diff.insert(key.clone(), value.clone());
            }
        }
    }

    (!diff.is_empty()).then_some(diff)
}

/// Follow a dotted path through nested documents.
pub(crate) fn value_at<'a>(doc: Option<&'a Document>, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut value = doc?.get(segments.next()?)?;
    for segment in segments {
        value = match value {
            Bson::Document(nested) => nested.get(segment)?,
            _ => return None,
        };
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_no_changes() {
        let doc = doc! { "a": 1, "b": { "c": true } };
        assert_eq!(diff_documents(Some(&doc), Some(&doc.clone())), None);
        assert_eq!(diff_documents(None, None), None);
    }

    #[test]
    fn test_changed_removed_added() {
        let snapshot = doc! { "a": 1, "b": "x", "c": [1, 2] };
        let current = doc! { "a": 2, "c": [1, 2], "d": null };
        assert_eq!(
            diff_documents(Some(&snapshot), Some(&current)),
            Some(doc! { "a": 2, "b": null, "d": null })
        );
    }

    #[test]
    fn test_numeric_width_is_a_change() {
        let snapshot = doc! { "n": 1 };
        let current = doc! { "n": 1i64 };
        assert!(diff_documents(Some(&snapshot), Some(&current)).is_some());
    }

    #[test]
    fn test_missing_sides() {
        let doc = doc! { "a": 1 };
        assert_eq!(diff_documents(None, Some(&doc)), Some(doc! { "a": 1 }));
        assert_eq!(diff_documents(Some(&doc), None), Some(doc! { "a": null }));
    }

    #[test]
    fn test_value_at() {
        let doc = doc! { "address": { "zip": 5 }, "name": "x" };
        assert_eq!(value_at(Some(&doc), "address.zip"), Some(&Bson::Int32(5)));
        assert_eq!(value_at(Some(&doc), "name.first"), None);
        assert_eq!(value_at(None, "name"), None);
    }
}
