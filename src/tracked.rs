//! Change tracking for loaded and newly created records.
//!
//! A [`Tracked`] record owns the snapshot taken when it was constructed or last
//! saved. Every change query maps the current state afresh and diffs it against that
//! snapshot, so nothing is cached across mutations.

use std::ops::{Deref, DerefMut};

use bson::{Bson, Document};
use tracing::trace;

use crate::diff::{diff_documents, value_at};
use crate::error::{OdmError, OdmResult};
use crate::mapping::{lookup_path, lookup_path_mut, to_document};
use crate::naming::ID_KEY;
use crate::record::Record;

/// A record paired with its last-known persisted state.
#[derive(Debug, Clone)]
pub struct Tracked<R: Record> {
    record: R,
    snapshot: Option<Document>,
    persisted: bool,
}

impl<R: Record> Tracked<R> {
    /// Wrap a record, snapshotting its current state.
    pub(crate) fn capture(record: R, persisted: bool) -> OdmResult<Self> {
        let snapshot = to_document(&record)?;
        Ok(Self {
            record,
            snapshot,
            persisted,
        })
    }

    /// Replace the snapshot with the current state after a successful save.
    pub(crate) fn mark_saved(&mut self) -> OdmResult<()> {
        self.snapshot = to_document(&self.record)?;
        self.persisted = true;
        trace!(record = R::model_options().name, "snapshot refreshed");
        Ok(())
    }

    /// The wrapped record.
    pub fn record(&self) -> &R {
        &self.record
    }

    /// Mutable access to the wrapped record.
    pub fn record_mut(&mut self) -> &mut R {
        &mut self.record
    }

    /// Unwrap, discarding the snapshot.
    pub fn into_inner(self) -> R {
        self.record
    }

    /// Whether the record has been loaded from or saved to the store.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// The snapshot taken at construction or the last save.
    pub fn snapshot(&self) -> Option<&Document> {
        self.snapshot.as_ref()
    }

    /// Map the current state.
    pub fn to_document(&self) -> OdmResult<Option<Document>> {
        to_document(&self.record)
    }

    /// Changes since the snapshot, or `None` when there are none.
    ///
    /// A key mapped to `null` was cleared or disappeared from the mapping.
    pub fn changes(&self) -> OdmResult<Option<Document>> {
        let current = self.to_document()?;
        Ok(diff_documents(self.snapshot.as_ref(), current.as_ref()))
    }

    /// Whether anything differs from the snapshot.
    pub fn is_changed(&self) -> OdmResult<bool> {
        Ok(self.changes()?.is_some())
    }

    /// The prior value of a field if it changed, otherwise its current value.
    ///
    /// Returns `(snapshot_value, true)` when the value at `key` differs from the
    /// snapshot and `(current_value, false)` when it does not. `key` may be a dotted
    /// path into embedded records.
    pub fn was(&self, key: &str) -> OdmResult<(Bson, bool)> {
        let current = self.to_document()?;
        let before = value_at(self.snapshot.as_ref(), key);
        let now = value_at(current.as_ref(), key);

        if before != now {
            return Ok((before.cloned().unwrap_or(Bson::Null), true));
        }
        Ok((self.get_field(key)?, false))
    }

    /// Update document for the changes: `$set` for changed or new keys and `$unset`
    /// for keys no longer present in the mapping. `None` when nothing changed.
    pub fn update_document(&self) -> OdmResult<Option<Document>> {
        let current = self.to_document()?;
        let Some(changes) = diff_documents(self.snapshot.as_ref(), current.as_ref()) else {
            return Ok(None);
        };

        let mut set = Document::new();
        let mut unset = Document::new();
        for (key, value) in changes {
            if current.as_ref().is_some_and(|doc| doc.contains_key(&key)) {
                set.insert(key, value);
            } else {
                unset.insert(key, "");
            }
        }

        let mut update = Document::new();
        if !set.is_empty() {
            update.insert("$set", set);
        }
        if !unset.is_empty() {
            update.insert("$unset", unset);
        }
        Ok(Some(update))
    }

    /// Read a field by document key. Dotted paths reach into embedded records.
    pub fn get_field(&self, path: &str) -> OdmResult<Bson> {
        let segments: Vec<&str> = path.split('.').collect();
        match lookup_path(&self.record, &segments)? {
            Some(value) => value.to_bson().map_err(|e| e.within(path)),
            None => Err(OdmError::field_not_found(path)),
        }
    }

    /// Write a field by document key. Dotted paths reach into embedded records.
    pub fn set_field(&mut self, path: &str, value: impl Into<Bson>) -> OdmResult<()> {
        let segments: Vec<&str> = path.split('.').collect();
        let value = value.into();
        match lookup_path_mut(&mut self.record, &segments)? {
            Some(field) => {
                field.apply_bson(&value).map_err(|e| e.within(path))?;
                Ok(())
            }
            None => Err(OdmError::field_not_found(path)),
        }
    }

    /// The current identity value.
    pub fn id(&self) -> OdmResult<Bson> {
        let layout = R::layout()?;
        let field = layout
            .identity()
            .ok_or_else(|| OdmError::field_not_found(ID_KEY))?;
        self.record
            .field(field.index)
            .ok_or_else(|| OdmError::field_not_found(ID_KEY))?
            .to_bson()
    }

    /// Whether the identity field is unset (zero).
    pub fn has_zero_id(&self) -> OdmResult<bool> {
        let layout = R::layout()?;
        Ok(layout
            .identity()
            .and_then(|field| self.record.field(field.index))
            .is_none_or(|value| value.is_zero()))
    }

    /// Filter selecting this record by identity.
    pub fn id_filter(&self) -> OdmResult<Document> {
        let mut filter = Document::new();
        filter.insert(ID_KEY, self.id()?);
        Ok(filter)
    }
}

impl<R: Record> Deref for Tracked<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.record
    }
}

impl<R: Record> DerefMut for Tracked<R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use bson::oid::ObjectId;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq, crate::Record)]
    struct Address {
        city: String,
    }

    #[derive(Debug, Clone, PartialEq, crate::Record)]
    struct Account {
        #[docmap(id)]
        id: ObjectId,
        email: String,
        nickname: Option<String>,
        #[docmap(omit_empty)]
        bio: String,
        address: Address,
        balance: u64,
    }

    fn loaded() -> Tracked<Account> {
        let account = Account {
            id: ObjectId::new(),
            email: "a@example.com".into(),
            nickname: Some("al".into()),
            bio: "hello".into(),
            address: Address {
                city: "Oslo".into(),
            },
            balance: 10,
        };
        Tracked::capture(account, true).unwrap()
    }

    #[test]
    fn test_fresh_record_is_unchanged() {
        let account = loaded();
        assert!(!account.is_changed().unwrap());
        assert_eq!(account.changes().unwrap(), None);
        assert_eq!(account.update_document().unwrap(), None);
    }

    #[test]
    fn test_single_change() {
        let mut account = loaded();
        account.email = "b@example.com".into();

        assert_eq!(
            account.changes().unwrap(),
            Some(doc! { "email": "b@example.com" })
        );
        assert_eq!(
            account.was("email").unwrap(),
            (Bson::String("a@example.com".into()), true)
        );

        account.email = "a@example.com".into();
        assert!(!account.is_changed().unwrap());
        assert_eq!(
            account.was("email").unwrap(),
            (Bson::String("a@example.com".into()), false)
        );
    }

    #[test]
    fn test_clearing_optional_is_an_unset_signal() {
        let mut account = loaded();
        account.nickname = None;

        assert_eq!(account.changes().unwrap(), Some(doc! { "nickname": null }));
        assert_eq!(
            account.was("nickname").unwrap(),
            (Bson::String("al".into()), true)
        );
        // Still mapped (as null), so it is written rather than unset.
        assert_eq!(
            account.update_document().unwrap(),
            Some(doc! { "$set": { "nickname": null } })
        );
    }

    #[test]
    fn test_omitted_key_becomes_unset() {
        let mut account = loaded();
        account.bio.clear();
        account.balance = 11;

        assert_eq!(
            account.update_document().unwrap(),
            Some(doc! {
                "$set": { "balance": "11" },
                "$unset": { "bio": "" },
            })
        );
    }

    #[test]
    fn test_dotted_paths() {
        let mut account = loaded();
        assert_eq!(
            account.get_field("address.city").unwrap(),
            Bson::String("Oslo".into())
        );

        account.set_field("address.city", "Bergen").unwrap();
        assert_eq!(account.address.city, "Bergen");
        assert_eq!(
            account.was("address.city").unwrap(),
            (Bson::String("Oslo".into()), true)
        );
        assert_eq!(
            account.changes().unwrap(),
            Some(doc! { "address": { "city": "Bergen" } })
        );
    }

    #[test]
    fn test_unknown_field_is_data_error() {
        let mut account = loaded();
        let err = account.get_field("missing").unwrap_err();
        assert!(err.is_field_not_found());

        let err = account.set_field("address.zip", 1).unwrap_err();
        assert!(err.is_field_not_found());
        assert!(!err.is_fatal());

        assert!(account.was("missing").unwrap_err().is_field_not_found());
    }

    #[test]
    fn test_identity() {
        let mut account = loaded();
        assert!(!account.has_zero_id().unwrap());
        let id = account.id;
        assert_eq!(account.id().unwrap(), Bson::ObjectId(id));
        assert_eq!(account.id_filter().unwrap(), doc! { "_id": id });

        account.set_field("_id", ObjectId::from_bytes([0; 12])).unwrap();
        assert!(account.has_zero_id().unwrap());
    }

    #[test]
    fn test_mark_saved_replaces_snapshot() {
        let mut account = Tracked::capture(loaded().into_inner(), false).unwrap();
        assert!(!account.is_persisted());

        account.balance = 99;
        assert!(account.is_changed().unwrap());
        account.mark_saved().unwrap();

        assert!(account.is_persisted());
        assert!(!account.is_changed().unwrap());
        assert_eq!(
            account.snapshot().unwrap().get_str("balance").unwrap(),
            "99"
        );
    }
}
