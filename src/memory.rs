//! In-memory driver for tests and examples.
//!
//! Supports top-level equality and `$in` filters, `$set`/`$unset` updates and
//! generated `ObjectId` identities. Cursor open and release counts are recorded so
//! tests can check that every cursor is released exactly once.
//!
//! ```rust
//! use docmap::bson::doc;
//! use docmap::driver::{Driver, Namespace};
//! use docmap::memory::MemoryDriver;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let driver = MemoryDriver::new();
//! let ns = Namespace::new("users");
//! let id = driver.insert_one(&ns, doc! { "name": "Ada" }).await.unwrap();
//! assert_eq!(driver.documents(&ns)[0].get("_id"), Some(&id));
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::driver::{Driver, ForwardCursor, Namespace};
use crate::error::{OdmError, OdmResult};
use crate::naming::ID_KEY;

#[derive(Debug, Default)]
struct CursorStats {
    opened: AtomicUsize,
    released: AtomicUsize,
}

/// A driver backed by in-process collections.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    collections: RwLock<HashMap<Namespace, Vec<Document>>>,
    stats: Arc<CursorStats>,
    read_delay: Mutex<Option<Duration>>,
}

impl MemoryDriver {
    /// An empty driver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document as-is, without identity generation.
    pub fn seed(&self, namespace: &Namespace, document: Document) {
        self.collections
            .write()
            .entry(namespace.clone())
            .or_default()
            .push(document);
    }

    /// Copy of every document in a collection, in insertion order.
    #[must_use]
    pub fn documents(&self, namespace: &Namespace) -> Vec<Document> {
        self.collections
            .read()
            .get(namespace)
            .cloned()
            .unwrap_or_default()
    }

    /// Delay every cursor read, for timeout tests.
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        *self.read_delay.lock() = delay;
    }

    /// Number of cursors handed out by [`Driver::find`].
    #[must_use]
    pub fn cursors_opened(&self) -> usize {
        self.stats.opened.load(Ordering::SeqCst)
    }

    /// Number of cursors released, by close or by drop.
    #[must_use]
    pub fn cursors_released(&self) -> usize {
        self.stats.released.load(Ordering::SeqCst)
    }
}

fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| {
        let actual = doc.get(key);
        match expected {
            Bson::Document(op) if op.contains_key("$in") => match op.get_array("$in") {
                Ok(candidates) => actual.is_some_and(|value| candidates.contains(value)),
                Err(_) => false,
            },
            other => actual == Some(other),
        }
    })
}

fn apply_update(doc: &mut Document, update: &Document) -> OdmResult<()> {
    for (op, fields) in update {
        let Bson::Document(fields) = fields else {
            return Err(OdmError::driver(format!("{op} expects a document")));
        };
        match op.as_str() {
            "$set" => {
                for (key, value) in fields {
                    doc.insert(key.clone(), value.clone());
                }
            }
            "$unset" => {
                for key in fields.keys() {
                    doc.remove(key);
                }
            }
            other => {
                return Err(OdmError::driver(format!(
                    "unsupported update operator {other}"
                )));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn find(
        &self,
        namespace: &Namespace,
        filter: Document,
    ) -> OdmResult<Box<dyn ForwardCursor>> {
        let matched: VecDeque<Document> = self
            .collections
            .read()
            .get(namespace)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| matches_filter(doc, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        trace!(namespace = %namespace, matched = matched.len(), "memory cursor opened");

        Ok(Box::new(MemoryCursor {
            pending: matched,
            current: None,
            delay: *self.read_delay.lock(),
            stats: Arc::clone(&self.stats),
            closed: false,
        }))
    }

    async fn insert_one(&self, namespace: &Namespace, mut document: Document) -> OdmResult<Bson> {
        let id = match document.get(ID_KEY) {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                document.insert(ID_KEY, id.clone());
                id
            }
        };

        let mut collections = self.collections.write();
        let docs = collections.entry(namespace.clone()).or_default();
        if docs.iter().any(|doc| doc.get(ID_KEY) == Some(&id)) {
            return Err(OdmError::driver(format!(
                "duplicate key {id} in {namespace}"
            )));
        }
        docs.push(document);
        Ok(id)
    }

    async fn update_one(
        &self,
        namespace: &Namespace,
        filter: Document,
        update: Document,
    ) -> OdmResult<()> {
        let mut collections = self.collections.write();
        let target = collections
            .get_mut(namespace)
            .and_then(|docs| docs.iter_mut().find(|doc| matches_filter(doc, &filter)));

        match target {
            Some(doc) => apply_update(doc, &update),
            None => Ok(()),
        }
    }
}

struct MemoryCursor {
    pending: VecDeque<Document>,
    current: Option<Document>,
    delay: Option<Duration>,
    stats: Arc<CursorStats>,
    closed: bool,
}

impl MemoryCursor {
    fn mark_released(&mut self) {
        if !self.closed {
            self.closed = true;
            self.stats.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl ForwardCursor for MemoryCursor {
    async fn advance(&mut self) -> OdmResult<bool> {
        if self.closed {
            return Err(OdmError::driver("cursor is closed"));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.current = self.pending.pop_front();
        Ok(self.current.is_some())
    }

    fn current(&self) -> OdmResult<Document> {
        self.current
            .clone()
            .ok_or_else(|| OdmError::driver("cursor has no current document"))
    }

    async fn close(&mut self) -> OdmResult<()> {
        self.mark_released();
        Ok(())
    }
}

impl Drop for MemoryCursor {
    fn drop(&mut self) {
        self.mark_released();
    }
}
