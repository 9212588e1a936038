//! Query results over a forward-only driver cursor.
//!
//! A [`ResultSet`] starts [`Fresh`](ResultState::Fresh). The first random-access call
//! (`at`, `first`, `last`, `count`, `one`) switches it to
//! [`RandomAccess`](ResultState::RandomAccess): every document read from the cursor is
//! kept in a lookback buffer so indexes can be revisited. Calling
//! [`streaming`](ResultSet::streaming) first switches it to
//! [`Streaming`](ResultState::Streaming) instead: documents are handed out once and
//! never buffered. The two modes are mutually exclusive.
//!
//! The driver cursor is released exactly once: when it reports exhaustion, on
//! [`close`](ResultSet::close), after a failed read, or when the result set is
//! dropped. Only exhaustion leaves the result complete. Once it was closed early or
//! a read failed, anything that needs another document from the cursor fails with a
//! usage error instead of reporting an empty result. Prefer
//! [`scoped`](ResultSet::scoped) (or `Collection::find_scoped`), which closes the
//! cursor on every exit path.

use std::sync::Arc;

use bson::Document;
use futures::future::BoxFuture;
use tracing::{debug, trace, warn};

use crate::context::QueryContext;
use crate::driver::{ForwardCursor, Namespace};
use crate::error::{OdmError, OdmResult};
use crate::model::Model;
use crate::record::Record;
use crate::tracked::Tracked;

/// Consumption mode of a [`ResultSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultState {
    /// Nothing read yet.
    Fresh,
    /// Reads are buffered for repeatable random access.
    RandomAccess,
    /// Single-pass reads, no buffering.
    Streaming,
}

/// Why the driver cursor was released.
#[derive(Debug, Clone, PartialEq, Eq)]
enum End {
    Exhausted,
    Closed,
    Failed(String),
}

/// Records matched by a query.
pub struct ResultSet<R: Record> {
    model: Arc<Model<R>>,
    namespace: Namespace,
    context: QueryContext,
    cursor: Option<Box<dyn ForwardCursor>>,
    lookback: Vec<Document>,
    end: Option<End>,
    state: ResultState,
    streamed: bool,
}

impl<R: Record> ResultSet<R> {
    /// Wrap an open driver cursor.
    pub fn new(
        model: Arc<Model<R>>,
        namespace: Namespace,
        cursor: Box<dyn ForwardCursor>,
        context: QueryContext,
    ) -> Self {
        debug!(namespace = %namespace, model = %model.name(), "cursor opened");
        Self {
            model,
            namespace,
            context,
            cursor: Some(cursor),
            lookback: Vec::new(),
            end: None,
            state: ResultState::Fresh,
            streamed: false,
        }
    }

    /// Current consumption mode.
    pub fn state(&self) -> ResultState {
        self.state
    }

    /// Whether the driver cursor has been released.
    pub fn is_released(&self) -> bool {
        self.cursor.is_none()
    }

    /// Whether every matching document has been read from the driver.
    pub fn is_exhausted(&self) -> bool {
        self.end == Some(End::Exhausted)
    }

    /// Switch to single-pass streaming. Only legal before any random-access read.
    pub fn streaming(&mut self) -> OdmResult<&mut Self> {
        match self.state {
            ResultState::RandomAccess => Err(OdmError::usage(
                "streaming",
                "random access has already been used on this result",
            )),
            ResultState::Fresh | ResultState::Streaming => {
                self.state = ResultState::Streaming;
                Ok(self)
            }
        }
    }

    fn random_access(&mut self, method: &'static str) -> OdmResult<()> {
        match self.state {
            ResultState::Streaming => Err(OdmError::usage(method, "result is in streaming mode")),
            ResultState::Fresh | ResultState::RandomAccess => {
                self.state = ResultState::RandomAccess;
                Ok(())
            }
        }
    }

    /// Pull the next raw document from the driver, releasing the cursor on exhaustion
    /// or failure.
    async fn read_next(&mut self, method: &'static str) -> OdmResult<Option<Document>> {
        match &self.end {
            None => {}
            Some(End::Exhausted) => return Ok(None),
            Some(End::Closed) => {
                return Err(OdmError::usage(method, "result was closed before it was exhausted"));
            }
            Some(End::Failed(cause)) => {
                return Err(OdmError::usage(
                    method,
                    format!("result is unusable after a failed read: {cause}"),
                ));
            }
        }
        let Some(cursor) = self.cursor.as_mut() else {
            return Err(OdmError::usage(method, "result cursor is already released"));
        };

        let step = match self.context.run(cursor.advance()).await {
            Ok(true) => cursor.current().map(Some),
            Ok(false) => Ok(None),
            Err(e) => Err(e),
        };

        match step {
            Ok(Some(doc)) => {
                trace!(namespace = %self.namespace, "document read");
                Ok(Some(doc))
            }
            Ok(None) => {
                self.end = Some(End::Exhausted);
                self.release().await?;
                Ok(None)
            }
            Err(e) => {
                debug!(namespace = %self.namespace, error = %e, "cursor read failed");
                self.end = Some(End::Failed(e.to_string()));
                if let Err(close_err) = self.release().await {
                    warn!(error = %close_err, "failed to close cursor after read error");
                }
                Err(e)
            }
        }
    }

    async fn fill(&mut self, method: &'static str) -> OdmResult<()> {
        while let Some(doc) = self.read_next(method).await? {
            self.lookback.push(doc);
        }
        Ok(())
    }

    /// Release the driver cursor. A second release is a no-op.
    async fn release(&mut self) -> OdmResult<()> {
        match self.cursor.take() {
            Some(mut cursor) => {
                debug!(
                    namespace = %self.namespace,
                    buffered = self.lookback.len(),
                    "cursor released"
                );
                cursor.close().await
            }
            None => Ok(()),
        }
    }

    /// The record at `index`, reading forward only as far as needed.
    pub async fn at(&mut self, index: usize) -> OdmResult<Tracked<R>> {
        self.random_access("at")?;
        while self.lookback.len() <= index {
            match self.read_next("at").await? {
                Some(doc) => self.lookback.push(doc),
                None => {
                    return Err(OdmError::IndexOutOfRange {
                        index,
                        len: self.lookback.len(),
                    });
                }
            }
        }
        self.model.hydrate(&self.lookback[index])
    }

    /// The first record. Consumes the whole cursor.
    pub async fn first(&mut self) -> OdmResult<Option<Tracked<R>>> {
        self.random_access("first")?;
        self.fill("first").await?;
        self.lookback
            .first()
            .map(|doc| self.model.hydrate(doc))
            .transpose()
    }

    /// The last record. Consumes the whole cursor.
    pub async fn last(&mut self) -> OdmResult<Option<Tracked<R>>> {
        self.random_access("last")?;
        self.fill("last").await?;
        self.lookback
            .last()
            .map(|doc| self.model.hydrate(doc))
            .transpose()
    }

    /// Number of records. Consumes the whole cursor.
    pub async fn count(&mut self) -> OdmResult<usize> {
        self.random_access("count")?;
        self.fill("count").await?;
        Ok(self.lookback.len())
    }

    /// The only record. Fails when there are none or more than one.
    pub async fn one(&mut self) -> OdmResult<Tracked<R>> {
        self.random_access("one")?;
        self.fill("one").await?;
        match self.lookback.as_slice() {
            [] => Err(OdmError::not_found(format!(
                "no {} matched in {}",
                self.model.name(),
                self.namespace
            ))),
            [doc] => self.model.hydrate(doc),
            many => Err(OdmError::UnexpectedResult { found: many.len() }),
        }
    }

    /// [`one`](Self::one), then close the result on every outcome.
    pub async fn one_and_close(mut self) -> OdmResult<Tracked<R>> {
        let record = self.one().await;
        let closed = self.close().await;
        let record = record?;
        closed?;
        Ok(record)
    }

    /// Visit every record in order.
    ///
    /// In streaming mode this is a single pass and the result cannot be iterated
    /// again. Otherwise the cursor is drained into the lookback buffer first.
    pub async fn for_each<F>(&mut self, mut f: F) -> OdmResult<()>
    where
        F: FnMut(Tracked<R>) -> OdmResult<()>,
    {
        if self.state != ResultState::Streaming {
            self.random_access("for_each")?;
            self.fill("for_each").await?;
            for doc in &self.lookback {
                f(self.model.hydrate(doc)?)?;
            }
            return Ok(());
        }

        self.begin_stream("for_each")?;
        while let Some(doc) = self.read_next("for_each").await? {
            if let Err(e) = self.model.hydrate(&doc).and_then(&mut f) {
                self.close().await?;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Materialize every record.
    pub async fn to_vec(&mut self) -> OdmResult<Vec<Tracked<R>>> {
        let mut records = Vec::new();
        self.for_each(|record| {
            records.push(record);
            Ok(())
        })
        .await?;
        Ok(records)
    }

    fn begin_stream(&mut self, method: &'static str) -> OdmResult<()> {
        if self.streamed {
            return Err(OdmError::usage(
                method,
                "streaming results can only be consumed once",
            ));
        }
        self.streamed = true;
        Ok(())
    }

    /// Release the driver cursor. Closing twice is a no-op.
    ///
    /// Records already buffered stay readable. Closing before exhaustion makes any
    /// later read that needs the cursor a usage error.
    pub async fn close(&mut self) -> OdmResult<()> {
        if self.end.is_none() {
            self.end = Some(End::Closed);
        }
        self.release().await
    }

    /// Run `f` against this result and close it afterwards, whatever `f` returns.
    ///
    /// ```rust,ignore
    /// let names = result
    ///     .scoped(|rs| Box::pin(async move { rs.count().await }))
    ///     .await?;
    /// ```
    pub async fn scoped<T, F>(mut self, f: F) -> OdmResult<T>
    where
        F: for<'a> FnOnce(&'a mut ResultSet<R>) -> BoxFuture<'a, OdmResult<T>>,
    {
        let outcome = f(&mut self).await;
        let closed = self.close().await;
        let value = outcome?;
        closed?;
        Ok(value)
    }
}

impl<R: Record> Drop for ResultSet<R> {
    fn drop(&mut self) {
        if self.cursor.take().is_some() {
            warn!(
                namespace = %self.namespace,
                "result dropped without being closed; releasing cursor"
            );
        }
    }
}

impl<R: Record> std::fmt::Debug for ResultSet<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("namespace", &self.namespace)
            .field("state", &self.state)
            .field("buffered", &self.lookback.len())
            .field("released", &self.is_released())
            .field("exhausted", &self.is_exhausted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Driver;
    use crate::memory::MemoryDriver;
    use bson::doc;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq, crate::Record)]
    struct Item {
        #[docmap(id)]
        id: i32,
        label: String,
    }

    async fn result_of(driver: &MemoryDriver, n: i32) -> ResultSet<Item> {
        let ns = Namespace::new("items");
        for id in 0..n {
            driver.seed(&ns, doc! { "_id": id, "label": format!("item-{id}") });
        }
        let model = Arc::new(Model::new(&Item { id: 0, label: String::new() }).unwrap());
        let cursor = driver.find(&ns, doc! {}).await.unwrap();
        ResultSet::new(model, ns, cursor, QueryContext::new())
    }

    #[tokio::test]
    async fn test_random_access() {
        let driver = MemoryDriver::new();
        let mut result = result_of(&driver, 3).await;

        assert_eq!(result.at(1).await.unwrap().label, "item-1");
        assert_eq!(result.at(0).await.unwrap().label, "item-0");
        assert_eq!(result.state(), ResultState::RandomAccess);
        assert!(!result.is_released());

        assert_eq!(result.count().await.unwrap(), 3);
        assert!(result.is_released());
        assert_eq!(result.last().await.unwrap().unwrap().id, 2);
        assert_eq!(result.to_vec().await.unwrap().len(), 3);
        assert_eq!(driver.cursors_released(), 1);
    }

    #[tokio::test]
    async fn test_at_past_end() {
        let driver = MemoryDriver::new();
        let mut result = result_of(&driver, 2).await;

        let err = result.at(2).await.unwrap_err();
        assert!(matches!(err, OdmError::IndexOutOfRange { index: 2, len: 2 }));
    }

    #[tokio::test]
    async fn test_one() {
        let driver = MemoryDriver::new();
        let mut empty = result_of(&driver, 0).await;
        assert!(empty.one().await.unwrap_err().is_not_found());
        assert!(empty.first().await.unwrap().is_none());

        let driver = MemoryDriver::new();
        let mut many = result_of(&driver, 2).await;
        assert!(matches!(
            many.one().await.unwrap_err(),
            OdmError::UnexpectedResult { found: 2 }
        ));

        let driver = MemoryDriver::new();
        let single = result_of(&driver, 1).await;
        assert_eq!(single.one_and_close().await.unwrap().label, "item-0");
        assert_eq!(driver.cursors_released(), 1);
    }

    #[tokio::test]
    async fn test_mode_exclusivity() {
        let driver = MemoryDriver::new();
        let mut result = result_of(&driver, 2).await;
        result.first().await.unwrap();
        assert!(result.streaming().unwrap_err().is_usage_error());

        let mut result = result_of(&driver, 2).await;
        result.streaming().unwrap();
        assert!(result.at(0).await.unwrap_err().is_usage_error());
        assert!(result.count().await.unwrap_err().is_usage_error());
        assert!(result.one().await.unwrap_err().is_usage_error());
        result.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_streaming_is_single_pass() {
        let driver = MemoryDriver::new();
        let mut result = result_of(&driver, 3).await;
        result.streaming().unwrap();

        let mut seen = Vec::new();
        result
            .for_each(|item| {
                seen.push(item.id);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(seen, vec![0, 1, 2]);
        assert!(result.is_released());

        assert!(result.to_vec().await.unwrap_err().is_usage_error());
    }

    #[tokio::test]
    async fn test_callback_error_releases_cursor() {
        let driver = MemoryDriver::new();
        let mut result = result_of(&driver, 3).await;
        result.streaming().unwrap();

        let err = result
            .for_each(|_| Err(OdmError::not_found("stop")))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(result.is_released());
        assert_eq!(driver.cursors_released(), 1);
    }

    #[tokio::test]
    async fn test_release_exactly_once() {
        let driver = MemoryDriver::new();
        let mut result = result_of(&driver, 1).await;
        result.close().await.unwrap();
        result.close().await.unwrap();
        drop(result);
        assert_eq!(driver.cursors_released(), 1);

        let result = result_of(&driver, 1).await;
        drop(result);
        assert_eq!(driver.cursors_released(), 2);
        assert_eq!(driver.cursors_opened(), 2);
    }

    #[tokio::test]
    async fn test_scoped_closes() {
        let driver = MemoryDriver::new();
        let result = result_of(&driver, 4).await;
        let first = result
            .scoped(|rs| Box::pin(async move { rs.at(0).await.map(|r| r.label.clone()) }))
            .await
            .unwrap();
        assert_eq!(first, "item-0");
        assert_eq!(driver.cursors_released(), 1);

        let result = result_of(&driver, 4).await;
        let err = result
            .scoped(|rs| Box::pin(async move { rs.at(10).await.map(|_| ()) }))
            .await
            .unwrap_err();
        assert!(err.is_index_out_of_range());
        assert_eq!(driver.cursors_released(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout() {
        let driver = MemoryDriver::new();
        let ns = Namespace::new("items");
        driver.seed(&ns, doc! { "_id": 1, "label": "slow" });
        driver.set_read_delay(Some(std::time::Duration::from_secs(5)));

        let model = Arc::new(Model::new(&Item { id: 0, label: String::new() }).unwrap());
        let cursor = driver.find(&ns, doc! {}).await.unwrap();
        let ctx = QueryContext::new().with_timeout(std::time::Duration::from_millis(50));
        let mut result = ResultSet::new(model, ns, cursor, ctx);

        let err = result.count().await.unwrap_err();
        assert!(err.is_timeout());
        assert!(result.is_released());
        assert!(!result.is_exhausted());

        let err = result.count().await.unwrap_err();
        assert!(err.is_usage_error());
        assert!(err.to_string().contains("timed out"));
        assert!(result.at(0).await.unwrap_err().is_usage_error());
        assert!(result.first().await.unwrap_err().is_usage_error());
    }

    #[tokio::test]
    async fn test_reads_after_early_close() {
        let driver = MemoryDriver::new();
        let mut result = result_of(&driver, 3).await;
        assert_eq!(result.at(0).await.unwrap().id, 0);
        result.close().await.unwrap();

        assert_eq!(result.at(0).await.unwrap().id, 0);
        assert!(result.count().await.unwrap_err().is_usage_error());
        assert!(result.at(1).await.unwrap_err().is_usage_error());
        assert!(result.one().await.unwrap_err().is_usage_error());
        assert_eq!(driver.cursors_released(), 1);
    }

    #[tokio::test]
    async fn test_close_after_exhaustion_keeps_results() {
        let driver = MemoryDriver::new();
        let mut result = result_of(&driver, 2).await;
        assert_eq!(result.count().await.unwrap(), 2);
        assert!(result.is_exhausted());
        result.close().await.unwrap();

        assert_eq!(result.count().await.unwrap(), 2);
        assert_eq!(result.last().await.unwrap().unwrap().id, 1);
        assert!(result.at(2).await.unwrap_err().is_index_out_of_range());
    }

    #[tokio::test]
    async fn test_streaming_after_close() {
        let driver = MemoryDriver::new();
        let mut result = result_of(&driver, 2).await;
        result.streaming().unwrap();
        result.close().await.unwrap();

        let err = result.for_each(|_| Ok(())).await.unwrap_err();
        assert!(err.is_usage_error());
    }
}
