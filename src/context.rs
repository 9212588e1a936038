//! Deadlines and cancellation for driver calls.
//!
//! Every read against a driver cursor runs through [`QueryContext::run`], which races
//! the read against the context's deadline and cancel signal.

use std::future::{Future, pending};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{Instant, sleep_until};

use crate::error::{OdmError, OdmResult};

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Handle used to cancel in-flight queries. Clones share the same signal.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    state: Arc<CancelState>,
}

impl CancelHandle {
    /// A new, uncancelled handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every query using this handle.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    /// Whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Deadline and cancellation for one query.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    deadline: Option<Instant>,
    budget: Duration,
    cancel: Option<CancelHandle>,
}

impl QueryContext {
    /// A context with no deadline and no cancellation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail reads that complete later than `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self.budget = timeout;
        self
    }

    /// Fail reads that complete after `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.budget = deadline.saturating_duration_since(Instant::now());
        self.deadline = Some(deadline);
        self
    }

    /// Fail reads once `handle` is cancelled.
    pub fn with_cancel(mut self, handle: CancelHandle) -> Self {
        self.cancel = Some(handle);
        self
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|at| Instant::now() >= at)
    }

    /// Run a driver call under this context.
    ///
    /// Cancellation wins over the deadline, and both win over a call that is ready
    /// at the same time.
    pub async fn run<T, F>(&self, call: F) -> OdmResult<T>
    where
        F: Future<Output = OdmResult<T>>,
    {
        if self.deadline.is_none() && self.cancel.is_none() {
            return call.await;
        }

        let cancelled = async {
            match &self.cancel {
                Some(handle) => handle.cancelled().await,
                None => pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(at) => sleep_until(at).await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = cancelled => Err(OdmError::Cancelled),
            () = expired => Err(OdmError::Timeout(self.budget)),
            result = call => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_no_limits() {
        let ctx = QueryContext::new();
        assert_eq!(ctx.run(async { Ok(3) }).await.unwrap(), 3);
        assert!(!ctx.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires() {
        let ctx = QueryContext::new().with_timeout(Duration::from_millis(10));
        let err = ctx
            .run(async {
                sleep(Duration::from_secs(1)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(ctx.is_expired());
    }

    #[tokio::test]
    async fn test_cancel_fires() {
        let handle = CancelHandle::new();
        let ctx = QueryContext::new().with_cancel(handle.clone());
        handle.cancel();

        let err = ctx.run(async { Ok(1) }).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting() {
        let handle = CancelHandle::new();
        let ctx = QueryContext::new().with_cancel(handle.clone());

        let canceller = tokio::spawn(async move {
            sleep(Duration::from_millis(5)).await;
            handle.cancel();
        });
        let err = ctx
            .run(async {
                sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        canceller.await.unwrap();
    }
}
