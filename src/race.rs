//! Deadline racing over "settle once, read many" job handles.
//!
//! A [`SharedJob`] spawns its work onto the runtime once and exposes a
//! memoized view of the outcome. Racing it against a deadline only decides
//! whether the caller waits right now; the underlying task always runs to
//! natural settlement and its value stays readable afterwards.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::warn;

/// Outcome of racing a job against a deadline.
#[derive(Debug, Clone, PartialEq)]
pub enum RaceOutcome<T> {
    /// The job settled in time. `None` means it settled as a soft failure.
    Settled(Option<T>),
    /// Deadline hit first. The job keeps running in the background.
    Pending,
}

impl<T> RaceOutcome<T> {
    #[allow(dead_code)]
    pub fn into_settled(self) -> Option<Option<T>> {
        match self {
            RaceOutcome::Settled(v) => Some(v),
            RaceOutcome::Pending => None,
        }
    }
}

/// A spawned job whose result can be awaited any number of times.
///
/// The first settlement is cached; every later `wait` returns immediately
/// with the cached value. A panicking task settles as `None` rather than
/// poisoning readers.
pub struct SharedJob<T: Clone + Send + 'static> {
    inner: Shared<BoxFuture<'static, Option<T>>>,
}

impl<T: Clone + Send + 'static> Clone for SharedJob<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> SharedJob<T> {
    /// Spawn `work` onto the runtime immediately and return the handle.
    pub fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = Option<T>> + Send + 'static,
    {
        let handle = tokio::spawn(work);
        let inner = async move {
            match handle.await {
                Ok(value) => value,
                Err(e) => {
                    warn!("Background job aborted: {}", e);
                    None
                }
            }
        }
        .boxed()
        .shared();

        Self { inner }
    }

    /// A handle that is already settled. Used where a job's preconditions
    /// failed and it must read as a terminal soft absence.
    #[allow(dead_code)]
    pub fn ready(value: Option<T>) -> Self {
        let inner = async move { value }.boxed().shared();
        // Drive the memoized view to completion so peek-based checks see
        // the settlement without an intervening await.
        let _ = inner.clone().now_or_never();
        Self { inner }
    }

    /// Await natural settlement, however long that takes.
    pub async fn wait(&self) -> Option<T> {
        self.inner.clone().await
    }

    /// Wait for the job only until `deadline`. Never cancels the work.
    #[allow(dead_code)]
    pub async fn race_until(&self, deadline: Instant) -> RaceOutcome<T> {
        match timeout_at(deadline, self.inner.clone()).await {
            Ok(value) => RaceOutcome::Settled(value),
            Err(_) => RaceOutcome::Pending,
        }
    }

    /// Duration-based variant of [`race_until`](Self::race_until).
    #[allow(dead_code)]
    pub async fn race_with_deadline(&self, limit: Duration) -> RaceOutcome<T> {
        match timeout(limit, self.inner.clone()).await {
            Ok(value) => RaceOutcome::Settled(value),
            Err(_) => RaceOutcome::Pending,
        }
    }

    /// True once a settlement has been observed through this handle or any
    /// clone of it. A spawned task that finished while nobody was waiting
    /// reads as unsettled until the next `wait` or race polls the shared
    /// view.
    pub fn is_settled(&self) -> bool {
        self.inner.peek().is_some()
    }
}

/// Request-scoped cancellation flag. Checked before expensive provider
/// calls so a disconnected client releases upstream resources.
#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
