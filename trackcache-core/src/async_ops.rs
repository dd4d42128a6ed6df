//! Asynchronous completion model shared by every tier.
//!
//! Each `*_async` method enqueues the matching synchronous operation on
//! Tokio's blocking pool at call time and returns an [`AsyncOp`]. Awaiting it
//! yields a [`Completion`]; dropping it detaches the task without cancelling
//! the work.
//!
//! The task only holds a `Weak` reference to its tier. If the tier has been
//! dropped by the time the task starts, the operation completes as
//! [`Completion::Cancelled`].

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::task::{JoinError, JoinHandle};

use crate::error::CacheError;

/// Outcome of an asynchronous cache operation.
#[derive(Debug)]
pub enum Completion<V> {
    /// The operation ran. `key` is the key it targeted (absent for whole-tier
    /// operations); `value` is the value read or removed, if any.
    Done {
        key: Option<String>,
        value: Option<V>,
    },
    /// The tier was gone before the operation could run, or the task was
    /// aborted.
    Cancelled,
    /// The operation ran and failed.
    Failed(CacheError),
}

impl<V> Completion<V> {
    pub(crate) fn done(key: Option<String>, value: Option<V>) -> Self {
        Completion::Done { key, value }
    }

    pub(crate) fn from_result(key: Option<String>, result: crate::Result<Option<V>>) -> Self {
        match result {
            Ok(value) => Completion::Done { key, value },
            Err(e) => Completion::Failed(e),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Completion::Done { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Completion::Cancelled)
    }

    pub fn value(&self) -> Option<&V> {
        match self {
            Completion::Done { value, .. } => value.as_ref(),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<V> {
        match self {
            Completion::Done { value, .. } => value,
            _ => None,
        }
    }

    /// Converts to a `Result`, treating cancellation as `Ok(None)`.
    pub fn into_result(self) -> crate::Result<Option<V>> {
        match self {
            Completion::Done { value, .. } => Ok(value),
            Completion::Cancelled => Ok(None),
            Completion::Failed(e) => Err(e),
        }
    }

    /// Changes the value type, dropping any value carried by `Done`.
    pub(crate) fn without_value<U>(self) -> Completion<U> {
        match self {
            Completion::Done { key, .. } => Completion::Done { key, value: None },
            Completion::Cancelled => Completion::Cancelled,
            Completion::Failed(e) => Completion::Failed(e),
        }
    }
}

/// Handle to an operation already running on the Tokio runtime.
///
/// # Examples
///
/// ```
/// use trackcache_core::{MemoryConfig, MemoryTier};
///
/// # #[tokio::main]
/// # async fn main() {
/// let tier = MemoryTier::<u32>::new(MemoryConfig::default());
/// tier.set_async("answer", 42, 0).await;
///
/// let found = tier.get_async("answer").await;
/// assert_eq!(found.value(), Some(&42));
/// # }
/// ```
#[must_use = "the operation runs regardless, but its completion is lost if not awaited"]
#[derive(Debug)]
pub struct AsyncOp<V> {
    handle: JoinHandle<Completion<V>>,
}

impl<V: Send + 'static> AsyncOp<V> {
    /// Runs a future as a Tokio task.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Completion<V>> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }

    /// Aborts the operation if it has not started yet. Awaiting an aborted
    /// operation yields [`Completion::Cancelled`]; work already running on
    /// the blocking pool is not interrupted.
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<V> Future for AsyncOp<V> {
    type Output = Completion<V>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle)
            .poll(cx)
            .map(|joined| joined.unwrap_or_else(completion_from_join_error))
    }
}

fn completion_from_join_error<V>(err: JoinError) -> Completion<V> {
    if err.is_cancelled() {
        return Completion::Cancelled;
    }
    Completion::Failed(CacheError::TaskPanicked(panic_message(err.into_panic())))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Runs `op` against `target` on the blocking pool, holding only a weak
/// reference until the task starts.
///
/// # Panics
///
/// Panics if called outside of a Tokio runtime.
pub(crate) fn dispatch<T, V, F>(target: &Arc<T>, op: F) -> AsyncOp<V>
where
    T: Send + Sync + 'static,
    V: Send + 'static,
    F: FnOnce(&T) -> Completion<V> + Send + 'static,
{
    let weak = Arc::downgrade(target);
    let handle = tokio::task::spawn_blocking(move || match weak.upgrade() {
        Some(target) => op(&target),
        None => Completion::Cancelled,
    });
    AsyncOp { handle }
}
