//! Single-shot promises.
//!
//! [`Promise::spawn`] starts a computation on its own task immediately and
//! hands back a handle that yields its value-or-error exactly once.
//! `wait` consumes the handle, so a second wait is not expressible. The
//! computation runs to completion whether or not anyone waits; there is no
//! cancellation.

use std::future::Future;

use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// Handle to a computation started by [`Promise::spawn`] or
/// [`Promise::spawn_blocking`].
#[derive(Debug)]
pub struct Promise<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T: Send + 'static> Promise<T> {
    /// Run an async computation on a new task.
    ///
    /// Must be called from within a tokio runtime. A panic inside the
    /// computation is delivered to the waiter as [`Error::Panicked`].
    pub fn spawn<F, Fut>(action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(async move { action().await });
        tokio::spawn(async move {
            let outcome = match task.await {
                Ok(result) => result.map_err(Error::from),
                Err(e) => Err(Error::from(e)),
            };
            // The waiter may have dropped or closed the handle.
            let _ = tx.send(outcome);
        });
        Self { rx }
    }

    /// Run a synchronous computation on the blocking pool.
    pub fn spawn_blocking<F>(action: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let task = tokio::task::spawn_blocking(action);
        tokio::spawn(async move {
            let outcome = match task.await {
                Ok(result) => result.map_err(Error::from),
                Err(e) => Err(Error::from(e)),
            };
            let _ = tx.send(outcome);
        });
        Self { rx }
    }
}

impl<T> Promise<T> {
    /// Block until the computation finishes and return its result.
    ///
    /// Returns [`Error::PromiseClosed`] if [`close`](Self::close) was called
    /// before the result arrived.
    pub async fn wait(self) -> Result<T> {
        self.rx.await.map_err(|_| Error::PromiseClosed)?
    }

    /// Give up on the result. The computation keeps running; its output
    /// is dropped. A value that already arrived can still be read by `wait`.
    ///
    /// This is a waiter-side close. The producing task finishes its side of
    /// the hand-off on its own by sending once, so nothing needs to close the
    /// promise after it resolves.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
