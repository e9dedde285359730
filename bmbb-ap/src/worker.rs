//! Cancellable background workers
//!
//! A [`Worker`] pairs a spawned task with the [`CancellationToken`] it
//! observes. Cancellation is cooperative: the task checks the token at its
//! own boundaries, and [`Worker::cancel_and_join`] waits for it to exit.

use crate::error::{Error, Result};
use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A spawned task plus its cancellation token
pub struct Worker<T> {
    name: &'static str,
    token: CancellationToken,
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> Worker<T> {
    /// Run blocking work on the blocking thread pool
    pub fn spawn_blocking<F>(name: &'static str, work: F) -> Self
    where
        F: FnOnce(CancellationToken) -> T + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::task::spawn_blocking(move || work(child));
        debug!("Spawned {} worker", name);
        Self { name, token, handle }
    }

    /// Run async work on the runtime
    pub fn spawn<F, Fut>(name: &'static str, work: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let token = CancellationToken::new();
        let handle = tokio::spawn(work(token.clone()));
        debug!("Spawned {} worker", name);
        Self { name, token, handle }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Non-blocking liveness check
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Wait for the task to finish on its own.
    ///
    /// Cancel-safe: if this future is dropped early the worker stays intact
    /// and can still be cancelled or waited on again. Must not be called
    /// again once it has returned.
    pub async fn wait(&mut self) -> Result<T> {
        let name = self.name;
        (&mut self.handle)
            .await
            .map_err(|e| Error::Internal(format!("{} worker failed: {}", name, e)))
    }

    /// Wait for the task to finish and consume the worker
    pub async fn join(mut self) -> Result<T> {
        self.wait().await
    }

    /// Signal cancellation and wait until the task has exited
    pub async fn cancel_and_join(self) -> Result<T> {
        debug!("Cancelling {} worker", self.name);
        self.token.cancel();
        self.join().await
    }
}
