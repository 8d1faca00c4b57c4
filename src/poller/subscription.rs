// Disposable handle for a spawned polling task

use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A polling task bound to a child cancellation token. Dropping the handle cancels the task.
pub struct Subscription {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Spawns `task` with a child of `parent`; cancelling `parent` also stops it.
    pub fn spawn<F, Fut>(parent: &CancellationToken, task: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = parent.child_token();
        let handle = tokio::spawn(task(token.clone()));
        Self {
            token,
            handle: Some(handle),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Cancels and waits for the task to exit.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
            && e.is_panic()
        {
            tracing::warn!(error = %e, "polling task panicked");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
