//! Application-lifetime task scope.
//!
//! Work spawned here is not tied to any controller: it keeps running when
//! the screen that started it goes away and is only cancelled by
//! [`AppScope::shutdown`].

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct AppScope {
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl AppScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `fut`; the handle resolves to `None` if the scope shut down
    /// first.
    pub fn spawn<F>(&self, name: &'static str, fut: F) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let cancel = self.cancel.clone();
        debug!(task = name, "spawning application task");
        self.tracker.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(task = name, "application task cancelled");
                    None
                }
                out = fut => Some(out),
            }
        })
    }

    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancels outstanding work and waits for every spawned task to finish.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("application scope shut down");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn spawned_work_completes() {
        let scope = AppScope::new();
        let out = scope
            .spawn("answer", async { 42 })
            .await
            .expect("join");
        assert_eq!(out, Some(42));
    }

    #[tokio::test]
    async fn shutdown_cancels_pending_work() {
        let scope = AppScope::new();
        let handle = scope.spawn("forever", std::future::pending::<()>());

        tokio::time::timeout(Duration::from_secs(2), scope.shutdown())
            .await
            .expect("shutdown should not hang");
        assert!(scope.is_shutdown());
        assert_eq!(handle.await.expect("join"), None);
    }

    #[tokio::test]
    async fn work_outlives_the_spawning_caller() {
        let scope = AppScope::new();
        let (tx, rx) = tokio::sync::oneshot::channel();

        {
            let caller_scope = scope.clone();
            caller_scope.spawn("late", async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                let _ = tx.send("done");
            });
        }

        let got = tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .expect("timed out")
            .expect("sender dropped");
        assert_eq!(got, "done");
    }
}
