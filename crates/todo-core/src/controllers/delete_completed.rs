use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::datastore::TaskStore;
use crate::error::Result;
use crate::scope::AppScope;

/// Runs "delete all completed tasks" once the user confirms.
///
/// The deletion is spawned on the application scope, so dismissing the
/// confirmation screen right after confirming does not cancel it.
pub struct DeleteAllCompletedController {
    store: Arc<dyn TaskStore>,
    scope: AppScope,
}

impl DeleteAllCompletedController {
    pub fn new(store: Arc<dyn TaskStore>, scope: AppScope) -> Self {
        Self { store, scope }
    }

    /// Resolves to the number of removed tasks, or `None` if the application
    /// shut down first.
    pub fn confirm(&self) -> JoinHandle<Option<Result<usize>>> {
        let store = Arc::clone(&self.store);
        self.scope.spawn("delete_all_completed", async move {
            let result = store.delete_completed().await;
            match &result {
                Ok(removed) => info!(removed, "deleted all completed tasks"),
                Err(err) => error!(error = %err, "deleting completed tasks failed"),
            }
            result
        })
    }
}
