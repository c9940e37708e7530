use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, instrument};

use crate::controllers::add_edit::AddEditResult;
use crate::datastore::TaskStore;
use crate::error::Result;
use crate::events::{EventChannel, Events};
use crate::filter::FilterPipeline;
use crate::preferences::{LivePreferences, PreferencesStore, SortOrder};
use crate::task::Task;

pub const TASK_ADDED_MESSAGE: &str = "Task added";
pub const TASK_UPDATED_MESSAGE: &str = "Task updated";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskListEvent {
    NavigateToAdd,
    NavigateToEdit(Task),
    /// Carries the deleted task so it can be handed back to
    /// [`TaskListController::undo_delete`].
    ShowUndoDelete(Task),
    ShowSavedConfirmation(String),
    NavigateToDeleteAllConfirmation,
    ShowError(String),
}

/// Owns the search text, the derived task list and the task screen's
/// one-shot events.
///
/// Dropping the controller cancels its filter pipeline and closes its event
/// stream once queued events are taken.
pub struct TaskListController {
    store: Arc<dyn TaskStore>,
    preferences: Arc<dyn PreferencesStore>,
    search: watch::Sender<String>,
    tasks: watch::Receiver<Vec<Task>>,
    events: EventChannel<TaskListEvent>,
    _pipeline: DropGuard,
}

impl TaskListController {
    /// Must be called inside a tokio runtime; the filter pipeline is spawned
    /// immediately.
    pub fn new(store: Arc<dyn TaskStore>, preferences: Arc<dyn PreferencesStore>) -> Self {
        let (search, search_rx) = watch::channel(String::new());
        let (pipeline, tasks) =
            FilterPipeline::new(Arc::clone(&store), search_rx, preferences.observe());

        let cancel = CancellationToken::new();
        tokio::spawn(pipeline.run(cancel.clone()));
        debug!("task list controller started");

        Self {
            store,
            preferences,
            search,
            tasks,
            events: EventChannel::new(),
            _pipeline: cancel.drop_guard(),
        }
    }

    /// Live, fully re-delivered task list for the current inputs.
    pub fn tasks(&self) -> watch::Receiver<Vec<Task>> {
        self.tasks.clone()
    }

    pub fn events(&self) -> Events<TaskListEvent> {
        self.events.events()
    }

    pub fn filter_preferences(&self) -> LivePreferences {
        self.preferences.observe()
    }

    pub fn search_query(&self) -> String {
        self.search.borrow().clone()
    }

    pub fn set_search_query(&self, text: impl Into<String>) {
        let text = text.into();
        self.search.send_if_modified(|current| {
            if *current == text {
                return false;
            }
            *current = text;
            true
        });
    }

    #[instrument(skip(self))]
    pub async fn set_sort_order(&self, order: SortOrder) -> Result<()> {
        let result = self.preferences.set_sort_order(order).await;
        self.surface("Could not change sort order", result)
    }

    #[instrument(skip(self))]
    pub async fn set_hide_completed(&self, hide_completed: bool) -> Result<()> {
        let result = self.preferences.set_hide_completed(hide_completed).await;
        self.surface("Could not change filter", result)
    }

    #[instrument(skip(self, task), fields(id = %task.id))]
    pub fn select_task(&self, task: &Task) {
        self.events.send(TaskListEvent::NavigateToEdit(task.clone()));
    }

    #[instrument(skip(self, task), fields(id = %task.id))]
    pub async fn toggle_completed(&self, task: &Task, checked: bool) -> Result<()> {
        let result = self.store.update(task.with_completed(checked)).await;
        self.surface("Could not update task", result)
    }

    #[instrument(skip(self, task), fields(id = %task.id))]
    pub async fn swipe_to_delete(&self, task: &Task) -> Result<()> {
        let result = self.store.delete(task).await;
        self.surface("Could not delete task", result)?;
        info!("task deleted; offering undo");
        self.events.send(TaskListEvent::ShowUndoDelete(task.clone()));
        Ok(())
    }

    /// Recreates a deleted task with its original id and field values.
    #[instrument(skip(self, task), fields(id = %task.id))]
    pub async fn undo_delete(&self, task: Task) -> Result<()> {
        let result = self.store.insert(task).await;
        self.surface("Could not restore task", result)
    }

    pub fn request_new_task(&self) {
        self.events.send(TaskListEvent::NavigateToAdd);
    }

    pub fn request_delete_all_completed(&self) {
        self.events.send(TaskListEvent::NavigateToDeleteAllConfirmation);
    }

    /// Shows the confirmation for a result code returned by the add/edit
    /// screen; unknown codes are ignored.
    pub fn on_add_edit_result(&self, code: i32) {
        let message = match AddEditResult::from_code(code) {
            Some(AddEditResult::Created) => TASK_ADDED_MESSAGE,
            Some(AddEditResult::Edited) => TASK_UPDATED_MESSAGE,
            None => {
                debug!(code, "ignoring unrelated result code");
                return;
            }
        };
        self.events
            .send(TaskListEvent::ShowSavedConfirmation(message.to_string()));
    }

    fn surface(&self, what: &str, result: Result<()>) -> Result<()> {
        if let Err(err) = &result {
            error!(error = %err, "{}", what);
            self.events
                .send(TaskListEvent::ShowError(format!("{what}: {err}")));
        }
        result
    }
}
