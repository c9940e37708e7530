use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::datastore::TaskStore;
use crate::error::Result;
use crate::events::{EventChannel, Events};
use crate::session::{SessionState, TASK_IMPORTANCE_KEY, TASK_KEY, TASK_NAME_KEY};
use crate::task::Task;

/// First result code free for application use; lower values are reserved by
/// navigation hosts for "ok" and "cancelled".
pub const RESULT_FIRST_USER: i32 = 1;

pub const INVALID_NAME_MESSAGE: &str = "Name cannot be empty";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddEditResult {
    Created,
    Edited,
}

impl AddEditResult {
    pub fn code(self) -> i32 {
        match self {
            AddEditResult::Created => RESULT_FIRST_USER,
            AddEditResult::Edited => RESULT_FIRST_USER + 1,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            c if c == RESULT_FIRST_USER => Some(AddEditResult::Created),
            c if c == RESULT_FIRST_USER + 1 => Some(AddEditResult::Edited),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddEditEvent {
    ShowInvalidInput(String),
    NavigateBack(AddEditResult),
    ShowSaveFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The draft name was blank; nothing was written.
    Rejected,
    Saved(AddEditResult),
}

/// Draft of a single task being created or edited.
///
/// Field values are mirrored into the [`SessionState`] on every change, so a
/// controller rebuilt over the same session picks the draft back up.
pub struct AddEditController {
    store: Arc<dyn TaskStore>,
    session: SessionState,
    task: Option<Task>,
    name: String,
    important: bool,
    events: EventChannel<AddEditEvent>,
}

impl AddEditController {
    pub fn new(store: Arc<dyn TaskStore>, session: SessionState) -> Self {
        let task: Option<Task> = session.get(TASK_KEY);
        let name = session
            .get::<String>(TASK_NAME_KEY)
            .or_else(|| task.as_ref().map(|t| t.name.clone()))
            .unwrap_or_default();
        let important = session
            .get::<bool>(TASK_IMPORTANCE_KEY)
            .or_else(|| task.as_ref().map(|t| t.important))
            .unwrap_or(false);

        Self {
            store,
            session,
            task,
            name,
            important,
            events: EventChannel::new(),
        }
    }

    /// The task being edited; `None` when creating.
    pub fn task(&self) -> Option<&Task> {
        self.task.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.session.set(TASK_NAME_KEY, &self.name);
    }

    pub fn important(&self) -> bool {
        self.important
    }

    pub fn set_important(&mut self, important: bool) {
        self.important = important;
        self.session.set(TASK_IMPORTANCE_KEY, &important);
    }

    pub fn events(&self) -> Events<AddEditEvent> {
        self.events.events()
    }

    /// Validates the draft and writes it.
    ///
    /// A blank name emits [`AddEditEvent::ShowInvalidInput`] and touches
    /// nothing. A store failure is emitted as
    /// [`AddEditEvent::ShowSaveFailed`] and returned.
    #[instrument(skip(self), fields(editing = self.task.is_some(), name_len = self.name.len()))]
    pub async fn save(&self) -> Result<SaveOutcome> {
        if self.name.trim().is_empty() {
            warn!("rejected blank task name");
            self.events
                .send(AddEditEvent::ShowInvalidInput(INVALID_NAME_MESSAGE.to_string()));
            return Ok(SaveOutcome::Rejected);
        }

        let (write, result) = match &self.task {
            Some(task) => {
                let updated = task.edited(self.name.clone(), self.important);
                (self.store.update(updated).await, AddEditResult::Edited)
            }
            None => {
                let created = Task::new(self.name.clone(), self.important, Utc::now());
                (self.store.insert(created).await, AddEditResult::Created)
            }
        };

        if let Err(err) = write {
            error!(error = %err, "saving task failed");
            self.events
                .send(AddEditEvent::ShowSaveFailed(format!("Could not save task: {err}")));
            return Err(err);
        }

        info!(result = ?result, "task saved");
        self.events.send(AddEditEvent::NavigateBack(result));
        Ok(SaveOutcome::Saved(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_codes_are_distinct_and_above_reserved_values() {
        let created = AddEditResult::Created.code();
        let edited = AddEditResult::Edited.code();
        assert_ne!(created, edited);
        assert!(created >= RESULT_FIRST_USER && edited >= RESULT_FIRST_USER);
        assert_eq!(AddEditResult::from_code(created), Some(AddEditResult::Created));
        assert_eq!(AddEditResult::from_code(edited), Some(AddEditResult::Edited));
        assert_eq!(AddEditResult::from_code(0), None);
        assert_eq!(AddEditResult::from_code(-1), None);
    }
}
