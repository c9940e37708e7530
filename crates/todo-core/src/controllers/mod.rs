pub mod add_edit;
pub mod delete_completed;
pub mod tasks;

pub use add_edit::{AddEditController, AddEditEvent, AddEditResult, SaveOutcome};
pub use delete_completed::DeleteAllCompletedController;
pub use tasks::{TaskListController, TaskListEvent};
