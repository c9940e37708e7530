use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use tracing::info;

use crate::datastore::TaskStore;
use crate::error::Result;
use crate::task::Task;

/// Demo tasks written on first run: (name, important, completed).
const DEMO_TASKS: [(&str, bool, bool); 6] = [
    ("Wash the dishes", false, false),
    ("Do the laundry", false, false),
    ("Buy groceries", true, false),
    ("Prepare food", false, true),
    ("Call mom", false, false),
    ("Repair my bike", true, true),
];

#[tracing::instrument(skip(store))]
pub async fn populate(store: Arc<dyn TaskStore>) -> Result<()> {
    let now = Utc::now();
    for (offset, (name, important, completed)) in DEMO_TASKS.into_iter().enumerate() {
        let created = now + TimeDelta::milliseconds(offset as i64);
        let task = Task::new(name, important, created).with_completed(completed);
        store.insert(task).await?;
    }
    info!(count = DEMO_TASKS.len(), "seeded demo tasks");
    Ok(())
}
