//! Session-scoped recovery state.
//!
//! A small key-value snapshot that outlives a single controller instance so
//! an in-progress edit survives the hosting screen being torn down and
//! rebuilt. It is never written to the task store.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::task::Task;

pub const TASK_KEY: &str = "task";
pub const TASK_NAME_KEY: &str = "task_name";
pub const TASK_IMPORTANCE_KEY: &str = "task_importance";

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    values: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session for editing `task`.
    pub fn for_edit(task: &Task) -> Self {
        let session = Self::new();
        session.set(TASK_KEY, task);
        session
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.values.lock().get(key).cloned()?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(err) => {
                warn!(key, error = %err, "ignoring undecodable session value");
                None
            }
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(v) => {
                self.values.lock().insert(key.to_string(), v);
            }
            Err(err) => warn!(key, error = %err, "cannot store session value"),
        }
    }

    pub fn remove(&self, key: &str) {
        self.values.lock().remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.lock().contains_key(key)
    }

    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.values.lock().clone()
    }

    pub fn restore(snapshot: BTreeMap<String, Value>) -> Self {
        Self {
            values: Arc::new(Mutex::new(snapshot)),
        }
    }
}
