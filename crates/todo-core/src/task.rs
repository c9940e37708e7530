use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: Uuid,

    pub name: String,

    #[serde(default)]
    pub important: bool,

    #[serde(default)]
    pub completed: bool,

    pub created: DateTime<Utc>,
}

impl Task {
    pub fn new(name: impl Into<String>, important: bool, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            important,
            completed: false,
            created: now,
        }
    }

    /// Copy of this task with only the completion flag replaced.
    pub fn with_completed(&self, completed: bool) -> Self {
        Self {
            completed,
            ..self.clone()
        }
    }

    /// Copy of this task carrying edited fields; identity, creation time and
    /// completion are kept.
    pub fn edited(&self, name: impl Into<String>, important: bool) -> Self {
        Self {
            name: name.into(),
            important,
            ..self.clone()
        }
    }

    pub fn created_display(&self) -> String {
        self.created
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string()
    }
}
