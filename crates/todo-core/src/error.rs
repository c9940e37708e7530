//! Error types for the task and preference stores.

use std::path::PathBuf;

use uuid::Uuid;

/// Failures raised by the stores and the controllers that await them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading or writing a backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The atomic rename of a rewritten file failed.
    #[error("failed to persist {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },

    /// An update targeted a task that is no longer stored.
    #[error("task not found: {0}")]
    NotFound(Uuid),

    /// The stored sort order is not one this build understands.
    #[error("unknown sort order: {0}")]
    UnknownSortOrder(String),

    /// A blocking store worker panicked or was cancelled.
    #[error("store worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, Error>;
