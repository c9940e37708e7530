//! Durable filter preferences (sort order and hide-completed) exposed as a
//! live stream.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info};

use crate::datastore::write_atomic;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    ByName,
    #[default]
    ByDate,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::ByName => "BY_NAME",
            SortOrder::ByDate => "BY_DATE",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BY_NAME" => Ok(SortOrder::ByName),
            "BY_DATE" => Ok(SortOrder::ByDate),
            other => Err(Error::UnknownSortOrder(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterPreferences {
    pub sort_order: SortOrder,
    pub hide_completed: bool,
}

/// Raw on-disk shape; absent keys fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StoredPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sort_order: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hide_completed: Option<bool>,
}

impl TryFrom<&StoredPreferences> for FilterPreferences {
    type Error = Error;

    fn try_from(stored: &StoredPreferences) -> Result<Self> {
        let sort_order = match stored.sort_order.as_deref() {
            Some(raw) => raw.parse()?,
            None => SortOrder::default(),
        };
        Ok(Self {
            sort_order,
            hide_completed: stored.hide_completed.unwrap_or(false),
        })
    }
}

#[async_trait]
pub trait PreferencesStore: Send + Sync {
    fn observe(&self) -> LivePreferences;

    async fn set_sort_order(&self, order: SortOrder) -> Result<()>;

    async fn set_hide_completed(&self, hide_completed: bool) -> Result<()>;
}

/// Live view of the preference record.
///
/// The first call to [`next`](Self::next) yields the current value; later
/// calls wait for the next write. A value that cannot be interpreted is
/// reported once as an error, after which the stream is finished.
pub struct LivePreferences {
    rx: watch::Receiver<StoredPreferences>,
    primed: bool,
    failed: bool,
}

impl LivePreferences {
    /// Cancel-safe: dropping the future leaves the stream position unchanged.
    pub async fn next(&mut self) -> Option<Result<FilterPreferences>> {
        if self.failed {
            return None;
        }
        if self.primed {
            self.rx.changed().await.ok()?;
        }
        self.primed = true;

        let parsed = FilterPreferences::try_from(&*self.rx.borrow_and_update());
        if parsed.is_err() {
            self.failed = true;
        }
        Some(parsed)
    }
}

#[derive(Debug)]
pub struct PreferencesManager {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
    tx: Arc<watch::Sender<StoredPreferences>>,
}

impl PreferencesManager {
    /// Opens the preference file, substituting defaults when it is missing
    /// or cannot be read.
    #[tracing::instrument(skip(path), fields(path = %path.display()))]
    pub fn open(path: &Path) -> Self {
        let stored = match read_stored(path) {
            Ok(Some(stored)) => {
                debug!(?stored, "loaded preferences");
                stored
            }
            Ok(None) => {
                info!("no preferences file; using defaults");
                StoredPreferences::default()
            }
            Err(err) => {
                error!(error = %err, "error reading preferences; using defaults");
                StoredPreferences::default()
            }
        };

        let (tx, _rx) = watch::channel(stored);
        Self {
            path: path.to_path_buf(),
            write_lock: Arc::new(Mutex::new(())),
            tx: Arc::new(tx),
        }
    }

    async fn edit<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut StoredPreferences),
    {
        let guard = Arc::clone(&self.write_lock).lock_owned().await;

        let mut next = self.tx.borrow().clone();
        apply(&mut next);

        let path = self.path.clone();
        let bytes = serde_json::to_vec_pretty(&next)?;
        let tx = Arc::clone(&self.tx);
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            write_atomic(&path, &bytes)?;
            tx.send_replace(next);
            Ok::<_, Error>(())
        })
        .await??;
        Ok(())
    }
}

#[async_trait]
impl PreferencesStore for PreferencesManager {
    fn observe(&self) -> LivePreferences {
        LivePreferences {
            rx: self.tx.subscribe(),
            primed: false,
            failed: false,
        }
    }

    #[tracing::instrument(skip(self))]
    async fn set_sort_order(&self, order: SortOrder) -> Result<()> {
        self.edit(|prefs| prefs.sort_order = Some(order.as_str().to_string()))
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn set_hide_completed(&self, hide_completed: bool) -> Result<()> {
        self.edit(|prefs| prefs.hide_completed = Some(hide_completed))
            .await
    }
}

fn read_stored(path: &Path) -> Result<Option<StoredPreferences>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&text)?))
}
