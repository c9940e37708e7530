use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::filter::TaskQuery;
use crate::task::Task;

type Snapshot = Arc<Vec<Task>>;

/// Durable task table with live queries.
#[async_trait]
pub trait TaskStore: Send + Sync {
    fn observe_filtered(&self, query: TaskQuery) -> LiveTasks;

    /// Inserts `task`, replacing any stored task with the same id.
    async fn insert(&self, task: Task) -> Result<()>;

    /// Replaces the stored task with the same id.
    async fn update(&self, task: Task) -> Result<()>;

    async fn delete(&self, task: &Task) -> Result<()>;

    /// Removes every completed task, returning how many were removed.
    async fn delete_completed(&self) -> Result<usize>;
}

/// A query against the task table that re-emits the complete matching list
/// after every committed write.
pub struct LiveTasks {
    rx: watch::Receiver<Snapshot>,
    query: TaskQuery,
    primed: bool,
}

impl LiveTasks {
    pub fn new(rx: watch::Receiver<Snapshot>, query: TaskQuery) -> Self {
        Self {
            rx,
            query,
            primed: false,
        }
    }

    pub fn query(&self) -> &TaskQuery {
        &self.query
    }

    /// Returns the current result immediately on the first call, then waits
    /// for the next write. Cancel-safe.
    pub async fn next(&mut self) -> Option<Vec<Task>> {
        if self.primed {
            self.rx.changed().await.ok()?;
        }
        self.primed = true;

        let snapshot = self.rx.borrow_and_update().clone();
        Some(self.query.apply(&snapshot))
    }
}

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
    created: bool,
    write_lock: Arc<Mutex<()>>,
    tx: Arc<watch::Sender<Snapshot>>,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join("tasks.data");
        let created = !tasks_path.exists();
        if created {
            fs::write(&tasks_path, "")?;
        }

        let tasks = load_jsonl(&tasks_path).context("failed to load tasks.data")?;

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            count = tasks.len(),
            created,
            "opened datastore"
        );

        let (tx, _rx) = watch::channel(Arc::new(tasks));
        Ok(Self {
            data_dir,
            tasks_path,
            created,
            write_lock: Arc::new(Mutex::new(())),
            tx: Arc::new(tx),
        })
    }

    /// Whether `open` created the task file, i.e. this is the first run.
    pub fn created(&self) -> bool {
        self.created
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.tx.borrow().as_ref().clone()
    }

    /// Applies `edit` to a copy of the table, persists it, then publishes it.
    ///
    /// The write lock is FIFO, so writes from one caller land in issue order.
    /// Persisting and publishing both run on the blocking worker while it
    /// holds the lock, so the file and the live snapshot never diverge even
    /// when the caller's future is dropped mid-write.
    async fn commit<F, R>(&self, edit: F) -> Result<R>
    where
        F: FnOnce(&mut Vec<Task>) -> Result<R>,
    {
        let guard = Arc::clone(&self.write_lock).lock_owned().await;

        let mut tasks: Vec<Task> = self.tx.borrow().as_ref().clone();
        let out = edit(&mut tasks)?;

        let path = self.tasks_path.clone();
        let tx = Arc::clone(&self.tx);
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            save_jsonl_atomic(&path, &tasks)?;
            tx.send_replace(Arc::new(tasks));
            Ok::<_, Error>(())
        })
        .await??;

        Ok(out)
    }
}

#[async_trait]
impl TaskStore for DataStore {
    fn observe_filtered(&self, query: TaskQuery) -> LiveTasks {
        LiveTasks::new(self.tx.subscribe(), query)
    }

    #[tracing::instrument(skip(self, task), fields(id = %task.id))]
    async fn insert(&self, task: Task) -> Result<()> {
        self.commit(move |tasks| {
            match tasks.iter_mut().find(|t| t.id == task.id) {
                Some(existing) => {
                    debug!("insert replaced existing task");
                    *existing = task;
                }
                None => tasks.push(task),
            }
            Ok(())
        })
        .await
    }

    #[tracing::instrument(skip(self, task), fields(id = %task.id))]
    async fn update(&self, task: Task) -> Result<()> {
        self.commit(move |tasks| {
            let existing = tasks
                .iter_mut()
                .find(|t| t.id == task.id)
                .ok_or(Error::NotFound(task.id))?;
            *existing = task;
            Ok(())
        })
        .await
    }

    #[tracing::instrument(skip(self, task), fields(id = %task.id))]
    async fn delete(&self, task: &Task) -> Result<()> {
        let id = task.id;
        self.commit(move |tasks| {
            let before = tasks.len();
            tasks.retain(|t| t.id != id);
            if tasks.len() == before {
                debug!("delete matched no task");
            }
            Ok(())
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn delete_completed(&self) -> Result<usize> {
        self.commit(|tasks| {
            let before = tasks.len();
            tasks.retain(|t| !t.completed);
            let removed = before - tasks.len();
            info!(before, after = tasks.len(), "deleted completed tasks");
            Ok(removed)
        })
        .await
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Task>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let task: Task = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(task);
    }

    debug!(count = out.len(), "loaded tasks from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, tasks))]
fn save_jsonl_atomic(path: &Path, tasks: &[Task]) -> Result<()> {
    debug!(file = %path.display(), count = tasks.len(), "saving jsonl atomically");

    let mut buf = Vec::new();
    for task in tasks {
        serde_json::to_writer(&mut buf, task)?;
        buf.push(b'\n');
    }
    write_atomic(path, &buf)
}

/// Replaces `path` with `bytes` via a sibling temp file and rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;

    temp.persist(path).map_err(|source| Error::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::task::Poll;
    use std::time::Duration;

    use chrono::{TimeDelta, Utc};
    use tempfile::tempdir;

    use super::*;
    use crate::preferences::FilterPreferences;

    fn all() -> TaskQuery {
        TaskQuery::new("", FilterPreferences::default())
    }

    #[tokio::test]
    async fn open_reports_first_run_and_reloads_tasks() {
        let temp = tempdir().expect("tempdir");

        let store = DataStore::open(temp.path()).expect("open");
        assert!(store.created());
        let task = Task::new("Write tests", true, Utc::now());
        store.insert(task.clone()).await.expect("insert");

        let reopened = DataStore::open(temp.path()).expect("reopen");
        assert!(!reopened.created());
        assert_eq!(reopened.snapshot(), vec![task]);
    }

    #[tokio::test]
    async fn live_query_re_emits_after_each_write() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open");
        let mut live = store.observe_filtered(all());

        assert!(live.next().await.expect("initial").is_empty());

        let task = Task::new("Walk the dog", false, Utc::now());
        store.insert(task.clone()).await.expect("insert");
        let after_insert = tokio::time::timeout(Duration::from_secs(5), live.next())
            .await
            .expect("timed out")
            .expect("open");
        assert_eq!(after_insert, vec![task.clone()]);

        store.delete(&task).await.expect("delete");
        let after_delete = tokio::time::timeout(Duration::from_secs(5), live.next())
            .await
            .expect("timed out")
            .expect("open");
        assert!(after_delete.is_empty());
    }

    #[tokio::test]
    async fn insert_with_existing_id_replaces() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open");

        let task = Task::new("Original", false, Utc::now());
        store.insert(task.clone()).await.expect("insert");
        store
            .insert(task.edited("Replaced", true))
            .await
            .expect("reinsert");

        let tasks = store.snapshot();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "Replaced");
    }

    #[tokio::test]
    async fn update_of_missing_task_is_not_found() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open");

        let ghost = Task::new("Ghost", false, Utc::now());
        let err = store.update(ghost.clone()).await.expect_err("should fail");
        assert!(matches!(err, Error::NotFound(id) if id == ghost.id));
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn delete_completed_removes_only_completed() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open");
        let now = Utc::now();

        let open = Task::new("Open", false, now);
        let done = Task::new("Done", false, now + TimeDelta::seconds(1)).with_completed(true);
        store.insert(open.clone()).await.expect("insert");
        store.insert(done).await.expect("insert");

        let removed = store.delete_completed().await.expect("delete completed");
        assert_eq!(removed, 1);
        assert_eq!(store.snapshot(), vec![open]);
    }

    #[tokio::test]
    async fn abandoned_write_still_lands_on_disk_and_in_snapshot() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open");
        let now = Utc::now();

        let first = Task::new("First", false, now);
        let second = Task::new("Second", false, now + TimeDelta::seconds(1));

        // Poll the write once so the file write starts, then drop it.
        let mut abandoned = store.insert(first.clone());
        poll_fn(|cx| {
            let _ = abandoned.as_mut().poll(cx);
            Poll::Ready(())
        })
        .await;
        drop(abandoned);

        store.insert(second.clone()).await.expect("insert");

        assert_eq!(store.snapshot(), vec![first, second]);
        let reopened = DataStore::open(temp.path()).expect("reopen");
        assert_eq!(reopened.snapshot(), store.snapshot());
    }
}
