//! Task query semantics and the live filter pipeline that recombines search
//! text with filter preferences.

use std::cmp::Ordering;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::datastore::TaskStore;
use crate::preferences::{FilterPreferences, LivePreferences, SortOrder};
use crate::task::Task;

/// One combination of search text and filter preferences.
///
/// Name matching is a case-insensitive substring test; an empty search
/// matches every task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    search: String,
    sort_order: SortOrder,
    hide_completed: bool,
    needle: String,
}

impl TaskQuery {
    pub fn new(search: impl Into<String>, prefs: FilterPreferences) -> Self {
        let search = search.into();
        let needle = search.to_lowercase();
        Self {
            search,
            sort_order: prefs.sort_order,
            hide_completed: prefs.hide_completed,
            needle,
        }
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn hide_completed(&self) -> bool {
        self.hide_completed
    }

    pub fn matches(&self, task: &Task) -> bool {
        if self.hide_completed && task.completed {
            return false;
        }
        self.needle.is_empty() || task.name.to_lowercase().contains(&self.needle)
    }

    /// Important tasks first, then name or creation time, then creation time
    /// and id so the order is total.
    pub fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let secondary = match self.sort_order {
            SortOrder::ByName => a.name.cmp(&b.name),
            SortOrder::ByDate => Ordering::Equal,
        };

        b.important
            .cmp(&a.important)
            .then(secondary)
            .then_with(|| a.created.cmp(&b.created))
            .then_with(|| a.id.cmp(&b.id))
    }

    #[tracing::instrument(skip(self, tasks), fields(search = %self.search, sort = %self.sort_order, hide_completed = self.hide_completed))]
    pub fn apply(&self, tasks: &[Task]) -> Vec<Task> {
        let mut out: Vec<Task> = tasks
            .iter()
            .filter(|task| self.matches(task))
            .cloned()
            .collect();
        out.sort_by(|a, b| self.compare(a, b));
        trace!(matched = out.len(), total = tasks.len(), "applied task query");
        out
    }
}

/// Re-queries the task store whenever the search text or the preferences
/// change, publishing the latest result list.
///
/// Only the most recent query is ever listened to: an input change drops the
/// running query before the next one is issued.
pub struct FilterPipeline {
    store: Arc<dyn TaskStore>,
    search: watch::Receiver<String>,
    preferences: LivePreferences,
    output: watch::Sender<Vec<Task>>,
}

impl FilterPipeline {
    pub fn new(
        store: Arc<dyn TaskStore>,
        search: watch::Receiver<String>,
        preferences: LivePreferences,
    ) -> (Self, watch::Receiver<Vec<Task>>) {
        let (output, rx) = watch::channel(Vec::new());
        (
            Self {
                store,
                search,
                preferences,
                output,
            },
            rx,
        )
    }

    /// Runs until `cancel` fires, an input closes, or the preference stream
    /// reports an unrecoverable error.
    ///
    /// Intended to be spawned:
    ///
    /// ```rust,ignore
    /// let (pipeline, tasks) = FilterPipeline::new(store, search_rx, prefs.observe());
    /// tokio::spawn(pipeline.run(cancel.clone()));
    /// ```
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut prefs = tokio::select! {
            _ = cancel.cancelled() => return,
            first = self.preferences.next() => match first {
                Some(Ok(prefs)) => prefs,
                Some(Err(err)) => {
                    error!(error = %err, "cannot read filter preferences; task list stopped");
                    return;
                }
                None => return,
            },
        };

        loop {
            let search = self.search.borrow_and_update().clone();
            let query = TaskQuery::new(search, prefs);
            debug!(
                search = %query.search(),
                sort = %query.sort_order(),
                hide_completed = query.hide_completed(),
                "issuing task query"
            );
            let mut live = self.store.observe_filtered(query);

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        info!("filter pipeline cancelled");
                        return;
                    }
                    changed = self.search.changed() => {
                        if changed.is_err() {
                            debug!("search input closed");
                            return;
                        }
                        break;
                    }
                    next = self.preferences.next() => match next {
                        Some(Ok(next)) if next == prefs => {}
                        Some(Ok(next)) => {
                            prefs = next;
                            break;
                        }
                        Some(Err(err)) => {
                            error!(error = %err, "cannot read filter preferences; task list stopped");
                            return;
                        }
                        None => return,
                    },
                    tasks = live.next() => match tasks {
                        Some(tasks) => {
                            trace!(count = tasks.len(), "publishing task list");
                            self.output.send_replace(tasks);
                        }
                        None => {
                            debug!("task store closed");
                            return;
                        }
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeDelta, Utc};

    use super::*;

    fn at(base: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
        base + TimeDelta::seconds(secs)
    }

    fn sample() -> Vec<Task> {
        let base = Utc::now();
        let milk = Task::new("Buy milk", false, at(base, 0));
        let bread = Task::new("Buy bread", true, at(base, 1));
        let mom = Task::new("Call mom", false, at(base, 2)).with_completed(true);
        let apples = Task::new("apples", false, at(base, 3));
        vec![milk, bread, mom, apples]
    }

    fn names(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.name.as_str()).collect()
    }

    fn query(search: &str, sort_order: SortOrder, hide_completed: bool) -> TaskQuery {
        TaskQuery::new(
            search,
            FilterPreferences {
                sort_order,
                hide_completed,
            },
        )
    }

    #[test]
    fn search_hide_completed_and_name_order() {
        let out = query("Buy", SortOrder::ByName, true).apply(&sample());
        assert_eq!(names(&out), vec!["Buy bread", "Buy milk"]);
    }

    #[test]
    fn search_is_case_insensitive() {
        let out = query("buy", SortOrder::ByDate, false).apply(&sample());
        assert_eq!(names(&out), vec!["Buy bread", "Buy milk"]);

        let out = query("MOM", SortOrder::ByDate, false).apply(&sample());
        assert_eq!(names(&out), vec!["Call mom"]);
    }

    #[test]
    fn empty_search_matches_everything_important_first() {
        let out = query("", SortOrder::ByDate, false).apply(&sample());
        assert_eq!(
            names(&out),
            vec!["Buy bread", "Buy milk", "Call mom", "apples"]
        );
    }

    #[test]
    fn hide_completed_drops_only_completed() {
        let out = query("", SortOrder::ByDate, true).apply(&sample());
        assert!(out.iter().all(|t| !t.completed));
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn name_order_is_binary_after_importance() {
        let out = query("", SortOrder::ByName, false).apply(&sample());
        assert_eq!(
            names(&out),
            vec!["Buy bread", "Buy milk", "Call mom", "apples"]
        );
    }

    #[test]
    fn switching_sort_order_keeps_the_same_set() {
        let tasks = sample();
        let by_date = query("", SortOrder::ByDate, false).apply(&tasks);
        let by_name = query("", SortOrder::ByName, false).apply(&tasks);
        let back = query("", SortOrder::ByDate, false).apply(&tasks);

        let mut date_ids: Vec<_> = by_date.iter().map(|t| t.id).collect();
        let mut name_ids: Vec<_> = by_name.iter().map(|t| t.id).collect();
        date_ids.sort();
        name_ids.sort();
        assert_eq!(date_ids, name_ids);
        assert_eq!(by_date, back);
    }

    #[test]
    fn unmatched_search_yields_empty_list() {
        let out = query("zzz", SortOrder::ByName, false).apply(&sample());
        assert!(out.is_empty());
    }
}
