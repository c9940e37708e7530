//! Line-oriented terminal front-end over the controllers.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::controllers::{
    AddEditController, AddEditEvent, DeleteAllCompletedController, TaskListController,
    TaskListEvent,
};
use crate::datastore::TaskStore;
use crate::preferences::{FilterPreferences, PreferencesStore, SortOrder};
use crate::render::Renderer;
use crate::scope::AppScope;
use crate::session::SessionState;
use crate::task::Task;

const HELP: &str = "\
commands:
  ls                 show the list
  find [TEXT]        filter by name (no TEXT clears the search)
  sort name|date     change sort order
  hide on|off        hide completed tasks
  add [!]NAME        add a task (! marks it important)
  edit N [!|-]NAME   rename task N (! marks it important, - clears that)
  done N / undone N  mark task N completed or not
  rm N               delete task N
  undo               restore the last deleted task
  clear              delete all completed tasks
  help               show this help
  quit               exit";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Draft {
    name: String,
    /// `None` keeps whatever importance the editor starts with.
    important: Option<bool>,
}

impl Draft {
    fn parse(raw: &str) -> Self {
        let (important, name) = if let Some(rest) = raw.strip_prefix('!') {
            (Some(true), rest)
        } else if let Some(rest) = raw.strip_prefix('-') {
            (Some(false), rest)
        } else {
            (None, raw)
        };
        Self {
            name: name.trim().to_string(),
            important,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    List,
    Find(String),
    Sort(SortOrder),
    Hide(bool),
    Add(Draft),
    Edit(usize, Draft),
    Done(usize, bool),
    Remove(usize),
    Undo,
    Clear,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> anyhow::Result<Self> {
        let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        let number = |raw: &str| -> anyhow::Result<usize> {
            raw.parse::<usize>()
                .map_err(|_| anyhow!("expected a task number, got: {raw:?}"))
        };

        let cmd = match word {
            "ls" | "list" => Command::List,
            "find" | "search" => Command::Find(rest.to_string()),
            "sort" => match rest {
                "name" => Command::Sort(SortOrder::ByName),
                "date" => Command::Sort(SortOrder::ByDate),
                other => return Err(anyhow!("sort by `name` or `date`, not {other:?}")),
            },
            "hide" => match rest {
                "on" | "yes" | "true" => Command::Hide(true),
                "off" | "no" | "false" => Command::Hide(false),
                other => return Err(anyhow!("hide `on` or `off`, not {other:?}")),
            },
            "add" => Command::Add(Draft::parse(rest)),
            "edit" => {
                let (n, name) = rest.split_once(' ').unwrap_or((rest, ""));
                Command::Edit(number(n)?, Draft::parse(name.trim()))
            }
            "done" => Command::Done(number(rest)?, true),
            "undone" => Command::Done(number(rest)?, false),
            "rm" | "delete" => Command::Remove(number(rest)?),
            "undo" => Command::Undo,
            "clear" => Command::Clear,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(anyhow!("unknown command {other:?}; try `help`")),
        };
        Ok(cmd)
    }
}

pub struct Shell {
    store: Arc<dyn TaskStore>,
    scope: AppScope,
    renderer: Renderer,
    list: TaskListController,
    visible: Vec<Task>,
    prefs: Option<FilterPreferences>,
    pending_draft: Option<Draft>,
    last_deleted: Option<Task>,
    awaiting_confirmation: bool,
}

impl Shell {
    pub fn new(
        store: Arc<dyn TaskStore>,
        preferences: Arc<dyn PreferencesStore>,
        scope: AppScope,
        renderer: Renderer,
    ) -> Self {
        let list = TaskListController::new(Arc::clone(&store), preferences);
        Self {
            store,
            scope,
            renderer,
            list,
            visible: Vec::new(),
            prefs: None,
            pending_draft: None,
            last_deleted: None,
            awaiting_confirmation: false,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        self.run_with(BufReader::new(tokio::io::stdin())).await
    }

    /// Reads commands from `input` until `quit` or end of input.
    #[tracing::instrument(skip_all)]
    pub async fn run_with<R>(mut self, input: R) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut tasks = self.list.tasks();
        let mut tasks_open = true;
        let mut prefs = self.list.filter_preferences();
        let mut prefs_open = true;
        let mut events = self.list.events().attach().await;

        println!("{HELP}");

        loop {
            tokio::select! {
                changed = tasks.changed(), if tasks_open => {
                    if changed.is_err() {
                        warn!("task list stopped updating");
                        println!(
                            "The task list stopped updating. Fix the sort order with \
                             `sort name` or `sort date`, then restart."
                        );
                        tasks_open = false;
                        continue;
                    }
                    self.visible = tasks.borrow_and_update().clone();
                    self.show()?;
                }
                next = prefs.next(), if prefs_open => match next {
                    Some(Ok(next)) => self.prefs = Some(next),
                    Some(Err(err)) => warn!(error = %err, "filter preferences unavailable"),
                    None => prefs_open = false,
                },
                event = events.next() => match event {
                    Some(event) => self.handle_event(event).await?,
                    None => break,
                },
                line = lines.next_line() => match line? {
                    Some(line) => {
                        if !self.handle_line(line.trim()).await? {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        debug!("shell finished");
        Ok(())
    }

    fn show(&self) -> anyhow::Result<()> {
        let status = self
            .renderer
            .status_line(&self.list.search_query(), self.prefs);
        if !status.is_empty() {
            println!("({status})");
        }
        self.renderer.print_task_table(&self.visible)
    }

    fn task_at(&self, number: usize) -> Option<Task> {
        let task = number
            .checked_sub(1)
            .and_then(|idx| self.visible.get(idx))
            .cloned();
        if task.is_none() {
            println!("No task #{number}.");
        }
        task
    }

    /// Returns `false` when the user asked to quit.
    async fn handle_line(&mut self, line: &str) -> anyhow::Result<bool> {
        if self.awaiting_confirmation {
            self.awaiting_confirmation = false;
            if matches!(line, "y" | "yes") {
                self.delete_all_completed().await;
            } else {
                println!("Kept completed tasks.");
            }
            return Ok(true);
        }

        if line.is_empty() {
            return Ok(true);
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(err) => {
                println!("{err}");
                return Ok(true);
            }
        };
        debug!(?command, "shell command");

        // Store failures come back as `ShowError` events, so results are
        // not inspected here.
        match command {
            Command::List => self.show()?,
            Command::Find(text) => self.list.set_search_query(text),
            Command::Sort(order) => {
                let _ = self.list.set_sort_order(order).await;
            }
            Command::Hide(hide) => {
                let _ = self.list.set_hide_completed(hide).await;
            }
            Command::Add(draft) => {
                self.pending_draft = Some(draft);
                self.list.request_new_task();
            }
            Command::Edit(number, draft) => {
                if let Some(task) = self.task_at(number) {
                    self.pending_draft = Some(draft);
                    self.list.select_task(&task);
                }
            }
            Command::Done(number, checked) => {
                if let Some(task) = self.task_at(number) {
                    let _ = self.list.toggle_completed(&task, checked).await;
                }
            }
            Command::Remove(number) => {
                if let Some(task) = self.task_at(number) {
                    let _ = self.list.swipe_to_delete(&task).await;
                }
            }
            Command::Undo => match self.last_deleted.take() {
                Some(task) => {
                    let _ = self.list.undo_delete(task).await;
                }
                None => println!("Nothing to undo."),
            },
            Command::Clear => self.list.request_delete_all_completed(),
            Command::Help => println!("{HELP}"),
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    async fn handle_event(&mut self, event: TaskListEvent) -> anyhow::Result<()> {
        match event {
            TaskListEvent::NavigateToAdd => {
                let draft = self.pending_draft.take();
                self.open_editor(SessionState::new(), draft).await;
            }
            TaskListEvent::NavigateToEdit(task) => {
                let draft = self.pending_draft.take();
                self.open_editor(SessionState::for_edit(&task), draft).await;
            }
            TaskListEvent::ShowUndoDelete(task) => {
                println!("Task deleted. Type `undo` to restore \"{}\".", task.name);
                self.last_deleted = Some(task);
            }
            TaskListEvent::ShowSavedConfirmation(message) => println!("{message}"),
            TaskListEvent::NavigateToDeleteAllConfirmation => {
                println!("Do you really want to delete all completed tasks? [y/N]");
                self.awaiting_confirmation = true;
            }
            TaskListEvent::ShowError(message) => println!("error: {message}"),
        }
        Ok(())
    }

    async fn open_editor(&mut self, session: SessionState, draft: Option<Draft>) {
        let Some(draft) = draft else {
            return;
        };

        let mut editor = AddEditController::new(Arc::clone(&self.store), session);
        editor.set_name(draft.name);
        if let Some(important) = draft.important {
            editor.set_important(important);
        }

        let mut events = editor.events().attach().await;
        // Failures are reported through the editor's events below.
        let _ = editor.save().await;
        drop(editor);

        while let Some(event) = events.next().await {
            match event {
                AddEditEvent::ShowInvalidInput(message) | AddEditEvent::ShowSaveFailed(message) => {
                    println!("{message}")
                }
                AddEditEvent::NavigateBack(result) => self.list.on_add_edit_result(result.code()),
            }
        }
    }

    async fn delete_all_completed(&self) {
        let controller = DeleteAllCompletedController::new(Arc::clone(&self.store), self.scope.clone());
        match controller.confirm().await {
            Ok(Some(Ok(removed))) => println!("Deleted {removed} completed task(s)."),
            Ok(Some(Err(err))) => println!("error: could not delete completed tasks: {err}"),
            Ok(None) => debug!("bulk delete cancelled by shutdown"),
            Err(err) => warn!(error = %err, "bulk delete worker failed"),
        }
    }
}
