use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::preferences::{FilterPreferences, SortOrder};
use crate::task::Task;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    /// Color is only emitted when `color` is set and stdout is a terminal.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn print_task_table(&self, tasks: &[Task]) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_task_table(out, tasks)
    }

    /// Rows are numbered from 1 in list order; the shell addresses tasks by
    /// that number.
    pub fn write_task_table<W: Write>(&self, mut out: W, tasks: &[Task]) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = vec![
            "#".to_string(),
            "Done".to_string(),
            "Name".to_string(),
            "Created".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());
        for (idx, task) in tasks.iter().enumerate() {
            let number = self.paint(&(idx + 1).to_string(), "33");
            let done = if task.completed { "[x]" } else { "[ ]" }.to_string();
            let name = if task.important {
                self.paint(&format!("! {}", task.name), "31")
            } else {
                format!("  {}", task.name)
            };
            let name = if task.completed {
                self.paint(&name, "2")
            } else {
                name
            };

            rows.push(vec![number, done, name, task.created_display()]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    pub fn status_line(&self, search: &str, prefs: Option<FilterPreferences>) -> String {
        let mut parts = Vec::new();
        if !search.is_empty() {
            parts.push(format!("search \"{search}\""));
        }
        if let Some(prefs) = prefs {
            let sort = match prefs.sort_order {
                SortOrder::ByName => "by name",
                SortOrder::ByDate => "by date created",
            };
            parts.push(format!("sorted {sort}"));
            if prefs.hide_completed {
                parts.push("completed hidden".to_string());
            }
        }
        parts.join(", ")
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn plain() -> Renderer {
        Renderer::new(false)
    }

    #[test]
    fn table_numbers_rows_and_marks_state() {
        let now = Utc::now();
        let tasks = vec![
            Task::new("Buy bread", true, now),
            Task::new("Call mom", false, now).with_completed(true),
        ];

        let mut buf = Vec::new();
        plain().write_task_table(&mut buf, &tasks).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("# "));
        assert!(lines[2].starts_with("1 [ ]"));
        assert!(lines[2].contains("! Buy bread"));
        assert!(lines[3].starts_with("2 [x]"));
        assert!(lines[3].contains("Call mom"));
        assert!(!lines[3].contains('!'));
    }

    #[test]
    fn empty_list_says_so() {
        let mut buf = Vec::new();
        plain().write_task_table(&mut buf, &[]).expect("render");
        assert_eq!(String::from_utf8(buf).expect("utf8"), "No tasks.\n");
    }

    #[test]
    fn strip_ansi_keeps_visible_text() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
    }

    #[test]
    fn status_line_describes_filters() {
        let prefs = FilterPreferences {
            sort_order: SortOrder::ByName,
            hide_completed: true,
        };
        assert_eq!(
            plain().status_line("milk", Some(prefs)),
            "search \"milk\", sorted by name, completed hidden"
        );
    }
}
