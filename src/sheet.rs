use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::options::{ListOptions, merge_with_current};
use crate::schedule;
use crate::task::{Defaults, TaskInput, TaskRow};

/// The in-memory task table for one session.
///
/// Rows are stored as typed; only the schedule column is canonicalized on the
/// way in, so the table always shows `HH:MM` where the entry could be read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskSheet {
    rows: Vec<TaskInput>,
}

/// Dropdown lists for the label columns, merged with what the table holds.
#[derive(Debug, Clone, Serialize)]
pub struct SheetOptions {
    pub sections: Vec<String>,
    pub projects: Vec<String>,
    pub tags: Vec<String>,
}

impl TaskSheet {
    pub fn new() -> Self {
        TaskSheet::default()
    }

    pub fn rows(&self) -> &[TaskInput] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Replace the whole table, as after an edit in the grid.
    pub fn replace_rows(&mut self, rows: Vec<TaskInput>) {
        self.rows = rows.into_iter().map(normalize_entry).collect();
    }

    /// Append rows to the end of the table.
    pub fn append_rows(&mut self, rows: Vec<TaskInput>) {
        self.rows.extend(rows.into_iter().map(normalize_entry));
    }

    /// Add one row per non-blank line of `text`, pre-filled from `defaults`.
    ///
    /// Returns the number of rows added.
    pub fn append_lines(&mut self, text: &str, defaults: &Defaults) -> usize {
        let rows = rows_from_task_lines(text, defaults);
        let added = rows.len();
        self.append_rows(rows);
        added
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Resolved rows with unnamed tasks removed.
    pub fn export(&self, defaults: &Defaults) -> Vec<TaskRow> {
        defaults::export_rows(&self.rows, defaults)
    }

    /// Suggestion lists extended with the defaults and the values in the table.
    pub fn options(&self, base: &ListOptions, defaults: &Defaults) -> SheetOptions {
        let mut sections = base.sections.clone();
        sections.push(defaults.section.clone());
        let mut projects = base.projects.clone();
        projects.push(defaults.project.clone());

        SheetOptions {
            sections: merge_with_current(&sections, self.column(|row| &row.section)),
            projects: merge_with_current(&projects, self.column(|row| &row.project)),
            tags: merge_with_current(&base.tags, self.column(|row| &row.tag)),
        }
    }

    fn column<'a, F>(&'a self, pick: F) -> impl Iterator<Item = &'a str> + 'a
    where
        F: Fn(&'a TaskInput) -> &'a Option<String> + 'a,
    {
        self.rows.iter().filter_map(move |row| pick(row).as_deref())
    }
}

/// One row per non-blank trimmed line, each pre-filled from `defaults`.
pub fn rows_from_task_lines(text: &str, defaults: &Defaults) -> Vec<TaskInput> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| TaskInput::from_defaults(line, defaults))
        .collect()
}

fn normalize_entry(mut row: TaskInput) -> TaskInput {
    row.schedule = row.schedule.map(|value| schedule::normalize(&value));
    row
}
