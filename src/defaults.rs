use crate::schedule;
use crate::task::{Defaults, TaskInput, TaskRow, parse_due_date, parse_estimated};

/// Resolve every row against `defaults`.
///
/// Only blank or unreadable cells take the default; populated cells are kept
/// (trimmed). The input is not touched.
///
/// # Arguments
/// * `rows` - The sheet as edited, cells possibly blank
/// * `defaults` - Values for the blank cells
///
/// # Returns
/// One [`TaskRow`] per input row, in order. Rows whose task name is still
/// blank are kept here; see [`export_rows`] for the filtered view.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use tasksheet::defaults::apply_defaults;
/// use tasksheet::{Defaults, TaskInput};
///
/// let defaults = Defaults::for_today(NaiveDate::from_ymd_opt(2025, 5, 1).unwrap());
/// let rows = apply_defaults(&[TaskInput::named("買い物"), TaskInput::default()], &defaults);
///
/// assert_eq!(rows.len(), 2);
/// assert_eq!(rows[0].due_date, NaiveDate::from_ymd_opt(2025, 5, 2).unwrap());
/// assert_eq!(rows[0].section, defaults.section);
/// assert_eq!(rows[1].task_name, "");
/// ```
pub fn apply_defaults(rows: &[TaskInput], defaults: &Defaults) -> Vec<TaskRow> {
    rows.iter().map(|row| resolve_row(row, defaults)).collect()
}

/// Resolve, drop unnamed rows, and canonicalize the schedule column.
pub fn export_rows(rows: &[TaskInput], defaults: &Defaults) -> Vec<TaskRow> {
    apply_defaults(rows, defaults)
        .into_iter()
        .filter(|row| !row.task_name.is_empty())
        .map(|mut row| {
            row.schedule = schedule::normalize(&row.schedule);
            if !schedule::is_canonical(&row.schedule) {
                log::debug!("schedule {:?} for {:?} kept as typed", row.schedule, row.task_name);
            }
            row
        })
        .collect()
}

fn resolve_row(row: &TaskInput, defaults: &Defaults) -> TaskRow {
    TaskRow {
        due_date: row
            .due_date
            .as_deref()
            .and_then(parse_due_date)
            .unwrap_or(defaults.due_date),
        schedule: text_or_default(&row.schedule, &defaults.schedule),
        section: text_or_default(&row.section, &defaults.section),
        project: text_or_default(&row.project, &defaults.project),
        tag: text_or_default(&row.tag, &defaults.tag),
        task_name: text_or_default(&row.task_name, &defaults.task_name),
        estimated: row
            .estimated
            .as_deref()
            .and_then(parse_estimated)
            .unwrap_or(defaults.estimated),
    }
}

fn text_or_default(value: &Option<String>, default: &str) -> String {
    let text = value.as_deref().unwrap_or("").trim();
    if text.is_empty() {
        default.to_string()
    } else {
        text.to_string()
    }
}
