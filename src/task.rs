use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// Export column order.
pub const COLUMNS: [&str; 7] = [
    "DueDate", "Schedule", "Section", "Project", "Tag", "TaskName", "Estimated",
];

/// Default project applied when the operator has not picked one.
pub const DEFAULT_PROJECT: &str = ". 雑務";
/// Default section (a time-of-day bucket).
pub const DEFAULT_SECTION: &str = "10:00";
/// Default tag.
pub const DEFAULT_TAG: &str = "自分";
/// Default estimate in minutes.
pub const DEFAULT_ESTIMATED: u32 = 5;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// One row as typed into the sheet.
///
/// Every column is optional text; nothing is validated here. The row is turned
/// into a [`TaskRow`] exactly once, by [`crate::defaults::apply_defaults`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskInput {
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub task_name: Option<String>,
    /// Accepts a JSON number or a string.
    #[serde(default, deserialize_with = "number_or_text")]
    pub estimated: Option<String>,
}

/// A fully resolved task, ready for export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskRow {
    pub due_date: NaiveDate,
    pub schedule: String,
    pub section: String,
    pub project: String,
    pub tag: String,
    pub task_name: String,
    pub estimated: u32,
}

/// Values used for blank cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Defaults {
    pub due_date: NaiveDate,
    pub schedule: String,
    pub section: String,
    pub project: String,
    pub tag: String,
    pub task_name: String,
    pub estimated: u32,
}

impl Defaults {
    /// Session defaults: due tomorrow, no schedule, the stock section/project/tag.
    pub fn for_today(today: NaiveDate) -> Self {
        Defaults {
            due_date: today + Duration::days(1),
            schedule: String::new(),
            section: DEFAULT_SECTION.to_string(),
            project: DEFAULT_PROJECT.to_string(),
            tag: DEFAULT_TAG.to_string(),
            task_name: String::new(),
            estimated: DEFAULT_ESTIMATED,
        }
    }

    /// Trim every text field and canonicalize the schedule.
    pub fn normalized(mut self) -> Self {
        self.schedule = crate::schedule::normalize(&self.schedule);
        for field in [
            &mut self.section,
            &mut self.project,
            &mut self.tag,
            &mut self.task_name,
        ] {
            *field = field.trim().to_string();
        }
        self
    }
}

impl TaskInput {
    /// A row whose only content is a task name.
    pub fn named(name: impl Into<String>) -> Self {
        TaskInput {
            task_name: Some(name.into()),
            ..TaskInput::default()
        }
    }

    /// A row pre-filled from `defaults`, used by bulk entry.
    pub fn from_defaults(name: impl Into<String>, defaults: &Defaults) -> Self {
        TaskInput {
            due_date: Some(defaults.due_date.format("%Y-%m-%d").to_string()),
            schedule: Some(defaults.schedule.clone()),
            section: Some(defaults.section.clone()),
            project: Some(defaults.project.clone()),
            tag: Some(defaults.tag.clone()),
            task_name: Some(name.into()),
            estimated: Some(defaults.estimated.to_string()),
        }
    }
}

impl TaskRow {
    /// Cell values in [`COLUMNS`] order, dates as `YYYY/MM/DD`.
    pub fn to_record(&self) -> [String; 7] {
        [
            self.due_date.format("%Y/%m/%d").to_string(),
            self.schedule.clone(),
            self.section.clone(),
            self.project.clone(),
            self.tag.clone(),
            self.task_name.clone(),
            self.estimated.to_string(),
        ]
    }
}

/// Parse a due date cell; `None` when blank or unreadable.
pub fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }

    if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
        return Some(stamp.date_naive());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|stamp| stamp.date())
}

/// Parse an estimate in minutes; `None` when blank, unreadable or negative.
///
/// Fractional input is truncated toward zero (`"12.9"` is 12).
pub fn parse_estimated(raw: &str) -> Option<u32> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(minutes) = text.parse::<u32>() {
        return Some(minutes);
    }

    match text.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 && value <= u32::MAX as f64 => {
            Some(value.trunc() as u32)
        }
        _ => None,
    }
}

fn number_or_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Cell {
        Number(serde_json::Number),
        Text(String),
    }

    Ok(match Option::<Cell>::deserialize(deserializer)? {
        Some(Cell::Number(n)) => Some(n.to_string()),
        Some(Cell::Text(s)) => Some(s),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_date_layouts() {
        let expected = NaiveDate::from_ymd_opt(2025, 4, 9).unwrap();
        assert_eq!(parse_due_date("2025-04-09"), Some(expected));
        assert_eq!(parse_due_date("2025/04/09"), Some(expected));
        assert_eq!(parse_due_date(" 20250409 "), Some(expected));
        assert_eq!(parse_due_date("2025-04-09T13:00:00"), Some(expected));
        assert_eq!(parse_due_date("2025-04-09T13:00:00+09:00"), Some(expected));
        assert_eq!(parse_due_date("next week"), None);
        assert_eq!(parse_due_date(""), None);
        assert_eq!(parse_due_date("2025-02-30"), None);
    }

    #[test]
    fn estimated_values() {
        assert_eq!(parse_estimated("30"), Some(30));
        assert_eq!(parse_estimated(" 15 "), Some(15));
        assert_eq!(parse_estimated("12.9"), Some(12));
        assert_eq!(parse_estimated("-5"), None);
        assert_eq!(parse_estimated("NaN"), None);
        assert_eq!(parse_estimated("abc"), None);
        assert_eq!(parse_estimated(""), None);
    }

    #[test]
    fn input_accepts_numbers_and_text_for_estimate() {
        let rows: Vec<TaskInput> = serde_json::from_str(
            r#"[{"TaskName":"a","Estimated":25},{"TaskName":"b","Estimated":"40"},{"TaskName":"c","Estimated":null},{"TaskName":"d"}]"#,
        )
        .unwrap();
        assert_eq!(rows[0].estimated.as_deref(), Some("25"));
        assert_eq!(rows[1].estimated.as_deref(), Some("40"));
        assert_eq!(rows[2].estimated, None);
        assert_eq!(rows[3].estimated, None);
    }

    #[test]
    fn defaults_for_today_are_due_tomorrow() {
        let today = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        let defaults = Defaults::for_today(today);
        assert_eq!(defaults.due_date, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(defaults.section, DEFAULT_SECTION);
        assert_eq!(defaults.estimated, 5);
    }

    #[test]
    fn record_uses_slash_dates() {
        let row = TaskRow {
            due_date: NaiveDate::from_ymd_opt(2025, 1, 7).unwrap(),
            schedule: "09:30".into(),
            section: "10:00".into(),
            project: ". 重要".into(),
            tag: String::new(),
            task_name: "write report".into(),
            estimated: 45,
        };
        assert_eq!(row.to_record()[0], "2025/01/07");
        assert_eq!(row.to_record()[6], "45");
    }
}
