use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::task::DEFAULT_ESTIMATED;

/// Label of the "other" entry in the estimate dropdown.
pub const ESTIMATED_OTHER: &str = "その他";

const DEFAULT_SECTIONS: &[&str] = &[
    "05:00", "07:00", "08:00", "10:00", "11:00", "13:00", "14:00", "16:00", "19:00", "21:00",
    "22:00", "00:00",
];

const DEFAULT_PROJECTS: &[&str] = &[
    ". プロジェクト化",
    ". 重要",
    ". 家のこと",
    ". 改善",
    ". 他",
    ". 情報",
    ". 家族",
    ". 整理",
    ". 勉強",
    ". 娯楽",
    ". オペ-90 臨時",
    ". 雑務",
];

const DEFAULT_TAGS: &[&str] = &["", "電車", "ミーティング", "スキップ", "自分", "会議中", "プログラミング"];

/// Dropdown suggestions for the label columns.
///
/// Mirrors the layout of `list_options.json`:
/// `{"sections": [...], "projects": [...], "tags": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    pub sections: Vec<String>,
    pub projects: Vec<String>,
    pub tags: Vec<String>,
}

impl Default for ListOptions {
    fn default() -> Self {
        ListOptions {
            sections: owned(DEFAULT_SECTIONS),
            projects: owned(DEFAULT_PROJECTS),
            tags: owned(DEFAULT_TAGS),
        }
    }
}

impl ListOptions {
    /// Load suggestions from `path`.
    ///
    /// A missing file, unreadable JSON, or a file where any of the three keys is
    /// not a list of strings all fall back to the built-in lists.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(_) => {
                log::debug!("no list options at {}, using built-in lists", path.display());
                return ListOptions::default();
            }
        };

        match serde_json::from_str::<ListOptions>(&contents) {
            Ok(options) => {
                log::info!(
                    "loaded {} sections, {} projects, {} tags from {}",
                    options.sections.len(),
                    options.projects.len(),
                    options.tags.len(),
                    path.display()
                );
                options
            }
            Err(e) => {
                log::warn!("ignoring {}: {}", path.display(), e);
                ListOptions::default()
            }
        }
    }
}

/// Push `value` (trimmed) unless it is blank or already present.
pub fn add_unique(items: &mut Vec<String>, value: &str) {
    let text = value.trim();
    if !text.is_empty() && !items.iter().any(|item| item == text) {
        items.push(text.to_string());
    }
}

/// Build a dropdown list: a blank entry first, then `base`, then any values
/// already typed into the table that are not in `base`.
pub fn merge_with_current<'a, I>(base: &[String], current: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut merged = vec![String::new()];
    for option in base {
        add_unique(&mut merged, option);
    }
    for value in current {
        add_unique(&mut merged, value);
    }
    merged
}

/// Dropdown labels for the estimate column: 5 to 120 minutes in steps of 5,
/// then [`ESTIMATED_OTHER`].
pub fn estimated_choices() -> Vec<String> {
    (5..=120)
        .step_by(5)
        .map(|minutes: u32| minutes.to_string())
        .chain(std::iter::once(ESTIMATED_OTHER.to_string()))
        .collect()
}

/// Turn a dropdown choice back into minutes.
///
/// The "other" entry takes the free-form number; anything unreadable is 5.
pub fn estimated_from_choice(choice: &str, other: u32) -> u32 {
    if choice == ESTIMATED_OTHER {
        return other;
    }
    choice.trim().parse().unwrap_or(DEFAULT_ESTIMATED)
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_uses_builtins() {
        let options = ListOptions::load("/definitely/not/here/list_options.json");
        assert_eq!(options, ListOptions::default());
        assert!(options.projects.iter().any(|p| p == ". 雑務"));
    }

    #[test]
    fn file_lists_replace_builtins() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"sections":["06:00"],"projects":[". 仕事"],"tags":["",  "家"]}}"#
        )
        .unwrap();

        let options = ListOptions::load(file.path());
        assert_eq!(options.sections, vec!["06:00"]);
        assert_eq!(options.projects, vec![". 仕事"]);
        assert_eq!(options.tags, vec!["", "家"]);
    }

    #[test]
    fn malformed_shape_uses_builtins() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"sections":"06:00","projects":[],"tags":[]}}"#).unwrap();
        assert_eq!(ListOptions::load(file.path()), ListOptions::default());
    }

    #[test]
    fn merge_keeps_order_and_dedupes() {
        let base = vec!["a".to_string(), "b".to_string(), " a ".to_string()];
        let merged = merge_with_current(&base, ["c", "", "b", "  c "]);
        assert_eq!(merged, vec!["", "a", "b", "c"]);
    }

    #[test]
    fn estimate_choices() {
        let choices = estimated_choices();
        assert_eq!(choices.first().map(String::as_str), Some("5"));
        assert_eq!(choices[choices.len() - 2], "120");
        assert_eq!(choices.last().map(String::as_str), Some(ESTIMATED_OTHER));
        assert_eq!(choices.len(), 25);

        assert_eq!(estimated_from_choice("45", 0), 45);
        assert_eq!(estimated_from_choice(ESTIMATED_OTHER, 7), 7);
        assert_eq!(estimated_from_choice("garbage", 7), 5);
    }
}
