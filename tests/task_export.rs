use chrono::NaiveDate;
use tasksheet::downloader::{CsvEncoding, export_csv, to_csv};
use tasksheet::options::{ListOptions, estimated_choices, estimated_from_choice};
use tasksheet::schedule;
use tasksheet::{Defaults, TaskInput, TaskSheet};

fn defaults() -> Defaults {
    Defaults::for_today(NaiveDate::from_ymd_opt(2025, 5, 1).unwrap())
}

fn row(name: &str) -> TaskInput {
    TaskInput::named(name)
}

#[test]
fn schedule_column_is_normalized_idempotently() {
    let inputs = [
        "1725", "930", "0900", "", "none", "NONE", "2599", "17:25", "9:05", "5pm", "7:30 PM", "14時",
        "8時15分", "2025-01-01 06:45:00", "lunch",
    ];
    let once = schedule::normalize_all(inputs);
    let twice = schedule::normalize_all(&once);
    assert_eq!(once, twice);

    assert_eq!(&once[..7], ["17:25", "09:30", "09:00", "", "", "", "2599"]);
    assert_eq!(once[14], "lunch");
    println!("✓ {} schedule inputs normalized idempotently", inputs.len());
}

#[test]
fn blank_cells_take_defaults_and_unnamed_rows_are_dropped() {
    let mut sheet = TaskSheet::new();
    sheet.replace_rows(vec![
        TaskInput {
            schedule: Some("930".into()),
            estimated: Some("30".into()),
            ..row("買い物")
        },
        TaskInput {
            project: Some(". 重要".into()),
            ..row("   ")
        },
        TaskInput {
            due_date: Some("2025/06/10".into()),
            section: Some("13:00".into()),
            tag: Some("電車".into()),
            estimated: Some("abc".into()),
            ..row("資料作成")
        },
    ]);

    let csv = to_csv(&sheet.export(&defaults()));
    assert_eq!(
        csv,
        "DueDate,Schedule,Section,Project,Tag,TaskName,Estimated\n\
         2025/05/02,09:30,10:00,. 雑務,自分,買い物,30\n\
         2025/06/10,,13:00,. 雑務,電車,資料作成,5\n"
    );
}

#[test]
fn default_task_name_fills_blank_names() {
    let mut defaults = defaults();
    defaults.task_name = "定例".into();

    let mut sheet = TaskSheet::new();
    sheet.replace_rows(vec![TaskInput::default(), row("")]);
    let rows = sheet.export(&defaults);
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.task_name == "定例"));
}

#[test]
fn bulk_entry_then_shift_jis_export() {
    let mut sheet = TaskSheet::new();
    assert_eq!(sheet.append_lines("洗濯\n\n掃除\n", &defaults()), 2);

    let bytes = export_csv(&sheet.export(&defaults()), CsvEncoding::ShiftJis);
    assert!(bytes.starts_with(b"DueDate,Schedule"));
    assert!(!bytes.starts_with(b"\xEF\xBB\xBF"));

    let utf8 = export_csv(&sheet.export(&defaults()), CsvEncoding::Utf8Bom);
    assert!(utf8.starts_with(b"\xEF\xBB\xBF"));
    assert!(String::from_utf8_lossy(&utf8).contains("掃除"));
}

#[test]
fn estimate_dropdown() {
    let choices = estimated_choices();
    assert_eq!(choices.first().map(String::as_str), Some("5"));
    assert_eq!(choices.last().map(String::as_str), Some("その他"));
    assert_eq!(estimated_from_choice("45", 0), 45);
    assert_eq!(estimated_from_choice("その他", 200), 200);
    assert_eq!(estimated_from_choice("?", 200), 5);
}

#[test]
fn suggestions_fall_back_when_file_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let options = ListOptions::load(dir.path().join("missing.json"));
    assert_eq!(options, ListOptions::default());
}
