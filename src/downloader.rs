use encoding_rs::SHIFT_JIS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::task::{COLUMNS, TaskRow};

/// Suggested file name for exported sheets.
pub const CSV_FILE_NAME: &str = "tasks.csv";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Byte encoding of exported CSV files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CsvEncoding {
    /// UTF-8 with a byte-order mark.
    #[default]
    Utf8Bom,
    /// Shift_JIS (Windows code page 932) for legacy Japanese tooling.
    ShiftJis,
}

impl FromStr for CsvEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8-sig" | "utf8-sig" | "utf-8" | "utf8" => Ok(CsvEncoding::Utf8Bom),
            "shift-jis" | "sjis" | "cp932" | "windows-31j" => Ok(CsvEncoding::ShiftJis),
            other => Err(format!("Unsupported CSV encoding: {}", other)),
        }
    }
}

impl CsvEncoding {
    /// `Content-Type` value for a download in this encoding.
    pub fn content_type(&self) -> &'static str {
        match self {
            CsvEncoding::Utf8Bom => "text/csv; charset=utf-8",
            CsvEncoding::ShiftJis => "text/csv; charset=shift_jis",
        }
    }
}

impl fmt::Display for CsvEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CsvEncoding::Utf8Bom => write!(f, "utf-8-sig"),
            CsvEncoding::ShiftJis => write!(f, "shift_jis"),
        }
    }
}

/// Convert resolved tasks to CSV text
///
/// The header row is the fixed column list (`DueDate,Schedule,...`). Fields that
/// contain a comma, quote or line break are quoted with embedded quotes doubled.
///
/// # Examples
/// ```
/// use tasksheet::downloader::to_csv;
///
/// let csv = to_csv(&[]);
/// assert_eq!(csv, "DueDate,Schedule,Section,Project,Tag,TaskName,Estimated\n");
/// ```
pub fn to_csv(rows: &[TaskRow]) -> String {
    let mut csv_content = String::new();

    push_record(&mut csv_content, COLUMNS.iter().copied());
    for row in rows {
        let record = row.to_record();
        push_record(&mut csv_content, record.iter().map(String::as_str));
    }

    csv_content
}

/// Encode CSV text into file bytes
///
/// Characters the target encoding cannot represent become `?`; encoding never fails.
pub fn encode_csv(text: &str, encoding: CsvEncoding) -> Vec<u8> {
    match encoding {
        CsvEncoding::Utf8Bom => {
            let mut bytes = Vec::with_capacity(UTF8_BOM.len() + text.len());
            bytes.extend_from_slice(UTF8_BOM);
            bytes.extend_from_slice(text.as_bytes());
            bytes
        }
        CsvEncoding::ShiftJis => {
            let (encoded, _, had_errors) = SHIFT_JIS.encode(text);
            if !had_errors {
                return encoded.into_owned();
            }

            // Re-encode one character at a time so unmappable ones become '?'.
            let mut bytes = Vec::with_capacity(text.len());
            let mut buf = [0u8; 4];
            for c in text.chars() {
                let (encoded, _, unmappable) = SHIFT_JIS.encode(c.encode_utf8(&mut buf));
                if unmappable {
                    bytes.push(b'?');
                } else {
                    bytes.extend_from_slice(&encoded);
                }
            }
            bytes
        }
    }
}

/// Resolved tasks straight to file bytes.
pub fn export_csv(rows: &[TaskRow], encoding: CsvEncoding) -> Vec<u8> {
    encode_csv(&to_csv(rows), encoding)
}

fn push_record<'a>(csv_content: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, value) in fields.enumerate() {
        if i > 0 {
            csv_content.push(',');
        }
        if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
            let escaped = value.replace('"', "\"\"");
            csv_content.push('"');
            csv_content.push_str(&escaped);
            csv_content.push('"');
        } else {
            csv_content.push_str(value);
        }
    }
    csv_content.push('\n');
}
