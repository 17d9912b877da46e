use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;

lazy_static! {
    static ref DIGIT_TIME_REGEX: Regex = Regex::new(r"^[0-9]{3,4}$").unwrap();
    static ref ALL_DIGITS_REGEX: Regex = Regex::new(r"^[0-9]+$").unwrap();
    static ref HOUR_MERIDIEM_REGEX: Regex = Regex::new(r"(?i)^([0-9]{1,2})\s*([ap])\.?m\.?$").unwrap();
    static ref KANJI_TIME_REGEX: Regex = Regex::new(r"^([0-9]{1,2})時(?:([0-9]{1,2})分)?$").unwrap();
}

const TIME_FORMATS: &[&str] = &[
    "%H:%M",
    "%H:%M:%S",
    "%H:%M:%S%.f",
    "%I:%M %p",
    "%I:%M%p",
    "%I:%M:%S %p",
    "%I:%M:%S%p",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

/// Normalize a free-form time entry to `HH:MM`.
///
/// Blank input and `"none"` (any case) become the empty string. A run of 3 or 4
/// digits is read positionally (`930` is 09:30, `1725` is 17:25). Anything else
/// goes through a set of time, date-time and date layouts. Full-width digits
/// (`１７２５`, as typed through a Japanese IME) are read like ASCII ones.
///
/// # Arguments
/// * `raw` - The cell text as entered
///
/// # Returns
/// `HH:MM`, the empty string, or, when nothing can parse it, the input trimmed
/// but otherwise untouched. Callers must accept values that are not canonical.
///
/// # Examples
/// ```
/// use tasksheet::schedule::normalize;
///
/// assert_eq!(normalize("1725"), "17:25");
/// assert_eq!(normalize("930"), "09:30");
/// assert_eq!(normalize("１７２５"), "17:25");
/// assert_eq!(normalize(" None "), "");
/// assert_eq!(normalize("2599"), "2599");
/// ```
pub fn normalize(raw: &str) -> String {
    let text = raw.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("none") {
        return String::new();
    }

    let folded = fold_wide_digits(text);

    if let Some(time) = parse_digit_time(&folded) {
        return format_hhmm(time);
    }

    // Leftover digit runs ("2599", "12345") would read as years; keep them as typed.
    if ALL_DIGITS_REGEX.is_match(&folded) {
        return text.to_string();
    }

    match parse_generic_time(&folded) {
        Some(time) => format_hhmm(time),
        None => text.to_string(),
    }
}

/// Normalize every entry of a column, keeping order and positions.
pub fn normalize_all<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|value| normalize(value.as_ref()))
        .collect()
}

/// `true` when `value` is already in canonical `HH:MM` form (or empty).
pub fn is_canonical(value: &str) -> bool {
    value.is_empty()
        || (value.len() == 5 && NaiveTime::parse_from_str(value, "%H:%M").is_ok() && value.as_bytes()[2] == b':')
}

/// Full-width digits (U+FF10..=U+FF19) to ASCII; other characters are kept.
fn fold_wide_digits(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|c| ('０'..='９').contains(&c)) {
        return Cow::Borrowed(text);
    }

    text.chars()
        .map(|c| match c {
            '０'..='９' => char::from(b'0' + (c as u32 - '０' as u32) as u8),
            other => other,
        })
        .collect()
}

fn parse_digit_time(text: &str) -> Option<NaiveTime> {
    if !DIGIT_TIME_REGEX.is_match(text) {
        return None;
    }

    let split = if text.len() == 3 { 1 } else { 2 };
    let hour: u32 = text[..split].parse().ok()?;
    let minute: u32 = text[split..].parse().ok()?;

    if hour <= 23 && minute <= 59 {
        NaiveTime::from_hms_opt(hour, minute, 0)
    } else {
        None
    }
}

fn parse_generic_time(text: &str) -> Option<NaiveTime> {
    for format in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(text, format) {
            return Some(time);
        }
    }

    if let Some(caps) = HOUR_MERIDIEM_REGEX.captures(text) {
        let hour: u32 = caps[1].parse().ok()?;
        if (1..=12).contains(&hour) {
            let pm = caps[2].eq_ignore_ascii_case("p");
            let hour24 = match (hour, pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, false) => h,
                (h, true) => h + 12,
            };
            return NaiveTime::from_hms_opt(hour24, 0, 0);
        }
    }

    if let Some(caps) = KANJI_TIME_REGEX.captures(text) {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
        return NaiveTime::from_hms_opt(hour, minute, 0);
    }

    // Offsets are ignored: the wall-clock time as written is what the user meant.
    if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
        return Some(stamp.time());
    }

    for format in DATETIME_FORMATS {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(text, format) {
            return Some(stamp.time());
        }
    }

    for format in DATE_FORMATS {
        if NaiveDate::parse_from_str(text, format).is_ok() {
            return NaiveTime::from_hms_opt(0, 0, 0);
        }
    }

    None
}

fn format_hhmm(time: NaiveTime) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}
