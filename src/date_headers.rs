// src/date_headers.rs
use chrono::{Datelike, Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::shift_codes::SHIFT_NOT_AVAILABLE;

// --- Month table ---

pub const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

// Lookup order matters for the substring fallback in `detect_month`.
const MONTH_KEYWORDS: [(&str, &str); 23] = [
    ("jan", "Jan"),
    ("january", "Jan"),
    ("feb", "Feb"),
    ("february", "Feb"),
    ("mar", "Mar"),
    ("march", "Mar"),
    ("apr", "Apr"),
    ("april", "Apr"),
    ("may", "May"),
    ("jun", "Jun"),
    ("june", "Jun"),
    ("jul", "Jul"),
    ("july", "Jul"),
    ("aug", "Aug"),
    ("august", "Aug"),
    ("sep", "Sep"),
    ("september", "Sep"),
    ("oct", "Oct"),
    ("october", "Oct"),
    ("nov", "Nov"),
    ("november", "Nov"),
    ("dec", "Dec"),
    ("december", "Dec"),
];

static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-.\s]").expect("valid regex"));
static DAY_AND_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)([a-zA-Z]+)").expect("valid regex"));
static RAW_DAY_AND_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[-.\s]*([a-zA-Z]+)").expect("valid regex"));

fn month_for_keyword(word: &str) -> Option<&'static str> {
    let lower = word.to_lowercase();
    MONTH_KEYWORDS
        .iter()
        .find(|(keyword, _)| *keyword == lower)
        .map(|(_, month)| *month)
}

// --- Normalization ---

/// Canonical `<day><Mon>` form of a spreadsheet date header, e.g. "7-jan" -> "7Jan".
/// Headers whose month word is not recognized come back with separators stripped.
pub fn normalize(header: &str) -> String {
    let stripped = SEPARATORS.replace_all(header, "").into_owned();
    if let Some(caps) = DAY_AND_WORD.captures(&stripped) {
        if let Some(month) = month_for_keyword(&caps[2]) {
            return format!("{}{}", &caps[1], month);
        }
    }
    stripped
}

/// Most frequent month across the headers. Ties go to the month seen first.
pub fn detect_month<S: AsRef<str>>(headers: &[S]) -> Option<&'static str> {
    let mut counts: Vec<(&'static str, usize)> = Vec::new();
    let mut bump = |month: &'static str| match counts.iter_mut().find(|(m, _)| *m == month) {
        Some((_, count)) => *count += 1,
        None => counts.push((month, 1)),
    };

    for header in headers {
        let header = header.as_ref();
        if let Some(caps) = RAW_DAY_AND_WORD.captures(header) {
            if let Some(month) = month_for_keyword(&caps[2]) {
                bump(month);
            }
        } else {
            let lower = header.to_lowercase();
            if let Some((_, month)) = MONTH_KEYWORDS.iter().find(|(k, _)| lower.contains(k)) {
                bump(month);
            }
        }
    }

    let mut best: Option<(&'static str, usize)> = None;
    for (month, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((month, count));
        }
    }
    best.map(|(month, _)| month)
}

/// Normalized headers plus the month they describe.
pub fn parse_headers<S: AsRef<str>>(raw: &[S]) -> (Vec<String>, Option<&'static str>) {
    let normalized = raw.iter().map(|h| normalize(h.as_ref())).collect();
    (normalized, detect_month(raw))
}

// --- Date labels ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateLabels {
    pub today: String,
    pub tomorrow: String,
}

pub fn format_header_date(date: NaiveDate) -> String {
    format!("{}{}", date.day(), MONTH_ABBREVIATIONS[date.month0() as usize])
}

fn find_matching_header(label: &str, headers: &[String]) -> String {
    if headers.iter().any(|h| h == label) {
        return label.to_string();
    }
    let lower = label.to_lowercase();
    if let Some(h) = headers.iter().find(|h| h.to_lowercase() == lower) {
        return h.clone();
    }
    if let Some(h) = headers
        .iter()
        .find(|h| h.contains(label) || label.contains(h.as_str()))
    {
        return h.clone();
    }
    debug!("No matching header for date label {}", label);
    label.to_string()
}

/// Header labels for `today` and the day after, resolved against `headers`.
pub fn date_labels(today: NaiveDate, headers: &[String]) -> DateLabels {
    let tomorrow = today + Duration::days(1);
    DateLabels {
        today: find_matching_header(&format_header_date(today), headers),
        tomorrow: find_matching_header(&format_header_date(tomorrow), headers),
    }
}

/// The trimmed shift stored under `label`, or "N/A".
pub fn shift_for_date(schedule: &[String], label: &str, headers: &[String]) -> String {
    headers
        .iter()
        .position(|h| h == label)
        .and_then(|index| schedule.get(index))
        .map(|shift| shift.trim())
        .filter(|shift| !shift.is_empty())
        .unwrap_or(SHIFT_NOT_AVAILABLE)
        .to_string()
}
