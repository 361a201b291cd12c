// src/sheet_parser.rs
use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;
use tracing::{debug, warn};

use crate::date_headers::{self, normalize};
use crate::roster::{Dataset, Employee};

pub const MIN_ROWS: usize = 3;
/// Team, Name and ID come first; dates start at the fourth column.
const FIRST_SHIFT_COLUMN: usize = 3;

#[derive(Error, Debug)]
pub enum SheetParseError {
    #[error("CSV file does not contain enough data (found {rows} rows, need at least {MIN_ROWS})")]
    TooFewRows { rows: usize },

    #[error("Could not detect month from date headers: {headers:?}")]
    MonthNotDetected { headers: Vec<String> },

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),
}

fn read_records(csv_text: &str) -> Result<Vec<StringRecord>, SheetParseError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(csv_text.as_bytes());

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) && record.len() <= 1 {
            continue;
        }
        records.push(record);
    }
    Ok(records)
}

fn cell(record: &StringRecord, index: usize) -> &str {
    record.get(index).unwrap_or("")
}

fn shifts_from(record: &StringRecord, width: usize) -> Vec<String> {
    let mut shifts: Vec<String> = record
        .iter()
        .skip(FIRST_SHIFT_COLUMN)
        .take(width)
        .map(str::to_string)
        .collect();
    shifts.resize(width, String::new());
    shifts
}

// --- Published spreadsheet export ---

/// Parses one published sheet: a title row, a row of date headers, then
/// `team,name,id,shift...` rows where a blank team continues the previous one.
pub fn parse_sheet(csv_text: &str) -> Result<Dataset, SheetParseError> {
    let records = read_records(csv_text)?;
    if records.len() < MIN_ROWS {
        return Err(SheetParseError::TooFewRows {
            rows: records.len(),
        });
    }

    let headers: Vec<String> = records[1]
        .iter()
        .skip(FIRST_SHIFT_COLUMN)
        .map(|h| normalize(h.replace('"', "").trim()))
        .collect();

    let mut dataset = Dataset {
        headers,
        ..Default::default()
    };
    let width = dataset.headers.len();
    let mut current_team = String::new();

    for (row_number, record) in records.iter().enumerate().skip(2) {
        if record.len() < FIRST_SHIFT_COLUMN + 1 {
            debug!("Skipping short row {} ({} columns)", row_number + 1, record.len());
            continue;
        }
        let team = cell(record, 0);
        if !team.is_empty() {
            current_team = team.to_string();
            dataset.teams.entry(&current_team);
        }

        let (name, id) = (cell(record, 1), cell(record, 2));
        if name.is_empty() || id.is_empty() {
            continue;
        }
        if current_team.is_empty() {
            warn!(
                "Skipping employee {} on row {}: no team seen yet",
                id,
                row_number + 1
            );
            continue;
        }
        dataset.teams.entry(&current_team).push(Employee::new(
            id,
            name,
            &current_team,
            shifts_from(record, width),
        ));
    }

    Ok(dataset)
}

// --- Admin CSV upload ---

#[derive(Debug, Clone)]
pub struct MonthImport {
    pub month: &'static str,
    pub dataset: Dataset,
}

/// Parses an uploaded roster: date headers on the first row (blank header cells
/// are dropped), an optional blank second row, and rows carrying team, name and id.
pub fn parse_upload(csv_text: &str) -> Result<MonthImport, SheetParseError> {
    let records = read_records(csv_text)?;
    if records.len() < MIN_ROWS {
        return Err(SheetParseError::TooFewRows {
            rows: records.len(),
        });
    }

    let raw_headers: Vec<String> = records[0]
        .iter()
        .skip(FIRST_SHIFT_COLUMN)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect();
    let (headers, month) = date_headers::parse_headers(&raw_headers);
    let Some(month) = month else {
        return Err(SheetParseError::MonthNotDetected {
            headers: raw_headers,
        });
    };

    let mut dataset = Dataset {
        headers,
        ..Default::default()
    };
    let width = dataset.headers.len();

    for (row_number, record) in records.iter().enumerate().skip(1) {
        if record.len() < FIRST_SHIFT_COLUMN + 1 {
            continue;
        }
        let (team, name, id) = (cell(record, 0), cell(record, 1), cell(record, 2));
        if team.is_empty() || name.is_empty() || id.is_empty() {
            if row_number > 1 {
                debug!("Skipping upload row {}: team, name and id are required", row_number + 1);
            }
            continue;
        }
        dataset
            .teams
            .entry(team)
            .push(Employee::new(id, name, team, shifts_from(record, width)));
    }

    Ok(MonthImport { month, dataset })
}
