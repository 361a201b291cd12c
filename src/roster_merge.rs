// src/roster_merge.rs
use tracing::{debug, info, warn};

use crate::roster::{Dataset, Employee};
use crate::sheet_parser::MonthImport;

// --- Multi-sheet merge ---

/// Merges parsed sheets (in source order) into one dataset over the union of
/// their headers. Employees are global by id: a later sheet fills cells of the
/// employee created by an earlier one, whatever team it lists them under.
pub fn merge_sources(sources: &[Dataset]) -> Dataset {
    let mut merged = Dataset::default();
    for source in sources {
        for header in &source.headers {
            if !merged.headers.contains(header) {
                merged.headers.push(header.clone());
            }
        }
    }
    let width = merged.headers.len();

    for source in sources {
        let global_index: Vec<Option<usize>> = source
            .headers
            .iter()
            .map(|h| merged.header_index(h))
            .collect();

        for team in source.teams.iter() {
            merged.teams.entry(&team.name);

            for row in &team.employees {
                if let Some((owner, existing)) = merged.teams.find_employee_mut(&row.id) {
                    if owner != team.name {
                        warn!(
                            "Employee {} listed under '{}' is already merged into '{}'; keeping '{}'",
                            row.id, team.name, owner, owner
                        );
                    }
                    existing.pad_schedule(width);
                    for (i, shift) in row.schedule.iter().enumerate() {
                        if let Some(Some(global)) = global_index.get(i) {
                            if !shift.is_empty() {
                                existing.schedule[*global] = shift.clone();
                            }
                        }
                    }
                } else {
                    let mut schedule = vec![String::new(); width];
                    for (i, shift) in row.schedule.iter().enumerate() {
                        if let Some(Some(global)) = global_index.get(i) {
                            schedule[*global] = shift.clone();
                        }
                    }
                    merged.teams.entry(&team.name).push(Employee::new(
                        &row.id,
                        &row.name,
                        &team.name,
                        schedule,
                    ));
                }
            }
        }
    }

    merged.stamp_teams();
    info!(
        "Merged {} sources: {} dates, {} teams, {} employees",
        sources.len(),
        merged.headers.len(),
        merged.teams.len(),
        merged.teams.employee_count()
    );
    merged
}

// --- Month import ---

/// Folds an uploaded month into `synced`: columns of the detected month are
/// dropped from the header list and from every schedule, the imported columns
/// are appended, and imported cells are written by header.
pub fn merge_month_import(synced: &mut Dataset, import: &MonthImport) {
    let month_lower = import.month.to_lowercase();
    let keep: Vec<usize> = synced
        .headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !h.to_lowercase().contains(&month_lower))
        .map(|(i, _)| i)
        .collect();
    let replaced = synced.headers.len() - keep.len();
    if replaced > 0 {
        debug!("Replacing {} existing {} columns", replaced, import.month);
    }

    let mut headers: Vec<String> = keep.iter().map(|&i| synced.headers[i].clone()).collect();
    for header in &import.dataset.headers {
        if !headers.contains(header) {
            headers.push(header.clone());
        }
    }
    let width = headers.len();

    for team in synced.teams.iter_mut() {
        for employee in team.employees.iter_mut() {
            let mut schedule: Vec<String> = keep
                .iter()
                .map(|&i| employee.schedule.get(i).cloned().unwrap_or_default())
                .collect();
            schedule.resize(width, String::new());
            employee.schedule = schedule;
        }
    }
    synced.headers = headers;

    let columns: Vec<Option<usize>> = import
        .dataset
        .headers
        .iter()
        .map(|h| synced.header_index(h))
        .collect();

    for team in import.dataset.teams.iter() {
        for row in &team.employees {
            if synced.teams.locate(&row.id).is_none() {
                synced.teams.entry(&team.name).push(Employee::new(
                    &row.id,
                    &row.name,
                    &team.name,
                    vec![String::new(); width],
                ));
            }
            let Some((_, target)) = synced.teams.find_employee_mut(&row.id) else {
                continue;
            };
            target.pad_schedule(width);
            for (i, shift) in row.schedule.iter().enumerate() {
                if let Some(Some(column)) = columns.get(i) {
                    target.schedule[*column] = shift.clone();
                }
            }
        }
    }

    synced.stamp_teams();
    info!(
        "Imported {} roster: {} teams, {} total dates",
        import.month,
        import.dataset.teams.len(),
        synced.headers.len()
    );
}
