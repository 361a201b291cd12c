// src/reconciler.rs
use thiserror::Error;
use tracing::{debug, info};

use crate::roster::{Dataset, Employee};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("Team '{0}' not found")]
    TeamNotFound(String),

    #[error("Employee {0} not found")]
    EmployeeNotFound(String),

    #[error("Employee id {0} already exists")]
    DuplicateEmployee(String),

    #[error("Date index {index} out of range. Schedule length: {len}")]
    DateIndexOutOfRange { index: usize, len: usize },
}

fn require(value: &str, field: &'static str) -> Result<(), RosterError> {
    if value.trim().is_empty() {
        return Err(RosterError::MissingField { field });
    }
    Ok(())
}

// --- Reconciliation ---

/// Builds the display tier: synced teams overridden wholesale by overlay teams,
/// restricted to the teams the overlay knows about. An overlay without teams
/// (or an empty synced tier) passes the overlay through unchanged.
pub fn reconcile(synced: &Dataset, overlay: &Dataset) -> Dataset {
    let mut display = if overlay.teams.is_empty() || synced.is_empty() {
        overlay.clone()
    } else {
        let mut display = synced.clone();
        for team in overlay.teams.iter() {
            display.teams.insert(&team.name, team.employees.clone());
        }
        display.teams.retain(|t| overlay.teams.contains(&t.name));
        display
    };
    display.stamp_teams();
    let (team_count, employee_count) = (display.teams.len(), display.teams.employee_count());
    debug!(
        "Reconciled display: {} teams, {} employees",
        team_count,
        employee_count
    );
    display
}

/// Folds a fresh sync into the overlay. An empty overlay becomes a copy of
/// `synced`; otherwise admin edits are kept, the overlay is realigned to the
/// synced header list and employees it has never seen are appended.
pub fn absorb_sync(overlay: &mut Dataset, synced: &Dataset) {
    if overlay.is_empty() {
        *overlay = synced.clone();
        info!("Overlay seeded from synced data");
        return;
    }

    if overlay.headers != synced.headers {
        let old_headers = std::mem::take(&mut overlay.headers);
        for team in overlay.teams.iter_mut() {
            for employee in team.employees.iter_mut() {
                let fallback = synced.teams.find_employee(&employee.id).map(|(_, e)| e);
                employee.schedule = synced
                    .headers
                    .iter()
                    .enumerate()
                    .map(|(i, header)| {
                        old_headers
                            .iter()
                            .position(|h| h == header)
                            .and_then(|old| employee.schedule.get(old).cloned())
                            .or_else(|| fallback.and_then(|f| f.schedule.get(i).cloned()))
                            .unwrap_or_default()
                    })
                    .collect();
            }
        }
        overlay.headers = synced.headers.clone();
        debug!("Overlay realigned to {} headers", overlay.headers.len());
    }

    let mut added = 0;
    for team in synced.teams.iter() {
        overlay.teams.entry(&team.name);
        for employee in &team.employees {
            if overlay.teams.locate(&employee.id).is_none() {
                overlay.teams.entry(&team.name).push(employee.clone());
                added += 1;
            }
        }
    }
    overlay.stamp_teams();
    info!("Overlay absorbed sync: {} new employees", added);
}

// --- Overlay edits ---

/// Adds an empty team. Returns false when it already exists.
pub fn add_team(overlay: &mut Dataset, name: &str) -> Result<bool, RosterError> {
    require(name, "Team name")?;
    if overlay.teams.contains(name) {
        return Ok(false);
    }
    overlay.teams.entry(name);
    Ok(true)
}

pub fn rename_team(overlay: &mut Dataset, old_name: &str, new_name: &str) -> Result<(), RosterError> {
    require(new_name, "Team name")?;
    require(old_name, "Old team name")?;
    if !overlay.teams.rename(old_name, new_name) {
        return Err(RosterError::TeamNotFound(old_name.to_string()));
    }
    overlay.stamp_teams();
    Ok(())
}

pub fn delete_team(overlay: &mut Dataset, name: &str) -> Result<Vec<Employee>, RosterError> {
    require(name, "Team name")?;
    overlay
        .teams
        .remove(name)
        .ok_or_else(|| RosterError::TeamNotFound(name.to_string()))
}

#[derive(Debug, Clone, Default)]
pub struct EmployeeDraft {
    pub id: String,
    pub name: String,
    pub team: String,
    /// Identity before an edit; defaults to `id` / `team`.
    pub old_id: Option<String>,
    pub old_team: Option<String>,
}

impl EmployeeDraft {
    fn validate(&self) -> Result<(), RosterError> {
        require(&self.name, "Name")?;
        require(&self.id, "ID")?;
        require(&self.team, "Team")
    }
}

/// Appends a new employee with a blank schedule sized to the overlay headers.
pub fn add_employee(overlay: &mut Dataset, draft: &EmployeeDraft) -> Result<(), RosterError> {
    draft.validate()?;
    if overlay.teams.locate(&draft.id).is_some() {
        return Err(RosterError::DuplicateEmployee(draft.id.clone()));
    }
    let schedule = vec![String::new(); overlay.headers.len()];
    overlay
        .teams
        .entry(&draft.team)
        .push(Employee::new(&draft.id, &draft.name, &draft.team, schedule));
    Ok(())
}

/// Renames, re-keys and/or moves an employee. The employee is looked up by its
/// old id in its old team first, then anywhere in the overlay.
pub fn edit_employee(overlay: &mut Dataset, draft: &EmployeeDraft) -> Result<(), RosterError> {
    draft.validate()?;
    let old_id = draft.old_id.as_deref().unwrap_or(&draft.id);
    let old_team = draft.old_team.as_deref().unwrap_or(&draft.team);

    let location = overlay
        .teams
        .get(old_team)
        .and_then(|members| members.iter().position(|e| e.id == old_id))
        .map(|pos| (old_team.to_string(), pos))
        .or_else(|| {
            overlay
                .teams
                .locate(old_id)
                .map(|(team, pos)| (team.to_string(), pos))
        });
    let Some((team_name, position)) = location else {
        return Err(RosterError::EmployeeNotFound(old_id.to_string()));
    };

    if draft.id != old_id {
        if let Some((holder, _)) = overlay.teams.locate(&draft.id) {
            debug!("Rejecting id change {} -> {} (held in {})", old_id, draft.id, holder);
            return Err(RosterError::DuplicateEmployee(draft.id.clone()));
        }
    }

    let members = overlay
        .teams
        .get_mut(&team_name)
        .ok_or_else(|| RosterError::TeamNotFound(team_name.clone()))?;
    if team_name == draft.team {
        let employee = &mut members[position];
        employee.name = draft.name.clone();
        employee.id = draft.id.clone();
    } else {
        let mut employee = members.remove(position);
        employee.name = draft.name.clone();
        employee.id = draft.id.clone();
        employee.current_team = draft.team.clone();
        overlay.teams.entry(&draft.team).push(employee);
    }
    Ok(())
}

pub fn delete_employee(overlay: &mut Dataset, employee_id: &str) -> Result<Employee, RosterError> {
    require(employee_id, "Employee ID")?;
    let (team_name, position) = overlay
        .teams
        .locate(employee_id)
        .map(|(team, pos)| (team.to_string(), pos))
        .ok_or_else(|| RosterError::EmployeeNotFound(employee_id.to_string()))?;
    let members = overlay
        .teams
        .get_mut(&team_name)
        .ok_or_else(|| RosterError::TeamNotFound(team_name.clone()))?;
    Ok(members.remove(position))
}

/// Result of overwriting one schedule cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellWrite {
    pub employee_name: String,
    pub team_name: String,
    pub date_header: String,
    pub old_shift: String,
    pub new_shift: String,
}

impl CellWrite {
    pub fn changed(&self) -> bool {
        self.old_shift != self.new_shift
    }
}

/// Overwrites `schedule[date_index]` of an employee found anywhere in `dataset`.
pub fn write_cell(
    dataset: &mut Dataset,
    employee_id: &str,
    date_index: usize,
    new_shift: &str,
) -> Result<CellWrite, RosterError> {
    let date_header = dataset
        .headers
        .get(date_index)
        .cloned()
        .unwrap_or_else(|| format!("Date_{}", date_index));
    let (team_name, employee) = dataset
        .teams
        .find_employee_mut(employee_id)
        .ok_or_else(|| RosterError::EmployeeNotFound(employee_id.to_string()))?;
    let len = employee.schedule.len();
    let cell = employee
        .schedule
        .get_mut(date_index)
        .ok_or(RosterError::DateIndexOutOfRange {
            index: date_index,
            len,
        })?;
    let old_shift = std::mem::replace(cell, new_shift.to_string());
    Ok(CellWrite {
        employee_name: employee.name.clone(),
        team_name: team_name.to_string(),
        date_header,
        old_shift,
        new_shift: new_shift.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(headers: &[&str], teams: &[(&str, &[(&str, &[&str])])]) -> Dataset {
        let mut data = Dataset {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            ..Default::default()
        };
        for (team, members) in teams {
            let list = data.teams.entry(team);
            for (id, shifts) in members.iter() {
                list.push(Employee::new(
                    id,
                    &format!("Name {}", id),
                    team,
                    shifts.iter().map(|s| s.to_string()).collect(),
                ));
            }
        }
        data
    }

    fn draft(id: &str, name: &str, team: &str) -> EmployeeDraft {
        EmployeeDraft {
            id: id.into(),
            name: name.into(),
            team: team.into(),
            ..Default::default()
        }
    }

    #[test]
    fn empty_overlay_passes_through() {
        let synced = dataset(&["1Jan"], &[("A", &[("E1", &["M2"])])]);
        let overlay = Dataset {
            headers: vec!["9Feb".into()],
            ..Default::default()
        };
        let display = reconcile(&synced, &overlay);
        assert_eq!(display, overlay);
        assert!(display.all_employees().is_empty());
    }

    #[test]
    fn overlay_copy_of_synced_reproduces_synced() {
        let mut synced = dataset(
            &["1Jan", "2Jan"],
            &[("A", &[("E1", &["M2", "DO"])]), ("B", &[("E2", &["D1", "D2"])])],
        );
        synced.stamp_teams();
        let display = reconcile(&synced, &synced.clone());
        assert_eq!(display, synced);
        let all = display.all_employees();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].current_team, "B");
    }

    #[test]
    fn overlay_team_replaces_synced_team_and_missing_teams_drop() {
        let synced = dataset(
            &["1Jan"],
            &[("A", &[("E1", &["M2"])]), ("B", &[("E2", &["D1"])])],
        );
        let overlay = dataset(&["1Jan"], &[("A", &[("E1", &["SL"]), ("E5", &["M4"])]), ("New", &[])]);

        let display = reconcile(&synced, &overlay);
        assert_eq!(display.teams.names().collect::<Vec<_>>(), vec!["A", "New"]);
        assert_eq!(display.teams.get("A").unwrap().len(), 2);
        assert_eq!(display.teams.find_employee("E1").unwrap().1.schedule, vec!["SL"]);
        assert!(display.teams.find_employee("E2").is_none());
    }

    #[test]
    fn absorb_seeds_empty_overlay() {
        let synced = dataset(&["1Jan"], &[("A", &[("E1", &["M2"])])]);
        let mut overlay = Dataset::default();
        absorb_sync(&mut overlay, &synced);
        assert_eq!(overlay, synced);
    }

    #[test]
    fn absorb_keeps_edits_and_realigns_headers() {
        let synced = dataset(
            &["1Jan", "2Jan", "1Feb"],
            &[("A", &[("E1", &["M2", "M2", "D1"]), ("E2", &["M3", "M3", "M3"])])],
        );
        let mut overlay = dataset(&["1Jan", "2Jan"], &[("Moved", &[("E1", &["SL", "M2"])])]);

        absorb_sync(&mut overlay, &synced);

        assert_eq!(overlay.headers, synced.headers);
        let (team, e1) = overlay.teams.find_employee("E1").unwrap();
        assert_eq!(team, "Moved");
        assert_eq!(e1.schedule, vec!["SL", "M2", "D1"]);
        assert_eq!(overlay.teams.get("A").unwrap().len(), 1);
        assert_eq!(overlay.teams.employee_count(), 2);
    }

    #[test]
    fn team_edits() {
        let mut overlay = dataset(&[], &[("A", &[("E1", &[])])]);
        assert_eq!(add_team(&mut overlay, "B"), Ok(true));
        assert_eq!(add_team(&mut overlay, "B"), Ok(false));
        assert_eq!(
            add_team(&mut overlay, "  "),
            Err(RosterError::MissingField { field: "Team name" })
        );

        rename_team(&mut overlay, "A", "Alpha").unwrap();
        assert_eq!(overlay.teams.find_employee("E1").unwrap().1.current_team, "Alpha");
        assert_eq!(
            rename_team(&mut overlay, "Nope", "X"),
            Err(RosterError::TeamNotFound("Nope".into()))
        );

        assert_eq!(delete_team(&mut overlay, "Alpha").unwrap().len(), 1);
        assert!(delete_team(&mut overlay, "Alpha").is_err());
    }

    #[test]
    fn add_employee_sizes_schedule_and_rejects_duplicates() {
        let mut overlay = dataset(&["1Jan", "2Jan"], &[("A", &[("E1", &["M2", "M2"])])]);
        add_employee(&mut overlay, &draft("E2", "Two", "B")).unwrap();
        assert_eq!(overlay.teams.get("B").unwrap()[0].schedule, vec!["", ""]);

        assert_eq!(
            add_employee(&mut overlay, &draft("E1", "Again", "B")),
            Err(RosterError::DuplicateEmployee("E1".into()))
        );
        assert_eq!(
            add_employee(&mut overlay, &draft("E3", "", "B")),
            Err(RosterError::MissingField { field: "Name" })
        );
    }

    #[test]
    fn edit_employee_moves_between_teams() {
        let mut overlay = dataset(&["1Jan"], &[("A", &[("E1", &["M2"])]), ("B", &[])]);
        let mut edit = draft("E1", "Renamed", "B");
        edit.old_team = Some("A".into());
        edit_employee(&mut overlay, &edit).unwrap();

        assert!(overlay.teams.get("A").unwrap().is_empty());
        let moved = &overlay.teams.get("B").unwrap()[0];
        assert_eq!(moved.name, "Renamed");
        assert_eq!(moved.schedule, vec!["M2"]);
    }

    #[test]
    fn edit_employee_falls_back_to_global_search_and_changes_id() {
        let mut overlay = dataset(&["1Jan"], &[("A", &[("E1", &["M2"])]), ("B", &[("E2", &["D1"])])]);
        let mut edit = draft("E10", "Ten", "A");
        edit.old_id = Some("E1".into());
        edit.old_team = Some("Wrong".into());
        edit_employee(&mut overlay, &edit).unwrap();
        assert_eq!(overlay.teams.locate("E10"), Some(("A", 0)));

        let mut clash = draft("E2", "Clash", "A");
        clash.old_id = Some("E10".into());
        assert_eq!(
            edit_employee(&mut overlay, &clash),
            Err(RosterError::DuplicateEmployee("E2".into()))
        );

        assert_eq!(
            edit_employee(&mut overlay, &draft("E99", "Ghost", "A")),
            Err(RosterError::EmployeeNotFound("E99".into()))
        );
    }

    #[test]
    fn delete_employee_by_id_anywhere() {
        let mut overlay = dataset(&[], &[("A", &[("E1", &[])]), ("B", &[("E2", &[])])]);
        assert_eq!(delete_employee(&mut overlay, "E2").unwrap().id, "E2");
        assert_eq!(
            delete_employee(&mut overlay, "E2"),
            Err(RosterError::EmployeeNotFound("E2".into()))
        );
    }

    #[test]
    fn write_cell_reports_transition_and_bounds() {
        let mut overlay = dataset(&["1Jan", "2Jan"], &[("A", &[("E1", &["M2", "M2"])])]);
        let write = write_cell(&mut overlay, "E1", 1, "SL").unwrap();
        assert_eq!(write.old_shift, "M2");
        assert_eq!(write.date_header, "2Jan");
        assert!(write.changed());
        assert_eq!(
            write_cell(&mut overlay, "E1", 2, "SL"),
            Err(RosterError::DateIndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            write_cell(&mut overlay, "E7", 0, "SL"),
            Err(RosterError::EmployeeNotFound("E7".into()))
        );
    }
}
