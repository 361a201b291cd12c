// src/roster_state.rs
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::date_headers::{date_labels, shift_for_date, DateLabels, MONTH_ABBREVIATIONS};
use crate::modification_ledger::{month_key, Modification, ModificationLedger, MonthlyReport, ShiftEdit};
use crate::reconciler::{absorb_sync, reconcile, write_cell, CellWrite, RosterError};
use crate::roster::{Dataset, Employee};
use crate::roster_merge::{merge_month_import, merge_sources};
use crate::schedule_requests::{
    team_members, RequestError, RequestStats, RequestStatus, RequestStore, ScheduleRequest,
    ShiftChangeDetails, ShiftChangeRequest, SwapDetails, SwapRequest, TeamMember,
};
use crate::sheet_links::{LinkError, SheetLinks};
use crate::sheet_parser::{parse_upload, SheetParseError};
use crate::sheet_source::{fetch_all, SheetError, SheetSource};
use crate::shift_codes::{is_known_shift, shift_display};
use crate::storage::{DataDir, LEDGER_FILE, LINKS_FILE, OVERLAY_FILE, REQUESTS_FILE, SYNCED_FILE};

/// Which tier a direct shift write lands in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    #[serde(alias = "overlay")]
    Admin,
    #[serde(alias = "synced")]
    Google,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub sheets: usize,
    pub employees: usize,
    pub dates: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub month: &'static str,
    pub teams: usize,
    pub dates: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmployeeHistory {
    pub employee: Employee,
    pub google_schedule: Vec<String>,
    pub admin_schedule: Vec<String>,
    pub modifications: Vec<Modification>,
    pub headers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayShift {
    pub id: String,
    pub name: String,
    pub team: String,
    pub today_shift: String,
    pub today_display: String,
    pub tomorrow_shift: String,
    pub tomorrow_display: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodayView {
    pub dates: DateLabels,
    pub employees: Vec<DayShift>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTemplate {
    pub file_name: String,
    pub body: String,
}

// --- Roster State ---

/// Owner of the three roster tiers and the documents persisted next to them.
/// Every mutation persists what it touched and, when a tier changed, rebuilds
/// the display tier before returning.
pub struct RosterState {
    data_dir: DataDir,
    clock: Arc<dyn Clock>,
    synced: Dataset,
    overlay: Dataset,
    display: Dataset,
    ledger: ModificationLedger,
    requests: RequestStore,
    links: SheetLinks,
}

impl RosterState {
    pub fn load(data_dir: DataDir, clock: Arc<dyn Clock>) -> Self {
        let synced: Dataset = data_dir.load_or_default(SYNCED_FILE);
        let overlay: Dataset = data_dir.load_or_default(OVERLAY_FILE);
        let ledger: ModificationLedger = data_dir.load_or_default(LEDGER_FILE);
        let requests: RequestStore = data_dir.load_or_default(REQUESTS_FILE);
        let links: SheetLinks = data_dir.load_or_default(LINKS_FILE);
        info!(
            "Loaded roster state from {}: {} synced / {} overlay employees, {} modifications, {} links",
            data_dir.root().display(),
            synced.teams.employee_count(),
            overlay.teams.employee_count(),
            ledger.len(),
            links.len()
        );

        let mut state = Self {
            data_dir,
            clock,
            synced,
            overlay,
            display: Dataset::default(),
            ledger,
            requests,
            links,
        };
        state.refresh_display();
        state
    }

    pub fn synced(&self) -> &Dataset {
        &self.synced
    }

    pub fn overlay(&self) -> &Dataset {
        &self.overlay
    }

    pub fn display(&self) -> &Dataset {
        &self.display
    }

    pub fn ledger(&self) -> &ModificationLedger {
        &self.ledger
    }

    pub fn links(&self) -> &SheetLinks {
        &self.links
    }

    fn refresh_display(&mut self) {
        self.display = reconcile(&self.synced, &self.overlay);
        debug!(
            "Display rebuilt: {} teams, {} employees",
            self.display.teams.len(),
            self.display.teams.employee_count()
        );
    }

    fn persist_synced(&self) {
        self.data_dir.persist(SYNCED_FILE, &self.synced);
    }

    fn persist_overlay(&self) {
        self.data_dir.persist(OVERLAY_FILE, &self.overlay);
    }

    fn persist_ledger(&self) {
        self.data_dir.persist(LEDGER_FILE, &self.ledger);
    }

    fn persist_requests(&self) {
        self.data_dir.persist(REQUESTS_FILE, &self.requests);
    }

    fn persist_links(&self) {
        self.data_dir.persist(LINKS_FILE, &self.links);
    }

    fn record(&mut self, edit: ShiftEdit) {
        let now = self.clock.now();
        self.ledger.record(edit, now);
    }

    // --- Overlay edits ---

    /// Runs `edit` against the overlay; on success the overlay is persisted and
    /// the display rebuilt. Edits validate before mutating, so a failed edit
    /// leaves the overlay as it was.
    pub fn edit_overlay<T, F>(&mut self, edit: F) -> Result<T, RosterError>
    where
        F: FnOnce(&mut Dataset) -> Result<T, RosterError>,
    {
        let result = edit(&mut self.overlay)?;
        self.persist_overlay();
        self.refresh_display();
        Ok(result)
    }

    pub fn reset_to_synced(&mut self) {
        self.overlay = self.synced.clone();
        info!(
            "Overlay reset to synced data ({} employees)",
            self.overlay.teams.employee_count()
        );
        self.persist_overlay();
        self.refresh_display();
    }

    /// Overwrites one cell. Overlay writes that change the value are recorded
    /// in the ledger under `actor`.
    pub fn update_shift(
        &mut self,
        tier: Tier,
        employee_id: &str,
        date_index: usize,
        new_shift: &str,
        actor: &str,
    ) -> Result<CellWrite, RosterError> {
        if !is_known_shift(new_shift) {
            warn!("Writing unrecognized shift code '{}' for {}", new_shift, employee_id);
        }
        let target = match tier {
            Tier::Admin => &mut self.overlay,
            Tier::Google => &mut self.synced,
        };
        let write = write_cell(target, employee_id, date_index, new_shift)?;

        match tier {
            Tier::Admin => {
                if write.changed() {
                    self.record(ShiftEdit {
                        employee_id: employee_id.to_string(),
                        employee_name: write.employee_name.clone(),
                        team_name: write.team_name.clone(),
                        date_index,
                        date_header: write.date_header.clone(),
                        old_shift: write.old_shift.clone(),
                        new_shift: write.new_shift.clone(),
                        modified_by: actor.to_string(),
                    });
                    self.persist_ledger();
                }
                self.persist_overlay();
            }
            Tier::Google => self.persist_synced(),
        }
        self.refresh_display();
        Ok(write)
    }

    // --- Sync and import ---

    /// Replaces the synced tier with the merge of `sources` and absorbs it into
    /// the overlay.
    pub fn apply_sync(&mut self, sources: Vec<Dataset>) -> SyncSummary {
        self.synced = merge_sources(&sources);
        self.persist_synced();
        absorb_sync(&mut self.overlay, &self.synced);
        self.persist_overlay();
        self.refresh_display();

        let summary = SyncSummary {
            sheets: sources.len(),
            employees: self.synced.teams.employee_count(),
            dates: self.synced.headers.len(),
        };
        info!(
            "Sync complete: {} employees over {} dates from {} sheets",
            summary.employees, summary.dates, summary.sheets
        );
        summary
    }

    pub fn import_month(&mut self, csv_text: &str) -> Result<ImportSummary, SheetParseError> {
        let import = parse_upload(csv_text)?;
        merge_month_import(&mut self.synced, &import);
        self.persist_synced();
        absorb_sync(&mut self.overlay, &self.synced);
        self.persist_overlay();
        self.refresh_display();

        Ok(ImportSummary {
            month: import.month,
            teams: import.dataset.teams.len(),
            dates: self.synced.headers.len(),
        })
    }

    // --- Sheet links ---

    pub fn save_link(&mut self, month_year: &str, link: &str) -> Result<(), LinkError> {
        self.links.save(month_year, link)?;
        self.persist_links();
        Ok(())
    }

    pub fn delete_link(&mut self, month_year: &str) -> Result<String, LinkError> {
        let removed = self.links.delete(month_year)?;
        self.persist_links();
        Ok(removed)
    }

    // --- Requests ---

    pub fn submit_shift_change(
        &mut self,
        details: ShiftChangeDetails,
    ) -> Result<ShiftChangeRequest, RequestError> {
        let now = self.clock.now();
        let record = self.requests.submit_shift_change(details, now)?.clone();
        self.persist_requests();
        Ok(record)
    }

    pub fn submit_swap(&mut self, details: SwapDetails) -> Result<SwapRequest, RequestError> {
        let now = self.clock.now();
        let record = self.requests.submit_swap(details, now)?.clone();
        self.persist_requests();
        Ok(record)
    }

    /// Decides a pending request; an approval is applied to the overlay.
    pub fn decide_request(
        &mut self,
        request_id: &str,
        status: RequestStatus,
        actor: &str,
    ) -> Result<ScheduleRequest, RequestError> {
        let now = self.clock.now();
        let decided = self.requests.update_status(request_id, status, actor, now)?;
        self.persist_requests();

        if status == RequestStatus::Approved {
            let applied = match &decided {
                ScheduleRequest::ShiftChange(request) => self.apply_shift_change(request, actor),
                ScheduleRequest::Swap(request) => self.apply_swap(request, actor),
            };
            if applied {
                self.persist_ledger();
            }
            self.persist_overlay();
            self.refresh_display();
        }
        Ok(decided)
    }

    fn apply_shift_change(&mut self, request: &ShiftChangeRequest, actor: &str) -> bool {
        let details = &request.details;
        let Some(date_index) = self.overlay.header_index(&details.date) else {
            warn!(
                "Approved {} not applied: date {} not in overlay headers",
                request.id, details.date
            );
            return false;
        };
        let Some((team_name, employee)) = self.overlay.teams.find_employee_mut(&details.employee_id)
        else {
            warn!(
                "Approved {} not applied: employee {} not in overlay",
                request.id, details.employee_id
            );
            return false;
        };
        let Some(cell) = employee.schedule.get_mut(date_index) else {
            warn!(
                "Approved {} not applied: schedule of {} has no column {}",
                request.id, details.employee_id, date_index
            );
            return false;
        };

        let old_shift = std::mem::replace(cell, details.requested_shift.clone());
        let edit = ShiftEdit {
            employee_id: details.employee_id.clone(),
            employee_name: employee.name.clone(),
            team_name: team_name.to_string(),
            date_index,
            date_header: details.date.clone(),
            old_shift,
            new_shift: details.requested_shift.clone(),
            modified_by: format!("Schedule Request (Approved by {})", actor),
        };
        self.record(edit);
        true
    }

    fn apply_swap(&mut self, request: &SwapRequest, actor: &str) -> bool {
        let details = &request.details;
        if details.requester_id == details.target_employee_id {
            warn!(
                "Approved {} not applied: {} cannot swap with themselves",
                request.id, details.requester_id
            );
            return false;
        }
        let Some(date_index) = self.overlay.header_index(&details.date) else {
            warn!(
                "Approved {} not applied: date {} not in overlay headers",
                request.id, details.date
            );
            return false;
        };

        let cell_of = |id: &str| -> Option<(String, String, String)> {
            let (team, employee) = self.overlay.teams.find_employee(id)?;
            let shift = employee.schedule.get(date_index)?;
            Some((team.to_string(), employee.name.clone(), shift.clone()))
        };
        let (Some(requester), Some(target)) = (
            cell_of(&details.requester_id),
            cell_of(&details.target_employee_id),
        ) else {
            warn!(
                "Approved {} not applied: {} or {} missing or without column {}",
                request.id, details.requester_id, details.target_employee_id, date_index
            );
            return false;
        };
        let (requester_team, requester_name, requester_old) = requester;
        let (target_team, target_name, target_old) = target;
        if requester_old == target_old {
            debug!(
                "Approved {}: both cells already hold '{}', nothing to record",
                request.id, requester_old
            );
            return false;
        }

        for (id, shift) in [
            (&details.requester_id, &target_old),
            (&details.target_employee_id, &requester_old),
        ] {
            if let Some((_, employee)) = self.overlay.teams.find_employee_mut(id) {
                employee.schedule[date_index] = shift.clone();
            }
        }

        let modified_by = format!("Swap Request (Approved by {})", actor);
        self.record(ShiftEdit {
            employee_id: details.requester_id.clone(),
            employee_name: requester_name,
            team_name: requester_team,
            date_index,
            date_header: details.date.clone(),
            old_shift: requester_old.clone(),
            new_shift: target_old.clone(),
            modified_by: modified_by.clone(),
        });
        self.record(ShiftEdit {
            employee_id: details.target_employee_id.clone(),
            employee_name: target_name,
            team_name: target_team,
            date_index,
            date_header: details.date.clone(),
            old_shift: target_old,
            new_shift: requester_old,
            modified_by,
        });
        true
    }

    pub fn pending_requests(&self) -> (Vec<ScheduleRequest>, RequestStats) {
        (self.requests.pending(), self.requests.stats())
    }

    pub fn employee_requests(&self, employee_id: &str) -> Result<Vec<ScheduleRequest>, RequestError> {
        if employee_id.trim().is_empty() {
            return Err(RequestError::MissingField { field: "employeeId" });
        }
        Ok(self.requests.for_employee(employee_id))
    }

    pub fn team_members(
        &self,
        team_name: &str,
        current_employee_id: &str,
        date: &str,
    ) -> Result<Vec<TeamMember>, RequestError> {
        team_members(&self.overlay, team_name, current_employee_id, date)
    }

    // --- Views ---

    pub fn modified_shifts(&self, month: Option<&str>) -> MonthlyReport<'_> {
        match month {
            Some(month) => self.ledger.query(month),
            None => self.ledger.query(&month_key(self.clock.now())),
        }
    }

    pub fn employee_history(&self, employee_id: &str) -> Result<EmployeeHistory, RosterError> {
        let in_overlay = self.overlay.teams.find_employee(employee_id).map(|(_, e)| e);
        let in_synced = self.synced.teams.find_employee(employee_id).map(|(_, e)| e);
        let employee = in_overlay
            .or(in_synced)
            .ok_or_else(|| RosterError::EmployeeNotFound(employee_id.to_string()))?;

        Ok(EmployeeHistory {
            employee: employee.clone(),
            google_schedule: in_synced.map(|e| e.schedule.clone()).unwrap_or_default(),
            admin_schedule: in_overlay.map(|e| e.schedule.clone()).unwrap_or_default(),
            modifications: self
                .ledger
                .employee_history(employee_id)
                .into_iter()
                .cloned()
                .collect(),
            headers: self.synced.headers.clone(),
        })
    }

    /// Today's and tomorrow's shift for every displayed employee.
    pub fn today_view(&self) -> TodayView {
        let dates = date_labels(self.clock.today(), &self.display.headers);
        let headers = &self.display.headers;
        let (today, tomorrow) = (dates.today.as_str(), dates.tomorrow.as_str());
        let employees = self
            .display
            .teams
            .iter()
            .flat_map(|team| {
                team.employees.iter().map(move |e| {
                    let today_shift = shift_for_date(&e.schedule, today, headers);
                    let tomorrow_shift = shift_for_date(&e.schedule, tomorrow, headers);
                    DayShift {
                        id: e.id.clone(),
                        name: e.name.clone(),
                        team: team.name.clone(),
                        today_display: shift_display(&today_shift).to_string(),
                        tomorrow_display: shift_display(&tomorrow_shift).to_string(),
                        today_shift,
                        tomorrow_shift,
                    }
                })
            })
            .collect();
        TodayView { dates, employees }
    }

    pub fn csv_template(&self) -> CsvTemplate {
        csv_template_for(self.clock.today())
    }
}

fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = (date.year(), date.month());
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next_first
        .and_then(|d| d.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

/// Upload template for the month of `date`: header row, blank date row and two
/// example rows.
pub fn csv_template_for(date: NaiveDate) -> CsvTemplate {
    let month = MONTH_ABBREVIATIONS[date.month0() as usize];
    let days = days_in_month(date) as usize;
    let headers: Vec<String> = (1..=days).map(|day| format!("{}{}", day, month)).collect();

    let lines = [
        format!("Team,Name,ID,{}", headers.join(",")),
        format!(",,Date,{}", vec![""; days].join(",")),
        format!("Team A,John Doe,EMP001,{}", vec!["M2"; days].join(",")),
        format!("Team B,Jane Smith,EMP002,{}", vec!["M3"; days].join(",")),
    ];
    CsvTemplate {
        file_name: format!("roster_template_{}.csv", month),
        body: lines.join("\n"),
    }
}

// --- Sync ---

/// Fetches every linked sheet without holding the lock, then applies the
/// result under it. State is untouched when nothing could be loaded.
pub async fn sync_from_sources(
    state: &Mutex<RosterState>,
    source: &dyn SheetSource,
) -> Result<SyncSummary, SheetError> {
    let links = state.lock().await.links().clone();
    info!("Syncing from {} sheet links", links.len());
    let sources = fetch_all(source, &links).await?;
    Ok(state.lock().await.apply_sync(sources))
}
