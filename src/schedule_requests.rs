// src/schedule_requests.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

use crate::roster::Dataset;
use crate::shift_codes::shift_display;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("All fields are required (missing {field})")]
    MissingField { field: &'static str },

    #[error("Invalid status '{0}': expected 'approved' or 'rejected'")]
    InvalidStatus(String),

    #[error("Request {0} not found")]
    NotFound(String),

    #[error("Request {id} has already been {status}")]
    AlreadyDecided { id: String, status: RequestStatus },

    #[error("Cannot swap shifts with yourself ({0})")]
    SelfSwap(String),
}

fn require_all(fields: &[(&'static str, &str)]) -> Result<(), RequestError> {
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((field, _)) => Err(RequestError::MissingField { field: *field }),
        None => Ok(()),
    }
}

// --- Request Types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Parses a decision. `pending` is a valid stored status but never a valid target.
impl FromStr for RequestStatus {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(RequestError::InvalidStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    ShiftChange,
    Swap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftChangeDetails {
    pub employee_id: String,
    pub employee_name: String,
    pub team: String,
    pub date: String,
    pub current_shift: String,
    pub requested_shift: String,
    pub reason: String,
}

impl ShiftChangeDetails {
    fn validate(&self) -> Result<(), RequestError> {
        require_all(&[
            ("employeeId", self.employee_id.as_str()),
            ("employeeName", self.employee_name.as_str()),
            ("team", self.team.as_str()),
            ("date", self.date.as_str()),
            ("currentShift", self.current_shift.as_str()),
            ("requestedShift", self.requested_shift.as_str()),
            ("reason", self.reason.as_str()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapDetails {
    pub requester_id: String,
    pub requester_name: String,
    pub target_employee_id: String,
    pub target_employee_name: String,
    pub team: String,
    pub date: String,
    pub requester_shift: String,
    pub target_shift: String,
    pub reason: String,
}

impl SwapDetails {
    fn validate(&self) -> Result<(), RequestError> {
        require_all(&[
            ("requesterId", self.requester_id.as_str()),
            ("requesterName", self.requester_name.as_str()),
            ("targetEmployeeId", self.target_employee_id.as_str()),
            ("targetEmployeeName", self.target_employee_name.as_str()),
            ("team", self.team.as_str()),
            ("date", self.date.as_str()),
            ("requesterShift", self.requester_shift.as_str()),
            ("targetShift", self.target_shift.as_str()),
            ("reason", self.reason.as_str()),
        ])?;
        if self.requester_id.trim() == self.target_employee_id.trim() {
            return Err(RequestError::SelfSwap(self.requester_id.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord<T> {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    #[serde(flatten)]
    pub details: T,
    pub status: RequestStatus,
    pub created_at: NaiveDateTime,
    #[serde(default)]
    pub approved_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub approved_by: Option<String>,
}

impl<T> RequestRecord<T> {
    fn new(id: String, kind: RequestKind, details: T, now: NaiveDateTime) -> Self {
        Self {
            id,
            kind,
            details,
            status: RequestStatus::Pending,
            created_at: now,
            approved_at: None,
            approved_by: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    fn decide(
        &mut self,
        status: RequestStatus,
        actor: &str,
        now: NaiveDateTime,
    ) -> Result<(), RequestError> {
        if !self.is_pending() {
            return Err(RequestError::AlreadyDecided {
                id: self.id.clone(),
                status: self.status,
            });
        }
        self.status = status;
        if status == RequestStatus::Approved {
            self.approved_at = Some(now);
            self.approved_by = Some(actor.to_string());
        }
        Ok(())
    }
}

pub type ShiftChangeRequest = RequestRecord<ShiftChangeDetails>;
pub type SwapRequest = RequestRecord<SwapDetails>;

/// Either kind of request; the `type` field inside each record tells them apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ScheduleRequest {
    ShiftChange(ShiftChangeRequest),
    Swap(SwapRequest),
}

impl ScheduleRequest {
    pub fn id(&self) -> &str {
        match self {
            ScheduleRequest::ShiftChange(r) => &r.id,
            ScheduleRequest::Swap(r) => &r.id,
        }
    }

    pub fn status(&self) -> RequestStatus {
        match self {
            ScheduleRequest::ShiftChange(r) => r.status,
            ScheduleRequest::Swap(r) => r.status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestStats {
    pub pending_count: u64,
    pub approved_count: u64,
    pub total_shift_change: usize,
    pub total_swap: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    pub shift: String,
    pub shift_display: String,
}

// --- Request Store ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStore {
    #[serde(default)]
    shift_change_requests: Vec<ShiftChangeRequest>,
    #[serde(default)]
    swap_requests: Vec<SwapRequest>,
    #[serde(default)]
    approved_count: u64,
    #[serde(default)]
    pending_count: u64,
}

impl RequestStore {
    fn refresh_pending_count(&mut self) {
        let pending = self
            .shift_change_requests
            .iter()
            .filter(|r| r.is_pending())
            .count()
            + self.swap_requests.iter().filter(|r| r.is_pending()).count();
        self.pending_count = pending as u64;
    }

    pub fn submit_shift_change(
        &mut self,
        details: ShiftChangeDetails,
        now: NaiveDateTime,
    ) -> Result<&ShiftChangeRequest, RequestError> {
        details.validate()?;
        let id = format!("shift_change_{}", self.shift_change_requests.len() + 1);
        info!(
            "Shift change request {} filed by {} for {}: {} -> {}",
            id, details.employee_id, details.date, details.current_shift, details.requested_shift
        );
        self.shift_change_requests
            .push(RequestRecord::new(id, RequestKind::ShiftChange, details, now));
        self.refresh_pending_count();
        Ok(&self.shift_change_requests[self.shift_change_requests.len() - 1])
    }

    pub fn submit_swap(
        &mut self,
        details: SwapDetails,
        now: NaiveDateTime,
    ) -> Result<&SwapRequest, RequestError> {
        details.validate()?;
        let id = format!("swap_{}", self.swap_requests.len() + 1);
        info!(
            "Swap request {} filed by {} with {} for {}",
            id, details.requester_id, details.target_employee_id, details.date
        );
        self.swap_requests
            .push(RequestRecord::new(id, RequestKind::Swap, details, now));
        self.refresh_pending_count();
        Ok(&self.swap_requests[self.swap_requests.len() - 1])
    }

    /// Moves a pending request to `status`. Decided requests are left untouched.
    pub fn update_status(
        &mut self,
        request_id: &str,
        status: RequestStatus,
        actor: &str,
        now: NaiveDateTime,
    ) -> Result<ScheduleRequest, RequestError> {
        if status == RequestStatus::Pending {
            return Err(RequestError::InvalidStatus(status.to_string()));
        }

        let decided = if let Some(request) = self
            .shift_change_requests
            .iter_mut()
            .find(|r| r.id == request_id)
        {
            request.decide(status, actor, now)?;
            ScheduleRequest::ShiftChange(request.clone())
        } else if let Some(request) = self.swap_requests.iter_mut().find(|r| r.id == request_id) {
            request.decide(status, actor, now)?;
            ScheduleRequest::Swap(request.clone())
        } else {
            warn!("Status update for unknown request {}", request_id);
            return Err(RequestError::NotFound(request_id.to_string()));
        };

        if status == RequestStatus::Approved {
            self.approved_count += 1;
        }
        self.refresh_pending_count();
        info!("Request {} {} by {}", request_id, status, actor);
        Ok(decided)
    }

    /// Pending shift changes first, then pending swaps.
    pub fn pending(&self) -> Vec<ScheduleRequest> {
        self.shift_change_requests
            .iter()
            .filter(|r| r.is_pending())
            .cloned()
            .map(ScheduleRequest::ShiftChange)
            .chain(
                self.swap_requests
                    .iter()
                    .filter(|r| r.is_pending())
                    .cloned()
                    .map(ScheduleRequest::Swap),
            )
            .collect()
    }

    pub fn stats(&self) -> RequestStats {
        RequestStats {
            pending_count: self.pending_count,
            approved_count: self.approved_count,
            total_shift_change: self.shift_change_requests.len(),
            total_swap: self.swap_requests.len(),
        }
    }

    /// Shift changes the employee filed, then swaps they take part in.
    pub fn for_employee(&self, employee_id: &str) -> Vec<ScheduleRequest> {
        self.shift_change_requests
            .iter()
            .filter(|r| r.details.employee_id == employee_id)
            .cloned()
            .map(ScheduleRequest::ShiftChange)
            .chain(
                self.swap_requests
                    .iter()
                    .filter(|r| {
                        r.details.requester_id == employee_id
                            || r.details.target_employee_id == employee_id
                    })
                    .cloned()
                    .map(ScheduleRequest::Swap),
            )
            .collect()
    }
}

/// Swap candidates: everyone in `team_name` except the caller, with their
/// shift on `date`. Unknown teams yield no members.
pub fn team_members(
    overlay: &Dataset,
    team_name: &str,
    current_employee_id: &str,
    date: &str,
) -> Result<Vec<TeamMember>, RequestError> {
    require_all(&[
        ("teamName", team_name),
        ("currentEmployeeId", current_employee_id),
        ("date", date),
    ])?;
    let Some(employees) = overlay.teams.get(team_name) else {
        return Ok(Vec::new());
    };
    let date_index = overlay.header_index(date);

    Ok(employees
        .iter()
        .filter(|e| e.id != current_employee_id)
        .map(|e| {
            let shift = date_index
                .and_then(|i| e.schedule.get(i))
                .cloned()
                .unwrap_or_default();
            TeamMember {
                id: e.id.clone(),
                name: e.name.clone(),
                shift_display: shift_display(&shift).to_string(),
                shift,
            }
        })
        .collect())
}
