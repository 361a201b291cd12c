// src/handlers.rs
use axum::{
    extract::{Query, State},
    http::header,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{self, require_admin, AdminSessions, AdminUser, Credentials};
use crate::clock::Clock;
use crate::error::AppError;
use crate::reconciler::{self, EmployeeDraft, RosterError};
use crate::roster_state::{sync_from_sources, RosterState, Tier};
use crate::schedule_requests::{RequestError, RequestStatus, ShiftChangeDetails, SwapDetails};
use crate::sheet_source::SheetSource;

// --- Application State ---

#[derive(Clone)]
pub struct AppState {
    pub roster: Arc<Mutex<RosterState>>,
    pub sheets: Arc<dyn SheetSource>,
    pub sessions: Arc<Mutex<AdminSessions>>,
    pub credentials: Arc<Credentials>,
}

impl AppState {
    pub fn new(
        roster: RosterState,
        sheets: Arc<dyn SheetSource>,
        credentials: Credentials,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            roster: Arc::new(Mutex::new(roster)),
            sheets,
            sessions: Arc::new(Mutex::new(AdminSessions::new(clock))),
            credentials: Arc::new(credentials),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let admin_api = Router::new()
        .route("/sync-google-sheets", post(sync_google_sheets))
        .route("/get-google-data", get(get_google_data))
        .route("/get-admin-data", get(get_admin_data))
        .route("/get-employee-shift-history", post(get_employee_shift_history))
        .route("/get-modified-shifts", get(get_modified_shifts))
        .route("/update-shift", post(update_shift))
        .route("/reset-to-google", post(reset_to_google))
        .route("/save-team", post(save_team))
        .route("/save-employee", post(save_employee))
        .route("/delete-team", post(delete_team))
        .route("/delete-employee", post(delete_employee))
        .route("/save-google-link", post(save_google_link))
        .route("/get-google-links", get(get_google_links))
        .route("/delete-google-link", post(delete_google_link))
        .route("/upload-csv", post(upload_csv))
        .route("/download-template", get(download_template))
        .route("/schedule-requests/get-pending", get(get_pending_requests))
        .route("/schedule-requests/update-status", post(update_request_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        // Public endpoints
        .route("/health", get(health_check))
        .route("/api/display-data", get(get_display_data))
        .route("/api/roster/today", get(get_today))
        .route(
            "/api/schedule-requests/submit-shift-change",
            post(submit_shift_change),
        )
        .route("/api/schedule-requests/submit-swap-request", post(submit_swap))
        .route("/api/schedule-requests/get-team-members", post(get_team_members))
        .route(
            "/api/schedule-requests/get-employee-requests",
            post(get_employee_requests),
        )
        // Admin session
        .route("/admin/login", post(auth::login))
        .route("/admin/logout", post(auth::logout))
        .nest("/admin/api", admin_api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Public Handlers ---

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn get_display_data(State(state): State<AppState>) -> impl IntoResponse {
    let roster = state.roster.lock().await;
    Json(json!(roster.display()))
}

async fn get_today(State(state): State<AppState>) -> impl IntoResponse {
    let roster = state.roster.lock().await;
    Json(json!(roster.today_view()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShiftChangePayload {
    #[serde(default)]
    employee_id: String,
    #[serde(default)]
    employee_name: String,
    #[serde(default)]
    team: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    current_shift: String,
    #[serde(default)]
    requested_shift: String,
    #[serde(default)]
    reason: String,
}

impl From<ShiftChangePayload> for ShiftChangeDetails {
    fn from(p: ShiftChangePayload) -> Self {
        ShiftChangeDetails {
            employee_id: p.employee_id,
            employee_name: p.employee_name,
            team: p.team,
            date: p.date,
            current_shift: p.current_shift,
            requested_shift: p.requested_shift,
            reason: p.reason,
        }
    }
}

async fn submit_shift_change(
    State(state): State<AppState>,
    Json(payload): Json<ShiftChangePayload>,
) -> Result<impl IntoResponse, AppError> {
    let request = state
        .roster
        .lock()
        .await
        .submit_shift_change(payload.into())?;
    Ok(Json(json!({ "success": true, "request": request })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapPayload {
    #[serde(default)]
    requester_id: String,
    #[serde(default)]
    requester_name: String,
    #[serde(default)]
    target_employee_id: String,
    #[serde(default)]
    target_employee_name: String,
    #[serde(default)]
    team: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    requester_shift: String,
    #[serde(default)]
    target_shift: String,
    #[serde(default)]
    reason: String,
}

impl From<SwapPayload> for SwapDetails {
    fn from(p: SwapPayload) -> Self {
        SwapDetails {
            requester_id: p.requester_id,
            requester_name: p.requester_name,
            target_employee_id: p.target_employee_id,
            target_employee_name: p.target_employee_name,
            team: p.team,
            date: p.date,
            requester_shift: p.requester_shift,
            target_shift: p.target_shift,
            reason: p.reason,
        }
    }
}

async fn submit_swap(
    State(state): State<AppState>,
    Json(payload): Json<SwapPayload>,
) -> Result<impl IntoResponse, AppError> {
    let request = state.roster.lock().await.submit_swap(payload.into())?;
    Ok(Json(json!({ "success": true, "request": request })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamMembersPayload {
    #[serde(default)]
    team_name: String,
    #[serde(default)]
    current_employee_id: String,
    #[serde(default)]
    date: String,
}

async fn get_team_members(
    State(state): State<AppState>,
    Json(payload): Json<TeamMembersPayload>,
) -> Result<impl IntoResponse, AppError> {
    let members = state.roster.lock().await.team_members(
        &payload.team_name,
        &payload.current_employee_id,
        &payload.date,
    )?;
    Ok(Json(json!({ "success": true, "teamMembers": members })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmployeeIdPayload {
    #[serde(default)]
    employee_id: String,
}

async fn get_employee_requests(
    State(state): State<AppState>,
    Json(payload): Json<EmployeeIdPayload>,
) -> Result<impl IntoResponse, AppError> {
    let requests = state
        .roster
        .lock()
        .await
        .employee_requests(&payload.employee_id)?;
    Ok(Json(json!({ "success": true, "requests": requests })))
}

// --- Admin Handlers ---

async fn sync_google_sheets(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let summary = sync_from_sources(&state.roster, state.sheets.as_ref()).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!(
            "Google Sheets synced successfully. Loaded {} employees from {} sheets.",
            summary.employees, summary.sheets
        ),
    })))
}

async fn get_google_data(State(state): State<AppState>) -> impl IntoResponse {
    let roster = state.roster.lock().await;
    Json(json!(roster.synced()))
}

async fn get_admin_data(State(state): State<AppState>) -> impl IntoResponse {
    let roster = state.roster.lock().await;
    Json(json!(roster.overlay()))
}

async fn get_employee_shift_history(
    State(state): State<AppState>,
    Json(payload): Json<EmployeeIdPayload>,
) -> Result<impl IntoResponse, AppError> {
    if payload.employee_id.trim().is_empty() {
        return Err(RosterError::MissingField {
            field: "Employee ID",
        }
        .into());
    }
    let history = state
        .roster
        .lock()
        .await
        .employee_history(&payload.employee_id)?;
    Ok(Json(json!(history)))
}

#[derive(Deserialize)]
struct ModifiedShiftsQuery {
    month: Option<String>,
}

async fn get_modified_shifts(
    State(state): State<AppState>,
    Query(query): Query<ModifiedShiftsQuery>,
) -> impl IntoResponse {
    let roster = state.roster.lock().await;
    let month = query.month.as_deref().map(str::trim).filter(|m| !m.is_empty());
    Json(json!(roster.modified_shifts(month)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateShiftPayload {
    #[serde(default)]
    employee_id: String,
    date_index: Option<i64>,
    #[serde(default)]
    new_shift: String,
    #[serde(default)]
    source: Tier,
}

async fn update_shift(
    State(state): State<AppState>,
    Extension(AdminUser(actor)): Extension<AdminUser>,
    Json(payload): Json<UpdateShiftPayload>,
) -> Result<impl IntoResponse, AppError> {
    let (employee_id, Some(date_index)) = (payload.employee_id.trim(), payload.date_index) else {
        return Err(AppError::BadRequest(
            "Missing required fields: employeeId and dateIndex are required".to_string(),
        ));
    };
    if employee_id.is_empty() {
        return Err(AppError::BadRequest(
            "Missing required fields: employeeId and dateIndex are required".to_string(),
        ));
    }
    let date_index = usize::try_from(date_index)
        .map_err(|_| AppError::BadRequest(format!("Date index {} out of range", date_index)))?;

    state.roster.lock().await.update_shift(
        payload.source,
        employee_id,
        date_index,
        payload.new_shift.trim(),
        &actor,
    )?;
    Ok(Json(json!({ "success": true })))
}

async fn reset_to_google(State(state): State<AppState>) -> impl IntoResponse {
    state.roster.lock().await.reset_to_synced();
    Json(json!({ "success": true, "message": "Reset to Google Sheets data" }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveTeamPayload {
    #[serde(default)]
    team_name: String,
    #[serde(default)]
    action: String,
    old_name: Option<String>,
}

async fn save_team(
    State(state): State<AppState>,
    Json(payload): Json<SaveTeamPayload>,
) -> Result<impl IntoResponse, AppError> {
    let team_name = payload.team_name.trim();
    let mut roster = state.roster.lock().await;
    match payload.action.as_str() {
        "add" => {
            roster.edit_overlay(|overlay| reconciler::add_team(overlay, team_name))?;
        }
        "edit" => {
            let old_name = payload.old_name.as_deref().unwrap_or_default().trim();
            roster.edit_overlay(|overlay| reconciler::rename_team(overlay, old_name, team_name))?;
            info!("Team '{}' renamed to '{}'", old_name, team_name);
        }
        other => {
            return Err(AppError::BadRequest(format!("Unknown team action '{}'", other)));
        }
    }
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveEmployeePayload {
    #[serde(default)]
    name: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    team: String,
    #[serde(default)]
    action: String,
    old_id: Option<String>,
    old_team: Option<String>,
}

async fn save_employee(
    State(state): State<AppState>,
    Json(payload): Json<SaveEmployeePayload>,
) -> Result<impl IntoResponse, AppError> {
    let draft = EmployeeDraft {
        id: payload.id.trim().to_string(),
        name: payload.name.trim().to_string(),
        team: payload.team.trim().to_string(),
        old_id: payload.old_id.map(|s| s.trim().to_string()),
        old_team: payload.old_team.map(|s| s.trim().to_string()),
    };
    let mut roster = state.roster.lock().await;
    match payload.action.as_str() {
        "add" => roster.edit_overlay(|overlay| reconciler::add_employee(overlay, &draft))?,
        "edit" => roster.edit_overlay(|overlay| reconciler::edit_employee(overlay, &draft))?,
        other => {
            return Err(AppError::BadRequest(format!(
                "Unknown employee action '{}'",
                other
            )));
        }
    }
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteTeamPayload {
    #[serde(default)]
    team_name: String,
}

async fn delete_team(
    State(state): State<AppState>,
    Json(payload): Json<DeleteTeamPayload>,
) -> Result<impl IntoResponse, AppError> {
    let removed = state
        .roster
        .lock()
        .await
        .edit_overlay(|overlay| reconciler::delete_team(overlay, payload.team_name.trim()))?;
    info!(
        "Deleted team '{}' with {} employees",
        payload.team_name,
        removed.len()
    );
    Ok(Json(json!({ "success": true })))
}

async fn delete_employee(
    State(state): State<AppState>,
    Json(payload): Json<EmployeeIdPayload>,
) -> Result<impl IntoResponse, AppError> {
    let removed = state
        .roster
        .lock()
        .await
        .edit_overlay(|overlay| reconciler::delete_employee(overlay, payload.employee_id.trim()))?;
    info!("Deleted employee {} ({})", removed.id, removed.name);
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkPayload {
    #[serde(default)]
    month_year: String,
    #[serde(default)]
    google_link: String,
}

async fn save_google_link(
    State(state): State<AppState>,
    Json(payload): Json<LinkPayload>,
) -> Result<impl IntoResponse, AppError> {
    state
        .roster
        .lock()
        .await
        .save_link(&payload.month_year, &payload.google_link)?;
    Ok(Json(json!({
        "success": true,
        "message": "Google Sheets link saved successfully",
    })))
}

async fn get_google_links(State(state): State<AppState>) -> impl IntoResponse {
    let roster = state.roster.lock().await;
    Json(json!(roster.links()))
}

async fn delete_google_link(
    State(state): State<AppState>,
    Json(payload): Json<LinkPayload>,
) -> Result<impl IntoResponse, AppError> {
    state.roster.lock().await.delete_link(&payload.month_year)?;
    Ok(Json(json!({
        "success": true,
        "message": "Google Sheets link deleted successfully",
    })))
}

async fn upload_csv(
    State(state): State<AppState>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    if body.trim().is_empty() {
        return Err(AppError::BadRequest("No file uploaded".to_string()));
    }
    let summary = state.roster.lock().await.import_month(&body)?;
    Ok(Json(json!({
        "success": true,
        "message": format!(
            "CSV imported successfully for {}! Merged {} teams.",
            summary.month, summary.teams
        ),
    })))
}

async fn download_template(State(state): State<AppState>) -> impl IntoResponse {
    let template = state.roster.lock().await.csv_template();
    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", template.file_name),
            ),
        ],
        template.body,
    )
}

async fn get_pending_requests(State(state): State<AppState>) -> impl IntoResponse {
    let (pending, stats) = state.roster.lock().await.pending_requests();
    Json(json!({
        "success": true,
        "pending_requests": pending,
        "stats": stats,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateStatusPayload {
    #[serde(default)]
    request_id: String,
    #[serde(default)]
    status: String,
}

async fn update_request_status(
    State(state): State<AppState>,
    Extension(AdminUser(actor)): Extension<AdminUser>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<impl IntoResponse, AppError> {
    let request_id = payload.request_id.trim();
    if request_id.is_empty() {
        return Err(RequestError::MissingField { field: "requestId" }.into());
    }
    let status: RequestStatus = payload.status.trim().parse()?;
    let decided = state
        .roster
        .lock()
        .await
        .decide_request(request_id, status, &actor)?;
    Ok(Json(json!({ "success": true, "request": decided })))
}
