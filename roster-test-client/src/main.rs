// src/main.rs

use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;
use std::error::Error;

// Response types
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    request: Value,
}

#[derive(Debug, Deserialize)]
struct PendingResponse {
    pending_requests: Vec<Value>,
    stats: Value,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let base_url = env::var("ROSTER_URL").unwrap_or_else(|_| "http://localhost:5000".to_string());
    let username = env::var("ROSTER_ADMIN").unwrap_or_else(|_| "admin".to_string());
    let password = env::var("ROSTER_PASSWORD").unwrap_or_default();
    let client = Client::new();

    // Test 1: Health check
    println!("\n🔍 Testing health check endpoint...");
    let health = client
        .get(format!("{}/health", base_url))
        .send()
        .await?
        .json::<HealthResponse>()
        .await?;
    println!("Health check response: {:?}", health);

    // Test 2: Display data
    println!("\n🔍 Fetching display roster...");
    let display = client
        .get(format!("{}/api/display-data", base_url))
        .send()
        .await?
        .json::<Value>()
        .await?;
    let headers = display["headers"].as_array().cloned().unwrap_or_default();
    let employees = display["allEmployees"].as_array().cloned().unwrap_or_default();
    println!(
        "Display roster: {} dates, {} employees",
        headers.len(),
        employees.len()
    );

    let (Some(employee), Some(date)) = (employees.first(), headers.first()) else {
        println!("\n⚠️ Roster is empty; sync or upload a month before running the request flow.");
        return Ok(());
    };

    // Test 3: Submit a shift change for the first employee
    println!("\n🔍 Submitting shift change request...");
    let current = employee["schedule"][0].as_str().unwrap_or_default();
    let submit = client
        .post(format!(
            "{}/api/schedule-requests/submit-shift-change",
            base_url
        ))
        .json(&json!({
            "employeeId": employee["id"],
            "employeeName": employee["name"],
            "team": employee["currentTeam"],
            "date": date,
            "currentShift": current,
            "requestedShift": "DO",
            "reason": "Smoke test",
        }))
        .send()
        .await?;
    println!("Submit status: {}", submit.status());
    if !submit.status().is_success() {
        println!("Submit failed: {}", submit.text().await?);
        return Ok(());
    }
    let submitted = submit.json::<SubmitResponse>().await?;
    let request_id = submitted.request["id"].as_str().unwrap_or_default().to_string();
    println!("Submitted request: {}", request_id);

    // Test 4: Admin login
    println!("\n🔍 Logging in as {}...", username);
    let login = client
        .post(format!("{}/admin/login", base_url))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await?;
    if !login.status().is_success() {
        println!("Login failed ({}): {}", login.status(), login.text().await?);
        println!("Set ROSTER_ADMIN / ROSTER_PASSWORD to match ROSTER_ADMIN_USERS.");
        return Ok(());
    }
    let session = login.json::<LoginResponse>().await?;
    println!("Logged in as {}", session.username);

    let mut auth_headers = header::HeaderMap::new();
    auth_headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", session.token))?,
    );

    // Test 5: Pending queue
    println!("\n🔍 Fetching pending requests...");
    let pending = client
        .get(format!(
            "{}/admin/api/schedule-requests/get-pending",
            base_url
        ))
        .headers(auth_headers.clone())
        .send()
        .await?
        .json::<PendingResponse>()
        .await?;
    println!(
        "Pending: {} (stats: {})",
        pending.pending_requests.len(),
        pending.stats
    );

    // Test 6: Approve
    println!("\n🔍 Approving {}...", request_id);
    let approve = client
        .post(format!(
            "{}/admin/api/schedule-requests/update-status",
            base_url
        ))
        .headers(auth_headers.clone())
        .json(&json!({ "requestId": request_id, "status": "approved" }))
        .send()
        .await?;
    println!("Approve status: {}", approve.status());
    println!("Approve body: {}", approve.text().await?);

    // Test 7: Logout
    let logout = client
        .post(format!("{}/admin/logout", base_url))
        .headers(auth_headers)
        .send()
        .await?;
    println!("\nLogout status: {}", logout.status());

    println!("\n✅ Smoke test finished");
    Ok(())
}
