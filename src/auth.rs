// src/auth.rs
use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, NaiveDateTime};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::AppError;
use crate::handlers::AppState;

const TOKEN_LENGTH: usize = 32;
pub const SESSION_TTL_HOURS: i64 = 12;
pub const MAX_SESSIONS_PER_USER: usize = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid credential entry '{0}': expected user:password")]
    BadCredentialEntry(String),
}

/// Plaintext `username -> password` table.
#[derive(Debug, Clone, Default)]
pub struct Credentials(HashMap<String, String>);

impl Credentials {
    /// Parses `user:password` pairs separated by commas. Blank entries are ignored.
    pub fn parse(table: &str) -> Result<Self, AuthError> {
        let mut users = HashMap::new();
        for entry in table.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let Some((user, password)) = entry.split_once(':') else {
                return Err(AuthError::BadCredentialEntry(entry.to_string()));
            };
            let user = user.trim();
            if user.is_empty() || password.is_empty() {
                return Err(AuthError::BadCredentialEntry(entry.to_string()));
            }
            users.insert(user.to_string(), password.to_string());
        }
        Ok(Self(users))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.0.get(username).is_some_and(|p| p == password)
    }
}

fn generate_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

struct Session {
    username: String,
    issued_at: NaiveDateTime,
}

/// Live admin sessions, bearer token -> username. Sessions expire after
/// [`SESSION_TTL_HOURS`]; each user keeps at most [`MAX_SESSIONS_PER_USER`].
pub struct AdminSessions {
    clock: Arc<dyn Clock>,
    tokens: HashMap<String, Session>,
}

impl AdminSessions {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            tokens: HashMap::new(),
        }
    }

    fn is_live(session: &Session, now: NaiveDateTime) -> bool {
        now - session.issued_at < Duration::hours(SESSION_TTL_HOURS)
    }

    fn evict(&mut self, now: NaiveDateTime, username: &str) {
        let before = self.tokens.len();
        self.tokens.retain(|_, s| Self::is_live(s, now));

        let mut owned: Vec<(NaiveDateTime, String)> = self
            .tokens
            .iter()
            .filter(|(_, s)| s.username == username)
            .map(|(token, s)| (s.issued_at, token.clone()))
            .collect();
        owned.sort();
        let excess = (owned.len() + 1).saturating_sub(MAX_SESSIONS_PER_USER);
        for (_, token) in owned.into_iter().take(excess) {
            self.tokens.remove(&token);
        }

        let evicted = before - self.tokens.len();
        if evicted > 0 {
            debug!("Evicted {} admin sessions", evicted);
        }
    }

    pub fn login(
        &mut self,
        credentials: &Credentials,
        username: &str,
        password: &str,
    ) -> Result<String, AuthError> {
        if !credentials.verify(username, password) {
            warn!("Failed admin login for '{}'", username);
            return Err(AuthError::InvalidCredentials);
        }
        let now = self.clock.now();
        self.evict(now, username);

        let token = generate_token();
        self.tokens.insert(
            token.clone(),
            Session {
                username: username.to_string(),
                issued_at: now,
            },
        );
        info!("Admin '{}' logged in", username);
        Ok(token)
    }

    pub fn logout(&mut self, token: &str) -> Option<String> {
        let user = self.tokens.remove(token).map(|s| s.username);
        if let Some(user) = &user {
            info!("Admin '{}' logged out", user);
        }
        user
    }

    pub fn user_for(&self, token: &str) -> Option<&str> {
        let now = self.clock.now();
        self.tokens
            .get(token)
            .filter(|s| Self::is_live(s, now))
            .map(|s| s.username.as_str())
    }
}

/// Username of the authenticated admin, inserted by [`require_admin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUser(pub String);

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// Auth middleware for the /admin/api routes
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers()).ok_or(AuthError::Unauthorized)?;
    let user = state
        .sessions
        .lock()
        .await
        .user_for(token)
        .map(str::to_string)
        .ok_or(AuthError::Unauthorized)?;

    request.extensions_mut().insert(AdminUser(user));
    Ok(next.run(request).await)
}

// --- Session Handlers ---

#[derive(Deserialize)]
pub struct LoginPayload {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse, AppError> {
    let token = state.sessions.lock().await.login(
        &state.credentials,
        payload.username.trim(),
        &payload.password,
    )?;
    Ok(Json(json!({
        "success": true,
        "token": token,
        "username": payload.username.trim(),
    })))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = bearer_token(&headers) {
        state.sessions.lock().await.logout(token);
    }
    Json(json!({ "success": true }))
}
