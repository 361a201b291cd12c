// src/error.rs
use axum::http::StatusCode as AxumStatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::AuthError;
use crate::reconciler::RosterError;
use crate::schedule_requests::RequestError;
use crate::sheet_links::LinkError;
use crate::sheet_parser::SheetParseError;
use crate::sheet_source::SheetError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("Sheet sync failed: {0}")]
    Sync(#[from] SheetError),

    #[error("Error processing CSV: {0}")]
    Import(#[from] SheetParseError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> AxumStatusCode {
        match self {
            AppError::Roster(e) => match e {
                RosterError::MissingField { .. } | RosterError::DateIndexOutOfRange { .. } => {
                    AxumStatusCode::BAD_REQUEST
                }
                RosterError::TeamNotFound(_) | RosterError::EmployeeNotFound(_) => {
                    AxumStatusCode::NOT_FOUND
                }
                RosterError::DuplicateEmployee(_) => AxumStatusCode::CONFLICT,
            },
            AppError::Request(e) => match e {
                RequestError::MissingField { .. }
                | RequestError::InvalidStatus(_)
                | RequestError::SelfSwap(_) => AxumStatusCode::BAD_REQUEST,
                RequestError::NotFound(_) => AxumStatusCode::NOT_FOUND,
                RequestError::AlreadyDecided { .. } => AxumStatusCode::CONFLICT,
            },
            AppError::Link(e) => match e {
                LinkError::NotFound(_) => AxumStatusCode::NOT_FOUND,
                LinkError::MissingField | LinkError::InvalidUrl { .. } => {
                    AxumStatusCode::BAD_REQUEST
                }
            },
            AppError::Sync(SheetError::NoLinks) => AxumStatusCode::BAD_REQUEST,
            AppError::Sync(_) => AxumStatusCode::BAD_GATEWAY,
            AppError::Import(_) => AxumStatusCode::BAD_REQUEST,
            AppError::Auth(AuthError::BadCredentialEntry(_)) => {
                AxumStatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Auth(_) => AxumStatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => AxumStatusCode::BAD_REQUEST,
        }
    }
}

// Map AppError to a JSON failure body
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code = self.status();
        let error_message = if status_code.is_server_error() {
            error!("Error occurred: {}", self);
            match self {
                AppError::Sync(_) => self.to_string(),
                _ => "Internal server error. Check logs.".to_string(),
            }
        } else {
            warn!("Request rejected ({}): {}", status_code, self);
            self.to_string()
        };

        (
            status_code,
            Json(json!({ "success": false, "error": error_message })),
        )
            .into_response()
    }
}
