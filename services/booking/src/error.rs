//! Custom error types for the booking service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::UpstreamError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for the booking service
#[derive(Error, Debug)]
pub enum AppError {
    /// A call to the identity provider or the calendar API failed
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// The submitted form could not be parsed
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The callback's `state` does not match the pending authorization
    #[error("Invalid OAuth state")]
    InvalidState,

    /// The identity provider refused the authorization
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// A page could not be rendered
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self);

        let (status, body) = match &self {
            AppError::Upstream(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": err.to_string(),
                    "kind": err.kind(),
                    "status": err.status(),
                    "body": err.body(),
                }),
            ),
            AppError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            AppError::InvalidState => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid OAuth state" }),
            ),
            AppError::Authorization(message) => {
                (StatusCode::UNAUTHORIZED, json!({ "error": message }))
            }
            AppError::Template(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal server error" }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Type alias for handler results
pub type AppResult<T> = Result<T, AppError>;
