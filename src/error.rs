//! ==============================================================================
//! error.rs - typed errors for polling and the write endpoint
//! ==============================================================================
//!
//! startup and server plumbing use anyhow. these two get real types because
//! callers branch on them: the poller turns a PollError into a user notice,
//! and ApiError becomes a 400 response.
//!
//! ==============================================================================

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

/// why a single poll produced no snapshot
#[derive(Debug, Error)]
pub enum PollError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server responded with {0}")]
    Status(u16),

    #[error("unreadable snapshot: {0}")]
    Decode(String),
}

/// rejected request to the reading store
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("malformed sensor payload: {0}")]
    BadPayload(#[from] serde_json::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "message": self.to_string() }));
        (StatusCode::BAD_REQUEST, body).into_response()
    }
}
