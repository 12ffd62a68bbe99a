//! Error types for the relay.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::fmt;

/// Relay error type. Each variant maps to one HTTP status at the boundary.
#[derive(Debug)]
pub enum Error {
    /// A required configuration value is missing or unusable.
    Config(String),
    /// Loading, parsing, or refreshing the service-account credential failed.
    Auth(String),
    /// Upstream answered with something other than 200.
    Upstream { status: u16, body: String },
    /// Inbound body is not a JSON object (or null).
    InvalidPayload(String),
    /// Anything else: transport failures, unparsable upstream JSON.
    Internal(String),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Config(_) => StatusCode::BAD_REQUEST,
            Error::Auth(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Error::InvalidPayload(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "{msg}"),
            Error::Auth(msg) => write!(f, "Failed to obtain token from service account: {msg}"),
            Error::Upstream { body, .. } => write!(f, "Discovery Engine API error: {body}"),
            Error::InvalidPayload(msg) => write!(f, "Invalid request body: {msg}"),
            Error::Internal(msg) => write!(f, "Internal server error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "detail": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
