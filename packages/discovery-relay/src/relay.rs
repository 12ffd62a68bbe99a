//! Token-then-forward flow behind `POST /api/recommendations`.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::state::AppState;

/// Decode an inbound body. Empty or `null` becomes `{}`; non-objects are rejected.
pub fn parse_payload(body: &[u8]) -> Result<Map<String, Value>, crate::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(crate::Error::InvalidPayload(format!(
            "expected a JSON object, got {}",
            kind_of(&other)
        ))),
        Err(e) => Err(crate::Error::InvalidPayload(e.to_string())),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Obtain a token and POST `payload` upstream. Exactly one upstream call on
/// the success path; none if configuration or token acquisition fails first.
pub async fn forward(state: &AppState, payload: Map<String, Value>) -> Result<Value, crate::Error> {
    let credentials_path = state.config.require_credentials_path()?;
    let token = state.tokens.obtain_token(credentials_path).await?;
    let url = state.config.require_upstream_url()?;

    let response = state
        .http
        .post(url)
        .bearer_auth(&token)
        .json(&payload)
        .send()
        .await
        .map_err(|e| crate::Error::Internal(format!("upstream request failed: {e}")))?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        warn!(status = %status, "Upstream returned non-200");
        return Err(upstream_error(status.as_u16(), response.text().await));
    }

    let value: Value = response
        .json()
        .await
        .map_err(|e| crate::Error::Internal(format!("invalid upstream JSON: {e}")))?;
    debug!("Upstream answered 200");
    Ok(value)
}

/// Non-200 reply as an error. An unreadable body keeps its read failure as the text.
fn upstream_error<E: std::fmt::Display>(status: u16, body: Result<String, E>) -> crate::Error {
    let body = body.unwrap_or_else(|e| {
        warn!(status, error = %e, "Failed to read upstream error body");
        format!("<unreadable response body: {e}>")
    });
    crate::Error::Upstream { status, body }
}
