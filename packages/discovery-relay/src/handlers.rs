//! HTTP request handlers.

use crate::metrics::METRICS;
use crate::middleware::RequestId;
use crate::relay;
use crate::response::HealthResponse;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Health check with configuration status.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let credentials_configured = state.config.credentials_path.is_some();
    let upstream_configured = state.config.upstream_url.is_some();

    Json(HealthResponse {
        status: if credentials_configured && upstream_configured {
            "ok"
        } else {
            "degraded"
        },
        uptime_secs: state.start_time.elapsed().as_secs(),
        requests: state.request_count.load(Ordering::Relaxed),
        credentials_configured,
        upstream_configured,
    })
}

/// Prometheus metrics in text exposition format.
pub async fn metrics() -> impl IntoResponse {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        METRICS.render(),
    )
}

/// Forward the payload to Discovery Engine and relay the answer.
pub async fn recommendations(
    State(state): State<Arc<AppState>>,
    request_id: Option<Extension<RequestId>>,
    body: Bytes,
) -> Response {
    let start = std::time::Instant::now();
    METRICS.relay_total.fetch_add(1, Ordering::Relaxed);
    state.request_count.fetch_add(1, Ordering::Relaxed);

    let req_id = request_id.map(|Extension(id)| id.0).unwrap_or_default();

    let result = match relay::parse_payload(&body) {
        Ok(payload) => {
            info!(req_id = %req_id, fields = payload.len(), "Relaying recommendation request");
            relay::forward(&state, payload).await
        }
        Err(e) => Err(e),
    };
    METRICS.record_relay_duration(start);

    match result {
        Ok(value) => {
            METRICS.relay_success.fetch_add(1, Ordering::Relaxed);
            Json(value).into_response()
        }
        Err(e) => {
            METRICS.record_error(&e);
            match &e {
                crate::Error::Config(_) | crate::Error::InvalidPayload(_) => {
                    warn!(req_id = %req_id, error = %e, "Request rejected");
                }
                crate::Error::Upstream { status, .. } => {
                    warn!(req_id = %req_id, status, "Upstream error relayed");
                }
                crate::Error::Auth(_) | crate::Error::Internal(_) => {
                    error!(req_id = %req_id, error = %e, "Relay failed");
                }
            }
            e.into_response()
        }
    }
}
