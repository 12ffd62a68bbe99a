//! Request correlation middleware.

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use rand::Rng;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request correlation ID, extractable from `Request::extensions()`.
#[derive(Clone, Debug, Default)]
pub struct RequestId(pub String);

impl RequestId {
    /// Caller-supplied ID if present and non-empty, otherwise `rel-<16 hex>`.
    fn for_headers(headers: &HeaderMap) -> Self {
        let supplied = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty());
        match supplied {
            Some(id) => Self(id.to_string()),
            None => Self(format!("rel-{:016x}", rand::thread_rng().gen::<u64>())),
        }
    }
}

/// Tag the request with a [`RequestId`] and echo it on the response.
pub async fn inject_request_id(mut request: Request, next: Next) -> Response {
    let id = RequestId::for_headers(request.headers());
    let echo = HeaderValue::from_str(&id.0).ok();
    request.extensions_mut().insert(id);

    let mut response = next.run(request).await;
    if let Some(value) = echo {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
