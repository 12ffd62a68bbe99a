//! HTTP router setup.

use crate::handlers;
use crate::middleware::inject_request_id;
use crate::state::AppState;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Create the application router.
pub fn create(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/api/recommendations", post(handlers::recommendations))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(axum::middleware::from_fn(inject_request_id)),
        )
        .with_state(state)
}

/// Credentials are allowed, so `*` is not usable for any CORS field:
/// methods and headers mirror the preflight instead.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            if origin == "*" {
                warn!("Ignoring wildcard CORS origin (credentials are allowed)");
                return None;
            }
            match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                    None
                }
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::credentials::TokenProvider;
    use axum::body::Body;
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
    use axum::http::{HeaderMap, Request, StatusCode};
    use axum::Json;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tower::ServiceExt;

    type Seen = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    struct MockUpstream {
        url: String,
        seen: Seen,
    }

    impl MockUpstream {
        fn calls(&self) -> Vec<(Option<String>, Value)> {
            self.seen.lock().unwrap().clone()
        }
    }

    /// Throwaway upstream that records auth header + body and answers with a fixed reply.
    async fn spawn_upstream(status: StatusCode, reply: &'static str) -> MockUpstream {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let app = Router::new().route(
            "/recommend",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let recorder = recorder.clone();
                async move {
                    let auth = headers
                        .get(AUTHORIZATION)
                        .and_then(|h| h.to_str().ok())
                        .map(str::to_string);
                    recorder.lock().unwrap().push((auth, body));
                    (status, reply)
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        MockUpstream {
            url: format!("http://{addr}/recommend"),
            seen,
        }
    }

    fn test_config(upstream_url: Option<&str>) -> Config {
        Config {
            credentials_path: Some("/secrets/sa.json".into()),
            upstream_url: upstream_url.map(str::to_string),
            ..Config::default()
        }
    }

    fn app_with(config: Config) -> Router {
        let tokens = TokenProvider::Fixed("test-token".into());
        create(Arc::new(AppState::with_tokens(config, tokens).unwrap()))
    }

    async fn post_body(app: Router, body: Body) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::post("/api/recommendations")
                    .header(CONTENT_TYPE, "application/json")
                    .body(body)
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn detail(body: &Value) -> &str {
        body["detail"].as_str().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_success_relays_upstream_body() {
        let upstream = spawn_upstream(StatusCode::OK, r#"{"results": []}"#).await;
        let app = app_with(test_config(Some(&upstream.url)));

        let (status, body) = post_body(app, Body::from(r#"{"query": "shoes"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"results": []}));
        let calls = upstream.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.as_deref(), Some("Bearer test-token"));
        assert_eq!(calls[0].1, json!({"query": "shoes"}));
    }

    #[tokio::test]
    async fn test_missing_credentials_path_is_400() {
        let upstream = spawn_upstream(StatusCode::OK, "{}").await;
        let config = Config {
            credentials_path: None,
            ..test_config(Some(&upstream.url))
        };

        let (status, body) = post_body(app_with(config), Body::from("{}")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(detail(&body).contains("GOOGLE_APPLICATION_CREDENTIALS"));
        assert!(upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_upstream_url_is_400() {
        let (status, body) = post_body(app_with(test_config(None)), Body::from("{}")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(detail(&body).contains("DISCOVERY_ENGINE_URL"));
    }

    #[tokio::test]
    async fn test_upstream_error_keeps_status_and_text() {
        let upstream = spawn_upstream(StatusCode::SERVICE_UNAVAILABLE, "service unavailable").await;
        let app = app_with(test_config(Some(&upstream.url)));

        let (status, body) = post_body(app, Body::from(r#"{"query": "shoes"}"#)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(detail(&body).contains("Discovery Engine API error"));
        assert!(detail(&body).contains("service unavailable"));
    }

    #[tokio::test]
    async fn test_non_200_success_status_is_still_an_upstream_error() {
        let upstream = spawn_upstream(StatusCode::ACCEPTED, r#"{"queued": true}"#).await;
        let app = app_with(test_config(Some(&upstream.url)));

        let (status, body) = post_body(app, Body::from("{}")).await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(detail(&body).contains(r#"{"queued": true}"#));
    }

    #[tokio::test]
    async fn test_malformed_credential_file_is_500() {
        let path = std::env::temp_dir().join("discovery_relay_router_bad_key.json");
        std::fs::write(&path, "{ definitely not a key").unwrap();
        let upstream = spawn_upstream(StatusCode::OK, "{}").await;
        let config = Config {
            credentials_path: Some(path.to_string_lossy().into_owned()),
            upstream_url: Some(upstream.url.clone()),
            ..Config::default()
        };
        let app = create(Arc::new(AppState::new(config).unwrap()));

        let (status, body) = post_body(app, Body::from("{}")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(detail(&body).contains("Failed to obtain token"));
        assert!(upstream.calls().is_empty());
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_unreadable_credential_file_is_500() {
        let config = Config {
            credentials_path: Some("/nonexistent/discovery-relay/sa.json".into()),
            upstream_url: Some("http://127.0.0.1:9/recommend".into()),
            ..Config::default()
        };
        let app = create(Arc::new(AppState::new(config).unwrap()));

        let (status, body) = post_body(app, Body::from("{}")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(detail(&body).contains("Failed to obtain token"));
    }

    #[tokio::test]
    async fn test_empty_body_matches_empty_object() {
        let upstream = spawn_upstream(StatusCode::OK, r#"{"results": []}"#).await;
        let app = app_with(test_config(Some(&upstream.url)));

        let (empty_status, _) = post_body(app.clone(), Body::empty()).await;
        let (null_status, _) = post_body(app.clone(), Body::from("null")).await;
        let (object_status, _) = post_body(app, Body::from("{}")).await;

        assert_eq!(empty_status, StatusCode::OK);
        assert_eq!(null_status, StatusCode::OK);
        assert_eq!(object_status, StatusCode::OK);
        let bodies: Vec<Value> = upstream.calls().into_iter().map(|(_, b)| b).collect();
        assert_eq!(bodies, vec![json!({}), json!({}), json!({})]);
    }

    #[tokio::test]
    async fn test_repeated_requests_are_idempotent() {
        let upstream = spawn_upstream(StatusCode::OK, r#"{"results": [{"id": "a"}]}"#).await;
        let app = app_with(test_config(Some(&upstream.url)));

        let first = post_body(app.clone(), Body::from(r#"{"query": "bats"}"#)).await;
        let second = post_body(app, Body::from(r#"{"query": "bats"}"#)).await;

        assert_eq!(first, second);
        assert_eq!(upstream.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_non_object_body_is_422() {
        let upstream = spawn_upstream(StatusCode::OK, "{}").await;
        let app = app_with(test_config(Some(&upstream.url)));

        let (status, body) = post_body(app, Body::from("[1, 2, 3]")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(detail(&body).contains("Invalid request body"));
        assert!(upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn test_non_json_upstream_reply_is_500() {
        let upstream = spawn_upstream(StatusCode::OK, "<html>oops</html>").await;
        let app = app_with(test_config(Some(&upstream.url)));

        let (status, body) = post_body(app, Body::from("{}")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(detail(&body).starts_with("Internal server error"));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_500() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = format!("http://{addr}/recommend");
        let app = app_with(test_config(Some(&url)));

        let (status, body) = post_body(app, Body::from("{}")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(detail(&body).contains("upstream request failed"));
    }

    #[tokio::test]
    async fn test_health_reports_configuration() {
        let response = app_with(test_config(None))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["credentials_configured"], true);
        assert_eq!(body["upstream_configured"], false);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let response = app_with(test_config(None))
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("relay_requests_total"));
    }

    #[tokio::test]
    async fn test_request_id_is_echoed_or_generated() {
        let app = app_with(test_config(None));

        let echoed = app
            .clone()
            .oneshot(
                Request::get("/health")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(echoed.headers()["x-request-id"], "abc-123");

        let generated = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let id = generated.headers()["x-request-id"].to_str().unwrap();
        assert!(id.starts_with("rel-"));
        assert_eq!(id.len(), 20);
    }

    #[tokio::test]
    async fn test_cors_preflight_for_allowed_origin() {
        let response = app_with(test_config(None))
            .oneshot(
                Request::options("/api/recommendations")
                    .header("origin", "http://localhost:5173")
                    .header("access-control-request-method", "POST")
                    .header("access-control-request-headers", "content-type")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let headers = response.headers();
        assert_eq!(
            headers["access-control-allow-origin"],
            "http://localhost:5173"
        );
        assert_eq!(headers["access-control-allow-credentials"], "true");
        assert_eq!(headers["access-control-allow-methods"], "POST");
    }

    #[tokio::test]
    async fn test_cors_rejects_unknown_origin() {
        let response = app_with(test_config(None))
            .oneshot(
                Request::options("/api/recommendations")
                    .header("origin", "https://evil.test")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response
            .headers()
            .get("access-control-allow-origin")
            .is_none());
    }
}
