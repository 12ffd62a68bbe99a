//! Application state shared across handlers.

use crate::config::Config;
use crate::credentials::TokenProvider;
use std::sync::atomic::AtomicU64;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub http: reqwest::Client,
    pub tokens: TokenProvider,
    pub start_time: Instant,
    pub request_count: AtomicU64,
}

impl AppState {
    /// Create application state from configuration.
    pub fn new(config: Config) -> Result<Self, crate::Error> {
        let tokens = TokenProvider::service_account(config.cache_credentials);
        Self::with_tokens(config, tokens)
    }

    pub(crate) fn with_tokens(config: Config, tokens: TokenProvider) -> Result<Self, crate::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.upstream_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| crate::Error::Config(format!("HTTP client build failed: {e}")))?;

        if config.credentials_path.is_none() {
            warn!("GOOGLE_APPLICATION_CREDENTIALS not set; requests will fail with 400");
        }
        if config.upstream_url.is_none() {
            warn!("DISCOVERY_ENGINE_URL not set; requests will fail with 400");
        }
        info!(
            upstream = config.upstream_url.as_deref().unwrap_or("<unset>"),
            timeout_secs = ?config.upstream_timeout_secs,
            "Relay state initialized"
        );

        Ok(Self {
            config,
            http,
            tokens,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
        })
    }
}
