//! Service-account bearer tokens for Google Cloud.
//!
//! By default the key file is reloaded on every call, so a rotated key is
//! picked up without a restart. With `cache_credentials` the built
//! credentials are kept per path and `google-cloud-auth` serves its cached
//! token until it nears expiry.

use google_cloud_auth::credentials::service_account::{AccessSpecifier, Builder};
use google_cloud_auth::credentials::AccessTokenCredentials;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;
use tracing::{debug, info};

use crate::metrics::METRICS;

/// Access scope requested for every token.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Produces bearer tokens from a service-account key path.
pub enum TokenProvider {
    ServiceAccount {
        /// `None` when caching is disabled.
        cache: Option<RwLock<HashMap<String, AccessTokenCredentials>>>,
    },
    #[cfg(test)]
    Fixed(String),
}

impl TokenProvider {
    pub fn service_account(cache_credentials: bool) -> Self {
        if cache_credentials {
            info!("Service-account credential cache enabled");
        }
        TokenProvider::ServiceAccount {
            cache: cache_credentials.then(|| RwLock::new(HashMap::new())),
        }
    }

    /// Obtain a bearer token for `credentials_path`.
    pub async fn obtain_token(&self, credentials_path: &str) -> Result<String, crate::Error> {
        match self {
            TokenProvider::ServiceAccount { cache } => {
                let start = Instant::now();
                let credentials = match cache {
                    Some(cache) => cached_credentials(cache, credentials_path).await?,
                    None => load_credentials(credentials_path).await?,
                };
                let token = credentials
                    .access_token()
                    .await
                    .map_err(|e| crate::Error::Auth(e.to_string()))?;
                METRICS.record_token_duration(start);
                debug!(path = credentials_path, "Access token obtained");
                Ok(token.token)
            }
            #[cfg(test)]
            TokenProvider::Fixed(token) => Ok(token.clone()),
        }
    }
}

/// Read the key file and build cloud-platform scoped credentials.
pub async fn load_credentials(
    credentials_path: &str,
) -> Result<AccessTokenCredentials, crate::Error> {
    let raw = tokio::fs::read_to_string(credentials_path)
        .await
        .map_err(|e| crate::Error::Auth(format!("cannot read {credentials_path}: {e}")))?;

    let key: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| crate::Error::Auth(format!("invalid key file {credentials_path}: {e}")))?;

    Builder::new(key)
        .with_access_specifier(AccessSpecifier::from_scopes([CLOUD_PLATFORM_SCOPE]))
        .build_access_token_credentials()
        .map_err(|e| crate::Error::Auth(e.to_string()))
}

async fn cached_credentials(
    cache: &RwLock<HashMap<String, AccessTokenCredentials>>,
    credentials_path: &str,
) -> Result<AccessTokenCredentials, crate::Error> {
    let hit = cache
        .read()
        .ok()
        .and_then(|map| map.get(credentials_path).cloned());
    if let Some(credentials) = hit {
        return Ok(credentials);
    }

    let credentials = load_credentials(credentials_path).await?;
    if let Ok(mut map) = cache.write() {
        map.insert(credentials_path.to_string(), credentials.clone());
    }
    info!(path = credentials_path, "Cached service-account credentials");
    Ok(credentials)
}
