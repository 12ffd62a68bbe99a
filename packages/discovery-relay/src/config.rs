//! Relay configuration.
//!
//! Layers, lowest to highest priority: optional `relay.{toml,yaml,json}` file,
//! `RELAY_*` environment variables, then the two well-known variables
//! `GOOGLE_APPLICATION_CREDENTIALS` and `DISCOVERY_ENGINE_URL`.

use serde::Deserialize;
use std::collections::HashMap;

/// Path to the service-account key file.
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";
/// Discovery Engine serving endpoint.
pub const UPSTREAM_URL_ENV: &str = "DISCOVERY_ENGINE_URL";

/// Configuration for the relay. Immutable once loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Required per request; `None` surfaces as HTTP 400, not a startup failure.
    #[serde(default)]
    pub credentials_path: Option<String>,

    /// Required per request; `None` surfaces as HTTP 400, not a startup failure.
    #[serde(default)]
    pub upstream_url: Option<String>,

    #[serde(default = "defaults::bind_address")]
    pub bind_address: String,

    #[serde(default = "defaults::allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Keep built credentials across requests instead of reloading the key file.
    #[serde(default)]
    pub cache_credentials: bool,

    /// Upstream request timeout. `None` keeps the HTTP client default.
    #[serde(default)]
    pub upstream_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials_path: None,
            upstream_url: None,
            bind_address: defaults::bind_address(),
            allowed_origins: defaults::allowed_origins(),
            cache_credentials: false,
            upstream_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load from the optional `relay` file and the process environment.
    pub fn load() -> Result<Self, crate::Error> {
        Self::from_sources(
            Some(config::File::with_name("relay").required(false)),
            std::env::vars().collect(),
        )
    }

    /// Load from an explicit variable map only; no file is read.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, crate::Error> {
        Self::from_sources(None, vars)
    }

    fn from_sources(
        file: Option<config::File<config::FileSourceFile, config::FileFormat>>,
        vars: HashMap<String, String>,
    ) -> Result<Self, crate::Error> {
        let credentials_path = non_empty(&vars, CREDENTIALS_ENV);
        let upstream_url = non_empty(&vars, UPSTREAM_URL_ENV);

        let mut builder = config::Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(file);
        }

        builder
            .add_source(
                config::Environment::with_prefix("RELAY")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("allowed_origins")
                    .source(Some(vars)),
            )
            .set_override_option("credentials_path", credentials_path)
            .and_then(|b| b.set_override_option("upstream_url", upstream_url))
            .and_then(|b| b.build())
            .and_then(|c| c.try_deserialize())
            .map_err(|e| crate::Error::Config(format!("Invalid relay configuration: {e}")))
    }

    /// Credential path, or the error the handler reports when it is unset.
    pub fn require_credentials_path(&self) -> Result<&str, crate::Error> {
        self.credentials_path.as_deref().ok_or_else(|| {
            crate::Error::Config(format!("{CREDENTIALS_ENV} environment variable not set"))
        })
    }

    /// Upstream URL, or the error the handler reports when it is unset.
    pub fn require_upstream_url(&self) -> Result<&str, crate::Error> {
        self.upstream_url.as_deref().ok_or_else(|| {
            crate::Error::Config(format!("{UPSTREAM_URL_ENV} environment variable not set"))
        })
    }
}

fn non_empty(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

mod defaults {
    pub fn bind_address() -> String {
        "0.0.0.0:8000".into()
    }

    pub fn allowed_origins() -> Vec<String> {
        vec![
            "http://localhost:3000".into(),
            "http://localhost:5173".into(),
        ]
    }
}
