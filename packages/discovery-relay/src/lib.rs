//! # Discovery Relay
//!
//! A thin authenticated relay for Google Discovery Engine. Mints a bearer
//! token from a service-account key, forwards the caller's JSON body to the
//! configured serving endpoint, and relays the answer back.
//!
//! ## Quick Start
//! ```bash
//! GOOGLE_APPLICATION_CREDENTIALS=./sa.json \
//! DISCOVERY_ENGINE_URL=https://discoveryengine.googleapis.com/v1beta/...:recommend \
//! cargo run --bin discovery-relay
//! ```
//!
//! ## Endpoints
//! - `POST /api/recommendations` - Forward payload to Discovery Engine
//! - `GET /health` - Configuration status and uptime
//! - `GET /metrics` - Prometheus counters

pub mod config;
pub mod credentials;
mod error;
mod handlers;
pub mod metrics;
mod middleware;
pub mod relay;
mod response;
mod router;
mod state;

pub use config::Config;
pub use error::Error;
pub use router::create as create_router;
pub use state::AppState;
