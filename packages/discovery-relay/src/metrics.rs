//! Relay counters, exported in Prometheus text format on `GET /metrics`.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    // --- Traffic ---
    pub relay_total: AtomicU64,
    pub relay_success: AtomicU64,

    // --- Failures by kind ---
    pub config_errors: AtomicU64,
    pub auth_errors: AtomicU64,
    pub upstream_errors: AtomicU64,
    pub invalid_payloads: AtomicU64,
    pub internal_errors: AtomicU64,

    // --- Latency (μs) ---
    pub relay_duration_us_sum: AtomicU64,
    pub relay_duration_us_max: AtomicU64,
    pub token_total: AtomicU64,
    pub token_duration_us_sum: AtomicU64,
}

impl Metrics {
    const fn new() -> Self {
        Self {
            relay_total: AtomicU64::new(0),
            relay_success: AtomicU64::new(0),
            config_errors: AtomicU64::new(0),
            auth_errors: AtomicU64::new(0),
            upstream_errors: AtomicU64::new(0),
            invalid_payloads: AtomicU64::new(0),
            internal_errors: AtomicU64::new(0),
            relay_duration_us_sum: AtomicU64::new(0),
            relay_duration_us_max: AtomicU64::new(0),
            token_total: AtomicU64::new(0),
            token_duration_us_sum: AtomicU64::new(0),
        }
    }

    pub fn record_relay_duration(&self, start: Instant) {
        let us = elapsed_us(start);
        self.relay_duration_us_sum.fetch_add(us, Ordering::Relaxed);
        self.relay_duration_us_max.fetch_max(us, Ordering::Relaxed);
    }

    pub fn record_token_duration(&self, start: Instant) {
        self.token_duration_us_sum
            .fetch_add(elapsed_us(start), Ordering::Relaxed);
        self.token_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failed relay under its error kind.
    pub fn record_error(&self, err: &crate::Error) {
        let counter = match err {
            crate::Error::Config(_) => &self.config_errors,
            crate::Error::Auth(_) => &self.auth_errors,
            crate::Error::Upstream { .. } => &self.upstream_errors,
            crate::Error::InvalidPayload(_) => &self.invalid_payloads,
            crate::Error::Internal(_) => &self.internal_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Render in Prometheus text exposition format.
    ///
    /// The max-duration gauge covers the window since the previous scrape.
    pub fn render(&self) -> String {
        let load = |a: &AtomicU64| a.load(Ordering::Relaxed);
        let mut out = String::with_capacity(2048);

        family(&mut out, "relay_requests_total", "counter", "Total recommendation requests received.");
        sample(&mut out, "relay_requests_total", "", load(&self.relay_total));

        family(&mut out, "relay_success_total", "counter", "Requests answered with upstream 200.");
        sample(&mut out, "relay_success_total", "", load(&self.relay_success));

        family(&mut out, "relay_errors_total", "counter", "Failed requests by kind.");
        for (kind, counter) in [
            ("config", &self.config_errors),
            ("auth", &self.auth_errors),
            ("upstream", &self.upstream_errors),
            ("invalid_payload", &self.invalid_payloads),
            ("internal", &self.internal_errors),
        ] {
            sample(&mut out, "relay_errors_total", &format!("{{kind=\"{kind}\"}}"), load(counter));
        }

        family(&mut out, "relay_duration_seconds_sum", "counter", "Total handler time (seconds).");
        seconds(&mut out, "relay_duration_seconds_sum", load(&self.relay_duration_us_sum));

        family(&mut out, "relay_duration_seconds_max", "gauge", "Max handler time since last scrape (seconds).");
        seconds(
            &mut out,
            "relay_duration_seconds_max",
            self.relay_duration_us_max.swap(0, Ordering::Relaxed),
        );

        family(&mut out, "relay_token_total", "counter", "Access tokens obtained.");
        sample(&mut out, "relay_token_total", "", load(&self.token_total));

        family(&mut out, "relay_token_duration_seconds_sum", "counter", "Total token acquisition time (seconds).");
        seconds(&mut out, "relay_token_duration_seconds_sum", load(&self.token_duration_us_sum));

        out
    }
}

fn elapsed_us(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX)
}

fn family(out: &mut String, name: &str, kind: &str, help: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
}

fn sample(out: &mut String, name: &str, labels: &str, value: u64) {
    let _ = writeln!(out, "{name}{labels} {value}");
}

fn seconds(out: &mut String, name: &str, micros: u64) {
    let _ = writeln!(out, "{name} {:.6}", micros as f64 / 1_000_000.0);
}
