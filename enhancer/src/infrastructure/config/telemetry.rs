//! Telemetry configuration for the enhancer.
//!
//! This module defines log filtering and OpenTelemetry export settings.

use serde::Deserialize;

/// Telemetry configuration settings.
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetrySettings {
    /// Service name for telemetry.
    pub service_name: String,
    /// Default log filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP endpoint for traces.
    pub otlp_endpoint: Option<String>,
    /// Sampling ratio for traces.
    #[serde(default = "default_sampling")]
    pub sampling_ratio: f64,
}

pub(super) fn default_log_level() -> String {
    "info".to_string()
}

pub(super) fn default_sampling() -> f64 {
    1.0
}
