//! Configuration management for the enhancer.
//!
//! Settings are layered: built-in defaults, then environment variables
//! prefixed with `ENHANCER` (sections separated by `__`), then explicit
//! in-process overrides. The plain `ANTHROPIC_API_KEY` variable is honoured
//! as a fallback credential.
//!
//! # Example
//!
//! ```no_run
//! use prompt_enhancer::infrastructure::config::Settings;
//!
//! let settings = Settings::new().expect("Failed to load configuration");
//! ```

pub mod server;
pub mod service;
pub mod telemetry;

pub use server::ServerSettings;
pub use service::{DEFAULT_BASE_URL, DEFAULT_MODEL, REDACTED, RedactedConfig, ServiceConfig};
pub use telemetry::TelemetrySettings;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Environment variable consulted when no prefixed credential is set.
pub const FALLBACK_API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// Top-level configuration for the enhancer.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Client settings.
    pub service: ServiceConfig,
    /// Control plane settings.
    pub server: ServerSettings,
    /// Telemetry settings.
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Creates a new settings instance from environment variables and defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be built or deserialized.
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_overrides(std::iter::empty::<(&str, &str)>())
    }

    /// Like [`Settings::new`], with `key = value` overrides applied last.
    ///
    /// Keys use dotted paths such as `service.max_tokens`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be built or deserialized.
    pub fn with_overrides<I, K, V>(overrides: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<config::Value>,
    {
        let fallback_key = std::env::var(FALLBACK_API_KEY_VAR).unwrap_or_default();

        let mut builder = Config::builder()
            // Start with default values
            .set_default("service.api_key", fallback_key)?
            .set_default("service.base_url", service::default_base_url())?
            .set_default("service.model", service::default_model())?
            .set_default("service.max_tokens", service::default_max_tokens())?
            .set_default("service.timeout_ms", service::default_timeout_ms())?
            .set_default("service.max_retries", service::default_max_retries())?
            .set_default("service.retry_delay_ms", service::default_retry_delay_ms())?
            .set_default(
                "service.max_retry_delay_ms",
                service::default_max_retry_delay_ms(),
            )?
            .set_default(
                "service.circuit_breaker_threshold",
                service::default_circuit_breaker_threshold(),
            )?
            .set_default(
                "service.circuit_breaker_reset_timeout_ms",
                service::default_circuit_breaker_reset_timeout_ms(),
            )?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 9090)?
            .set_default("telemetry.service_name", "prompt-enhancer")?
            .set_default("telemetry.log_level", telemetry::default_log_level())?
            .set_default("telemetry.sampling_ratio", telemetry::default_sampling())?
            // Merge in Environment variables
            .add_source(Environment::with_prefix("ENHANCER").separator("__"));

        for (key, value) in overrides {
            builder = builder.set_override(key.as_ref(), value)?;
        }

        builder.build()?.try_deserialize()
    }
}

/// Helper for strong typing addresses
pub struct BindAddress(pub String, pub u16);

impl BindAddress {
    /// Converts the bind address to a `SocketAddr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the IP address string cannot be parsed.
    pub fn to_socket_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        let ip = self
            .0
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid IP address '{}': {e}", self.0))?;
        Ok(std::net::SocketAddr::new(ip, self.1))
    }
}

impl From<&ServerSettings> for BindAddress {
    fn from(settings: &ServerSettings) -> Self {
        Self(settings.host.clone(), settings.port)
    }
}
