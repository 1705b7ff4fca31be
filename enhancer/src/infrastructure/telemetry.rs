use crate::infrastructure::config::TelemetrySettings;
use anyhow::{Context, Result};
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource, propagation::TraceContextPropagator, trace::Sampler, trace::SdkTracerProvider,
};
use opentelemetry_semantic_conventions::resource;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Builder for setting up telemetry (logging and tracing).
pub struct TelemetryBuilder {
    service_name: String,
    service_version: String,
    otlp_endpoint: Option<String>,
    log_level: String,
    sampling_ratio: f64,
}

/// Keeps the span exporter alive; flushes pending spans on drop.
#[must_use = "dropping the guard shuts the span exporter down"]
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("Failed to shut down tracer provider: {e}");
            }
        }
    }
}

impl TelemetryBuilder {
    /// Creates a builder that logs JSON at `info` without span export.
    pub fn new(service_name: impl Into<String>, service_version: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_version: service_version.into(),
            otlp_endpoint: None,
            log_level: "info".to_string(),
            sampling_ratio: 1.0,
        }
    }

    /// Creates a builder from loaded settings.
    #[must_use]
    pub fn from_settings(settings: &TelemetrySettings, service_version: impl Into<String>) -> Self {
        let mut builder = Self::new(settings.service_name.clone(), service_version)
            .with_log_level(settings.log_level.clone())
            .with_sampling_ratio(settings.sampling_ratio);
        if let Some(endpoint) = settings.otlp_endpoint.as_deref().filter(|e| !e.is_empty()) {
            builder = builder.with_tracing(endpoint);
        }
        builder
    }

    /// Exports spans to the given OTLP gRPC endpoint.
    #[must_use]
    pub fn with_tracing(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    /// Sets the filter used when `RUST_LOG` is unset.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Sets the trace sampling ratio.
    #[must_use]
    pub fn with_sampling_ratio(mut self, ratio: f64) -> Self {
        self.sampling_ratio = ratio;
        self
    }

    /// Initializes the telemetry system with configured exporters.
    ///
    /// Logs go to stderr so stdout stays free for command output.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The OTLP span exporter cannot be built
    /// - The tracing subscriber cannot be initialized
    pub fn init(self) -> Result<TelemetryGuard> {
        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_level));

        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE)
            .boxed();

        let registry = Registry::default().with(env_filter).with(fmt_layer);

        let Some(endpoint) = self.otlp_endpoint else {
            registry.try_init().context("Failed to init subscriber")?;
            return Ok(TelemetryGuard { provider: None });
        };

        let resource = Resource::builder()
            .with_attributes(vec![
                opentelemetry::KeyValue::new(resource::SERVICE_NAME, self.service_name.clone()),
                opentelemetry::KeyValue::new(resource::SERVICE_VERSION, self.service_version),
            ])
            .build();

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .context("Failed to build OTLP span exporter")?;

        let processor = opentelemetry_sdk::trace::BatchSpanProcessor::builder(exporter).build();

        let provider = SdkTracerProvider::builder()
            .with_span_processor(processor)
            .with_resource(resource)
            .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
                self.sampling_ratio,
            ))))
            .build();

        opentelemetry::global::set_tracer_provider(provider.clone());

        let tracer = provider.tracer(self.service_name);
        let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);

        registry
            .with(telemetry_layer)
            .try_init()
            .context("Failed to init subscriber")?;

        Ok(TelemetryGuard {
            provider: Some(provider),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings_skips_empty_endpoint() {
        let settings = TelemetrySettings {
            service_name: "prompt-enhancer".to_string(),
            log_level: "debug".to_string(),
            otlp_endpoint: Some(String::new()),
            sampling_ratio: 0.5,
        };
        let builder = TelemetryBuilder::from_settings(&settings, "0.1.0");
        assert!(builder.otlp_endpoint.is_none());
        assert_eq!(builder.log_level, "debug");
        assert!((builder.sampling_ratio - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_from_settings_with_endpoint() {
        let settings = TelemetrySettings {
            service_name: "prompt-enhancer".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: Some("http://localhost:4317".to_string()),
            sampling_ratio: 1.0,
        };
        let builder = TelemetryBuilder::from_settings(&settings, "0.1.0");
        assert_eq!(builder.otlp_endpoint.as_deref(), Some("http://localhost:4317"));
    }
}
