use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, info_span};

/// Domain event for audit logging.
/// Structured for JSON serialization to enable machine-readable audit trails.
#[derive(Debug, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// The process started serving with the given model
    ServiceStarted {
        /// Configured model identifier
        model: String,
    },
    /// The process is shutting down
    ServiceStopped {
        /// Why it stopped
        reason: String,
    },
    /// The circuit breaker started rejecting calls
    CircuitOpened {
        /// Failures inside the monitoring window at the time of opening
        failures: usize,
        /// When a probe will be let through
        next_attempt_time: DateTime<Utc>,
    },
    /// The circuit breaker let a probe through
    CircuitHalfOpened,
    /// The circuit breaker resumed normal operation
    CircuitClosed,
    /// Statistics were cleared
    StatsReset {
        /// Requests counted before the reset
        total_requests: u64,
    },
}

/// Logs an audit event to the dedicated audit channel as structured JSON.
/// This uses a specific `target` which can be filtered by the subscriber to redirect to a separate sink.
pub fn log_audit(event: &AuditEvent) {
    let span = info_span!(target: "audit", "audit_event");
    let _enter = span.enter();

    let json = serde_json::to_string(event).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"));
    info!(target: "audit", audit_json = %json, "Audit Event");
}
