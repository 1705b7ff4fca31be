//! Lifetime request statistics for one client.

use crate::inference::types::ErrorKind;
use crate::infrastructure::audit::{self, AuditEvent};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Counter for terminal outcomes, labelled by `outcome`.
pub const METRIC_REQUESTS_TOTAL: &str = "enhancer_requests_total";
/// Counter for failures, labelled by error `kind`.
pub const METRIC_ERRORS_TOTAL: &str = "enhancer_errors_total";
/// Counter for tokens consumed by successful calls.
pub const METRIC_TOKENS_TOTAL: &str = "enhancer_tokens_total";
/// Histogram of successful call latency.
pub const METRIC_REQUEST_DURATION_MS: &str = "enhancer_request_duration_ms";

/// Snapshot of the counters.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStats {
    /// Terminal outcomes recorded
    pub total_requests: u64,
    /// Successful outcomes
    pub successful_requests: u64,
    /// Failed outcomes
    pub failed_requests: u64,
    /// Mean latency of successful calls only
    pub average_response_time_ms: f64,
    /// Tokens consumed by successful calls
    pub total_tokens_used: u64,
    /// Failure histogram
    pub errors_by_kind: BTreeMap<ErrorKind, u64>,
    /// When the counters were last zeroed
    pub last_reset_time: DateTime<Utc>,
}

impl ServiceStats {
    fn zeroed(now: DateTime<Utc>) -> Self {
        Self {
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            average_response_time_ms: 0.0,
            total_tokens_used: 0,
            errors_by_kind: BTreeMap::new(),
            last_reset_time: now,
        }
    }
}

/// Accumulates [`ServiceStats`] across concurrent calls.
#[derive(Debug)]
pub struct StatsTracker {
    stats: Mutex<ServiceStats>,
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsTracker {
    /// Creates a tracker with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stats: Mutex::new(ServiceStats::zeroed(Utc::now())),
        }
    }

    /// Records a successful call.
    pub fn record_success(&self, latency_ms: u64, tokens: u64) {
        {
            let mut stats = self.stats.lock();
            stats.total_requests += 1;
            stats.successful_requests += 1;
            stats.total_tokens_used = stats.total_tokens_used.saturating_add(tokens);

            let n = stats.successful_requests as f64;
            stats.average_response_time_ms =
                (stats.average_response_time_ms * (n - 1.0) + latency_ms as f64) / n;
        }

        metrics::counter!(METRIC_REQUESTS_TOTAL, "outcome" => "success").increment(1);
        metrics::counter!(METRIC_TOKENS_TOTAL).increment(tokens);
        metrics::histogram!(METRIC_REQUEST_DURATION_MS).record(latency_ms as f64);
    }

    /// Records a failed call.
    pub fn record_failure(&self, kind: ErrorKind) {
        {
            let mut stats = self.stats.lock();
            stats.total_requests += 1;
            stats.failed_requests += 1;
            *stats.errors_by_kind.entry(kind).or_insert(0) += 1;
        }

        metrics::counter!(METRIC_REQUESTS_TOTAL, "outcome" => "failure").increment(1);
        metrics::counter!(METRIC_ERRORS_TOTAL, "kind" => kind.as_str()).increment(1);
    }

    /// Zeroes every counter and stamps the reset time.
    pub fn reset(&self) {
        let previous_total = {
            let mut stats = self.stats.lock();
            // Keep the reset time monotonic even if the wall clock steps back
            let now = Utc::now().max(stats.last_reset_time);
            let previous_total = stats.total_requests;
            *stats = ServiceStats::zeroed(now);
            previous_total
        };

        info!(previous_total, "Statistics reset");
        audit::log_audit(&AuditEvent::StatsReset {
            total_requests: previous_total,
        });
    }

    /// Copy of the current counters.
    #[must_use]
    pub fn snapshot(&self) -> ServiceStats {
        self.stats.lock().clone()
    }
}
