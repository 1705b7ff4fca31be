/// Audit logging for operational events.
pub mod audit;
/// Configuration management for the enhancer.
pub mod config;
/// HTTP control plane.
pub mod server;
/// Telemetry setup for logging, tracing, and metrics.
pub mod telemetry;
