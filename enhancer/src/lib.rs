//! Prompt Enhancer - resilient client for turning draft instructions into
//! enhanced instructions.
//!
//! The client wraps a remote completion API with a circuit breaker, bounded
//! retries with jittered exponential backoff, per-attempt timeouts and
//! lifetime statistics. Configuration, telemetry, audit logging and a small
//! HTTP control plane live under [`infrastructure`].

#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Command line interface.
pub mod cli;
/// Enhancement client and its resilience layers.
pub mod inference;
/// Infrastructure components (config, server, telemetry).
pub mod infrastructure;
