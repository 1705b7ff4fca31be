use crate::inference::EnhancementClient;
use crate::infrastructure::config::{BindAddress, Settings};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::future::Future;
use std::sync::Arc;

#[derive(Clone)]
struct AppState {
    client: Arc<EnhancementClient>,
    metrics: PrometheusHandle,
}

async fn liveness() -> &'static str {
    "OK"
}

async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.client.health_check().await;
    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.client.get_stats())
}

async fn reset_stats(State(state): State<AppState>) -> impl IntoResponse {
    state.client.reset_stats();
    Json(state.client.get_stats())
}

async fn config(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.client.get_config())
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}

/// Control plane routes for a client.
pub fn router(client: Arc<EnhancementClient>, metrics_handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .route("/stats", get(stats))
        .route("/stats/reset", post(reset_stats))
        .route("/config", get(config))
        .route("/metrics", get(metrics))
        .with_state(AppState {
            client,
            metrics: metrics_handle,
        })
}

/// Runs the control plane HTTP server until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the Prometheus recorder cannot be installed, or if
/// the server fails to start or encounters an error while running.
pub async fn run_server<S>(
    config: &Settings,
    client: Arc<EnhancementClient>,
    shutdown: S,
) -> anyhow::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {e}"))?;

    let app = router(client, handle);
    let addr = BindAddress::from(&config.server).to_socket_addr()?;

    tracing::info!("Control Plane listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
