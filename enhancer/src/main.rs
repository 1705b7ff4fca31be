//! Prompt Enhancer command line entry point.

use anyhow::Context;
use clap::Parser;
use prompt_enhancer::cli::{self, Cli, Commands};
use prompt_enhancer::inference::EnhancementClient;
use prompt_enhancer::infrastructure::{
    audit, config::Settings, server, telemetry::TelemetryBuilder,
};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let settings = match cli.model.as_deref() {
        Some(model) => Settings::with_overrides([("service.model", model)]),
        None => Settings::new(),
    }
    .context("Failed to load configuration")?;

    let mut telemetry_builder =
        TelemetryBuilder::from_settings(&settings.telemetry, env!("CARGO_PKG_VERSION"));
    if cli.verbose {
        telemetry_builder = telemetry_builder.with_log_level("debug");
    }
    let _telemetry = telemetry_builder
        .init()
        .context("Failed to initialize telemetry")?;

    let client = Arc::new(
        EnhancementClient::from_config(settings.service.clone())
            .context("Failed to build enhancement client")?,
    );

    match cli.command {
        Commands::Enhance {
            file,
            style,
            focus_areas,
            max_length,
            examples,
            instructions,
        } => {
            let request = cli::enhancement_request(
                file.as_deref(),
                style,
                focus_areas,
                max_length,
                examples,
                instructions,
                std::io::stdin().lock(),
            )?;

            match client.enhance(request).await {
                Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                Err(err) => {
                    eprintln!("{}", serde_json::to_string_pretty(&err.details())?);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Commands::Health => {
            let report = client.health_check().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.healthy {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Serve => serve(&settings, client).await?,
    }

    Ok(ExitCode::SUCCESS)
}

async fn serve(settings: &Settings, client: Arc<EnhancementClient>) -> anyhow::Result<()> {
    info!("Prompt Enhancer Starting...");
    audit::log_audit(&audit::AuditEvent::ServiceStarted {
        model: settings.service.model.clone(),
    });

    let result = server::run_server(settings, client, shutdown_signal()).await;
    if let Err(e) = &result {
        error!("Control Plane failed: {:?}", e);
    }

    info!("Shutdown signal received, cleaning up...");
    audit::log_audit(&audit::AuditEvent::ServiceStopped {
        reason: if result.is_ok() {
            "Signal received".into()
        } else {
            "Control plane error".into()
        },
    });

    info!("Prompt Enhancer Shutdown Complete.");
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
