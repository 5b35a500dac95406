use aip_common::observability::{init_logging, LogConfig};
use aip_config::AipConfigLoader;
use aip_server::{router, serve, AppState};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Relay chat text to a hosted or local LLM and keep the chat history on disk.
#[derive(Debug, Parser)]
#[command(name = "aip-server", version)]
struct Cli {
    /// YAML config file; may be absent when configuring through `AIP__*` variables.
    #[arg(short, long, env = "AIP_CONFIG", default_value = "aip.yaml")]
    config: PathBuf,

    /// Override `server.bind`.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = AipConfigLoader::new()
        .with_optional_file(&cli.config)
        .load()
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let log_path = init_logging(LogConfig {
        app_name: "aip-server",
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.emit_stderr,
        format: cfg.logging.format,
        default_filter: cfg.logging.filter.clone(),
    })?;
    tracing::info!(log = %log_path.display(), "aip-server starting");

    let state = AppState::from_config(&cfg).await?;
    let app = router(state, &cfg.server.allowed_origin)?;

    let bind = cli.bind.unwrap_or_else(|| cfg.server.bind.clone());
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown requested");
                trigger.cancel();
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    serve(listener, app, shutdown).await?;
    tracing::info!("aip-server stopped");
    Ok(())
}
