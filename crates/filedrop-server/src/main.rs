use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use filedrop_core::{AppState, UploadConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use config::{Config, Overrides};

#[derive(Debug, Parser)]
#[command(name = "filedrop-server", version, about = "Minimal HTTP file upload server")]
struct Cli {
    /// Path to a TOML config file (defaults to ./filedrop.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Directory uploaded files are written to (overrides UPLOAD_DIR)
    #[arg(long)]
    upload_dir: Option<PathBuf>,

    /// Maximum request body size in megabytes (overrides MAX_SIZE)
    #[arg(long)]
    max_size: Option<u64>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env()?;
    config.apply_overrides(&Overrides {
        port: cli.port,
        upload_dir: cli.upload_dir,
        max_size_mb: cli.max_size,
    });

    let upload = UploadConfig::with_max_megabytes(
        &config.storage.upload_dir,
        config.storage.max_size_mb,
    );
    upload.ensure_storage_dir().await.with_context(|| {
        format!(
            "Failed to create upload directory {:?}",
            config.storage.upload_dir
        )
    })?;

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server starting on {}", addr);
    tracing::info!("Upload directory: {}", config.storage.upload_dir.display());
    tracing::info!("Max file size: {} MB", config.storage.max_size_mb);

    let app = filedrop_api::build_router(AppState::new(upload));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "filedrop=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received terminate signal"),
    }
    tracing::info!("Shutting down gracefully...");
}
