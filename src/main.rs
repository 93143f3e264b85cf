use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use netzap_console::command::ScanConfig;
use netzap_console::engine::HttpEngine;
use netzap_console::orchestrator::ScanOrchestrator;
use netzap_console::server::{self, AppState, ServerConfig};
use netzap_console::store::MemoryStore;

/// netzap-console: web console that configures ZMap scans and keeps their results.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "netzap-console",
    version,
    about = "Web console that configures ZMap scans, hands them to a scan engine service and keeps their results.",
    long_about = None
)]
struct Cli {
    /// Address the HTTP console listens on.
    #[arg(long, env = "NETZAP_BIND", default_value = "127.0.0.1:8080")]
    bind: String,

    /// Base URL of the scan engine service.
    #[arg(long = "engine-url", env = "NETZAP_ENGINE_URL", default_value = "http://netzap-backend:8000")]
    engine_url: String,

    /// Upper bound on one engine request, a synchronous scan included.
    #[arg(long = "engine-timeout-secs", env = "NETZAP_ENGINE_TIMEOUT_SECS", default_value_t = 600)]
    engine_timeout_secs: u64,

    /// Directory with the static UI.
    #[arg(long = "ui-dir", env = "NETZAP_UI_DIR", default_value = "ui")]
    ui_dir: PathBuf,

    /// Print the zmap command for a JSON scan configuration and exit.
    #[arg(long)]
    preview: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = cli.preview.as_deref() {
        let config = read_config(path)?;
        println!("{}", config.command_line());
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("netzap_console=info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        bind = %cli.bind,
        engine_url = %cli.engine_url,
        engine_timeout_secs = cli.engine_timeout_secs,
        ui_dir = %cli.ui_dir.display(),
        "netzap-console configuration"
    );

    let engine = HttpEngine::new(&cli.engine_url, Duration::from_secs(cli.engine_timeout_secs))
        .context("failed to build scan engine client")?;
    let orchestrator = ScanOrchestrator::new(Arc::new(MemoryStore::new()), Arc::new(engine));
    let state = AppState::new(orchestrator);

    let shutdown = CancellationToken::new();
    let on_ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutting down");
        on_ctrl_c.cancel();
    });

    let config = ServerConfig {
        bind: cli.bind,
        ui_dir: cli.ui_dir,
    };
    server::spawn_server(config, state, shutdown).await
}

fn read_config(path: &Path) -> Result<ScanConfig> {
    let file = File::open(path)
        .with_context(|| format!("failed to open scan configuration: {}", path.display()))?;
    serde_json::from_reader(file)
        .with_context(|| format!("invalid scan configuration: {}", path.display()))
}
