//! # rmx
//!
//! rmx jam broker binary: loads settings, wires the broker into the
//! HTTP/WebSocket server and serves until ctrl-c.

#![deny(unsafe_code)]

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rmx_broker::Broker;
use rmx_server::{JamBroker, RmxServer};
use rmx_settings::RmxSettings;

/// rmx jam broker.
#[derive(Parser, Debug)]
#[command(name = "rmx", about = "Real-time jam room broker")]
struct Cli {
    /// Settings file (defaults to `~/.rmx/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Log level or filter directive (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Load settings and apply command-line overrides on top.
    fn settings(&self) -> Result<RmxSettings> {
        let mut settings = match &self.config {
            Some(path) => rmx_settings::load_settings_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => rmx_settings::load_settings().with_context(|| {
                format!(
                    "Failed to load settings from {}",
                    rmx_settings::settings_path().display()
                )
            })?,
        };

        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings()?;

    rmx_core::logging::init_subscriber(&settings.logging.level, settings.logging.json);

    let metrics = rmx_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let broker: Arc<JamBroker> = Arc::new(Broker::new(config::broker_config(&settings.broker)));
    let server = RmxServer::new(config::server_config(&settings), Arc::clone(&broker))
        .with_metrics(metrics);

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("rmx listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server
        .shutdown()
        .graceful_shutdown(&broker, vec![handle], None)
        .await;

    tracing::info!("Shutdown complete");
    Ok(())
}
