use anyhow::Context;
use clap::Parser;
use decoy_http_proxy::config::Config;
use decoy_http_proxy::matching::MatchingStrategy;
use decoy_http_proxy::middleware::{Middleware, DEFAULT_TIMEOUT};
use decoy_http_proxy::proxy::{ModeController, ProxyServer, ReqwestUpstream};
use decoy_http_proxy::recording::{Mode, ModeHandle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Decoy - HTTP(S) service virtualization proxy
#[derive(Parser, Debug)]
#[command(name = "decoy-http-proxy")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "DECOY_CONFIG")]
    config: Option<PathBuf>,

    /// Proxy listen port (overrides the configuration)
    #[arg(short, long, env = "DECOY_PORT")]
    port: Option<u16>,

    /// Initial mode: simulate, capture, modify, synthesize or spy
    #[arg(short, long, env = "DECOY_MODE")]
    mode: Option<Mode>,

    /// Pair selection: strongest or first
    #[arg(long, env = "DECOY_MATCHING_STRATEGY")]
    matching_strategy: Option<MatchingStrategy>,

    /// Simulation document to import at start-up
    #[arg(short, long)]
    simulation: Option<PathBuf>,

    /// Middleware command line or http(s) endpoint
    #[arg(long)]
    middleware: Option<String>,

    /// Write the current simulation here on shutdown
    #[arg(long)]
    export_on_exit: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match args.config {
        Some(ref path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.listen.port = port;
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(strategy) = args.matching_strategy {
        config.matching_strategy = strategy;
    }
    if let Some(ref simulation) = args.simulation {
        config.simulation = Some(simulation.clone());
    }
    if let Some(ref command) = args.middleware {
        config.middleware = Some(decoy_http_proxy::config::MiddlewareConfig {
            command: command.clone(),
            timeout_ms: config
                .middleware
                .as_ref()
                .map(|m| m.timeout_ms)
                .unwrap_or(DEFAULT_TIMEOUT.as_millis() as u64),
        });
    }
    config.validate()?;

    let upstream = ReqwestUpstream::new(Duration::from_secs(config.upstream.timeout_secs))?;
    let mut controller = ModeController::new(
        ModeHandle::new(config.mode),
        Arc::new(upstream),
        config.controller_settings(),
    );
    if let Some(ref mw) = config.middleware {
        controller = controller.with_middleware(Middleware::from_target(&mw.command, mw.timeout())?);
    }

    if let Some(ref path) = config.simulation {
        let document = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read simulation {}", path.display()))?;
        let count = controller
            .import_simulation(&document)
            .with_context(|| format!("Failed to import simulation {}", path.display()))?;
        info!("Imported {} pair(s) from {}", count, path.display());
    }

    let controller = Arc::new(controller);
    let server = ProxyServer::new(config, Arc::clone(&controller));

    tokio::select! {
        result = server.run() => {
            if let Err(ref e) = result {
                error!("Proxy server failed: {}", e);
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    if let Some(path) = args.export_on_exit {
        let document = controller.export_simulation()?;
        std::fs::write(&path, document)
            .with_context(|| format!("Failed to write simulation {}", path.display()))?;
        info!("Exported {} pair(s) to {}", controller.pairs().len(), path.display());
    }

    Ok(())
}
