//! Spacebrew Router Server
//!
//! Connects to an MQTT broker, accepts client registrations, forwards
//! messages along the route table and serves the operator shell and the
//! web API.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use spacebrew_bridge::{MqttTransport, WebServer};
use spacebrew_router::{Router, Transport};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod shell;

use config::Config;
use shell::Shell;

#[derive(Parser, Debug)]
#[command(name = "spacebrew-router")]
#[command(about = "Spacebrew 2.0 router")]
#[command(version)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// MQTT broker host
    #[arg(short, long)]
    pub server: Option<String>,

    /// MQTT broker port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Route file path
    #[arg(short, long)]
    pub routes: Option<PathBuf>,

    /// Web interface bind address
    #[arg(long)]
    pub web_bind: Option<String>,

    /// Do not start the web interface
    #[arg(long)]
    pub no_web: bool,

    /// Do not read commands from stdin
    #[arg(long)]
    pub no_shell: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs)?;

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.apply_cli(&cli);

    info!("Starting Spacebrew router");

    let router = Router::new(config.router_config());
    match router.load_routes() {
        Ok(report) if report.skipped > 0 => warn!(
            "Loaded {} routes, skipped {} malformed lines",
            report.loaded, report.skipped
        ),
        Ok(_) => {}
        Err(e) => error!(
            "Error loading routes: {}. Continuing with {} routes in memory.",
            e,
            router.routes().len()
        ),
    }

    // Broker connection; failing to connect ends the process
    let (transport, eventloop) = MqttTransport::new(&config.broker);
    let transport: Arc<dyn Transport> = Arc::new(transport);
    let mqtt = eventloop
        .start(router.dispatcher(transport.clone()))
        .await
        .with_context(|| {
            format!(
                "Could not connect to MQTT broker at {}",
                config.broker.endpoint()
            )
        })?;

    let control = router.control(transport.clone());
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    // Web interface
    let web = if config.web.enabled {
        let server = WebServer::new(
            config.web.server.clone(),
            control.clone(),
            router.events().clone(),
        );
        let mut rx = shutdown_rx.clone();
        let shutdown_tx = shutdown_tx.clone();
        Some(tokio::spawn(async move {
            let result = server
                .serve(async move {
                    let _ = rx.wait_for(|stop| *stop).await;
                })
                .await;
            if let Err(e) = &result {
                error!("Web interface failed: {}", e);
                let _ = shutdown_tx.send(true);
            }
            result
        }))
    } else {
        None
    };

    // Interactive shell
    if !cli.no_shell {
        let shell = Shell::new(control);
        let shutdown_tx = shutdown_tx.clone();
        let runtime = tokio::runtime::Handle::current();
        std::thread::Builder::new()
            .name("shell".to_string())
            .spawn(move || {
                let _guard = runtime.enter();
                shell::run(shell, shutdown_tx);
            })
            .context("Failed to start shell thread")?;
    } else {
        println!(
            "{} Router running at {}. Press Ctrl+C to stop.",
            "Spacebrew".cyan().bold(),
            transport.endpoint()
        );
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for ctrl+c: {}", e);
            }
            info!("Received shutdown signal");
        }
        _ = shutdown_rx.wait_for(|stop| *stop) => {}
    }

    let _ = shutdown_tx.send(true);

    if let Some(web) = web {
        match web.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Web interface ended with error: {}", e),
            Err(e) => warn!("Web interface task failed: {}", e),
        }
    }

    mqtt.shutdown().await?;
    info!("Spacebrew router stopped");

    Ok(())
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .init();
    }

    Ok(())
}
