mod config;
mod container;
mod daemon;
mod error;
mod logs;
mod players;
mod rcon;
mod router;
mod websocket;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::Level;

use container::{ContainerRuntime, DockerRuntime, LifecycleEvent, LifecycleManager};
use logs::LogBroker;
use rcon::{Console, RconClient};

#[derive(Parser)]
#[command(name = "blockd")]
#[command(about = "Control plane for a containerised game server", long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long = "config", default_value = "config.json")]
    config: String,

    /// Verbose logging
    #[arg(long = "dev")]
    dev: bool,

    /// Validate the configuration and exit
    #[arg(long = "check-config")]
    check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.dev { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = config::config::Config::load(&cli.config)
        .with_context(|| format!("Invalid configuration (see {})", cli.config))?;

    if cli.check_config {
        println!("Configuration OK");
        return Ok(());
    }

    daemon::start::print_banner(&config);

    let docker = DockerRuntime::connect().context("Failed to connect to Docker")?;
    docker
        .ping()
        .await
        .context("Please ensure the Docker daemon is running and try again")?;
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(docker);

    let (lifecycle, mut lifecycle_rx) =
        LifecycleManager::new(runtime.clone(), config.provision_settings()?);
    let lifecycle = Arc::new(lifecycle);

    // Spawn lifecycle event listener
    tokio::spawn(async move {
        while let Some(event) = lifecycle_rx.recv().await {
            match &event {
                LifecycleEvent::Error(name, msg) => {
                    tracing::error!("Container {} lifecycle error: {}", name, msg);
                }
                LifecycleEvent::StepSkipped(..) => {
                    tracing::debug!("Container lifecycle event: {:?}", event);
                }
                _ => tracing::info!("Container lifecycle event: {:?}", event),
            }
        }
    });

    let console: Arc<dyn Console> = Arc::new(RconClient::new(config.console_settings()?));
    let broker = Arc::new(LogBroker::new(runtime.clone(), config.container.name.clone()));

    let cors = match &config.cors.allowed_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(
                origin
                    .parse::<HeaderValue>()
                    .with_context(|| format!("Invalid CORS origin: {}", origin))?,
            )
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    let app = router::public::public_router(lifecycle.clone(), broker.clone())
        .merge(router::server::server_router(lifecycle, console))
        .merge(websocket::ws_router(broker))
        .layer(cors);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(daemon::start::shutdown_signal())
        .await
        .context("Server failed")?;

    Ok(())
}
