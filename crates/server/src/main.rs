use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use admissions_server::{config::Config, flow::FlowEngine, server::Server, store::Registry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load()?;
    info!("Loaded configuration: {:?}", config);

    let registry = Arc::new(Registry::new());
    let engine = Arc::new(FlowEngine::new(registry));
    let server = Server::new(engine);

    info!("Starting server on {}", config.server.addr);
    server.start(&config.server.addr).await?;

    Ok(())
}
