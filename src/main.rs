//! # Spectr Server
//!
//! Entry point: tracing, configuration, then the HTTP and WebSocket server.

use anyhow::Result;
use tracing::info;

use spectr_server::config::Settings;
use spectr_server::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    spectr_server::telemetry::init_tracing();

    info!("Starting Spectr server...");

    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        backend = ?settings.database.backend,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
