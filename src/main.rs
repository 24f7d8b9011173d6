//! Line chat server - Entry Point
//!
//! Binds the fixed chat port and accepts connections until killed.

use tracing::info;
use tracing_subscriber::EnvFilter;

use line_chat::{Listener, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=line_chat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("line_chat=info")),
        )
        .init();

    let config = ServerConfig::default();
    info!("Chat server starting on port {}", config.bind_addr.port());

    // Bind failure is fatal
    let listener = Listener::bind(&config).await?;
    info!("Chat server listening on {}", listener.local_addr()?);

    listener.run().await;
    Ok(())
}
