//! Line chat client - Entry Point
//!
//! Usage: `line_chat_client [host] [port]`

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use line_chat::{client, ClientConfig};

#[tokio::main]
async fn main() -> ExitCode {
    // Quiet by default so chat output on stdout stays readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("line_chat=warn")),
        )
        .init();

    let config = ClientConfig::parse();

    match client::run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Connection error: {}", e);
            ExitCode::FAILURE
        }
    }
}
