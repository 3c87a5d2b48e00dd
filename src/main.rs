//! Chat Relay Server - Entry Point
//!
//! Binds the listening socket and runs the relay until a client sends
//! SHUTDOWN or the operator presses Ctrl-C.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_relay::config::{DEFAULT_HOST, DEFAULT_PORT};
use chat_relay::{listener, ServerConfig};

/// Broadcast chat relay server
#[derive(Parser, Debug)]
#[command(name = "chat_relay", version, about)]
struct Args {
    /// Interface to bind
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        ..ServerConfig::default()
    };

    // Start TCP listener
    let tcp = listener::bind(&config).await.inspect_err(|e| {
        error!("{}", e);
    })?;
    info!("Chat relay listening on {}", config.addr());

    listener::serve(tcp, config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await?;

    info!("Chat relay stopped");
    Ok(())
}
