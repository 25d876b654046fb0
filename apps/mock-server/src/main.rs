//! Standalone in-memory JSON-RPC server.
//!
//! Serves database management, login and `res.user` model calls until
//! interrupted with Ctrl+C.

use std::net::SocketAddr;

use clap::Parser;
use erp_mock_server::{MockServer, MockServerConfig};
use tokio::signal;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the mock server.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8000)]
    port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Request timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    request_timeout_ms: u64,

    /// Password required for database management calls
    #[arg(long, default_value = "admin")]
    super_password: String,

    /// Language used when a database is created without one
    #[arg(long, default_value = "en_US")]
    default_language: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = MockServerConfig {
        request_timeout_ms: args.request_timeout_ms,
        super_password: args.super_password,
        default_language: args.default_language,
        ..Default::default()
    };

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let server = MockServer::bind(addr, config).await?;

    println!("Starting mock JSON-RPC server...");
    println!("  Listening: http://{}", server.local_addr()?);
    println!("  Request timeout: {} ms", args.request_timeout_ms);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.serve().await {
            tracing::error!("Server error: {}", e);
        }
    });

    signal::ctrl_c().await?;
    println!("\nShutting down server...");
    server_handle.abort();

    Ok(())
}
