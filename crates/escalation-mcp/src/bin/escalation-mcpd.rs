use std::sync::Arc;

use escalation_mcp::{serve_http, serve_stdio, McpServer, ServerConfig, Transport};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ServerConfig::from_env()?;
    for name in &config.defaulted {
        warn!(
            variable = name,
            "environment variable not set, using default"
        );
    }
    let server = Arc::new(McpServer::from_config(&config).await?);
    match config.transport {
        Transport::Stdio => serve_stdio(server).await?,
        Transport::Http => serve_http(server, &config.bind_addr()).await?,
    }
    Ok(())
}
