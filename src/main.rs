use std::time::Duration;

use clap::Parser;

use lifelog_server::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "lifelog-mcp", version, about = "Remote MCP server for the lifelog API")]
struct Args {
    /// Port to listen on.
    #[arg(long, env = "LIFELOG_MCP_PORT", default_value_t = 8787)]
    port: u16,

    /// Base URL of the upstream lifelog API.
    #[arg(long, env = "LIFELOG_UPSTREAM_URL", default_value = lifelog_client::DEFAULT_BASE_URL)]
    upstream_url: String,

    /// Seconds an idle session survives before eviction.
    #[arg(long, env = "LIFELOG_SESSION_TTL", default_value_t = 300)]
    session_ttl: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    tracing::info!("Starting lifelog MCP server");

    let config = ServerConfig {
        port: args.port,
        upstream_base_url: args.upstream_url,
        session_ttl: Duration::from_secs(args.session_ttl),
        ..Default::default()
    };

    let handle = lifelog_server::start(config)
        .await
        .expect("Failed to start server");

    tracing::info!(port = handle.port, "lifelog MCP server ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");

    tracing::info!("Shutting down");
}
