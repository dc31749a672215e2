use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::routes::{build_router, AppState};
use crate::session::{self, SessionConfig, SessionMap, EMPTY_BODY_TIMEOUT};

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    pub upstream_base_url: String,
    /// How long an actor may stay idle before the sweep evicts it.
    pub session_ttl: Duration,
    pub eviction_interval: Duration,
    pub empty_body_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8787,
            upstream_base_url: lifelog_client::DEFAULT_BASE_URL.to_string(),
            session_ttl: Duration::from_secs(300),
            eviction_interval: Duration::from_secs(60),
            empty_body_timeout: EMPTY_BODY_TIMEOUT,
        }
    }
}

/// Handle returned by `start()` — keeps the background tasks alive.
pub struct ServerHandle {
    pub port: u16,
    pub sessions: Arc<SessionMap>,
    _server: JoinHandle<()>,
    _eviction: JoinHandle<()>,
}

/// Create and start the server. Returns once the listener is bound.
pub async fn start(config: ServerConfig) -> Result<ServerHandle, std::io::Error> {
    let session_config = SessionConfig {
        upstream_base_url: config.upstream_base_url.clone(),
        empty_body_timeout: config.empty_body_timeout,
    };
    let sessions = Arc::new(SessionMap::new(session_config, config.session_ttl));
    let eviction = session::start_eviction_task(Arc::clone(&sessions), config.eviction_interval);

    let state = AppState {
        sessions: Arc::clone(&sessions),
        upstream_base_url: config.upstream_base_url,
    };
    let router = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(port = local_addr.port(), "lifelog MCP server started");

    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        sessions,
        _server: server,
        _eviction: eviction,
    })
}
