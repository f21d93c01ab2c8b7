//! Main proxy server implementation

use axum::{
    extract::State,
    routing::{any, get},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handler::ReplyProxy;
use super::upstream::UpstreamClient;
use crate::config::{AppConfig, Credential};

/// Shared read-only state for the proxy
#[derive(Clone)]
pub struct ProxyState {
    pub config: Arc<AppConfig>,
    pub upstream: UpstreamClient,
    /// Injected once at startup; `None` makes every real exchange a configuration error
    pub credential: Option<Credential>,
}

impl ProxyState {
    pub fn new(config: AppConfig, credential: Option<Credential>) -> Result<Self, Box<dyn std::error::Error>> {
        let upstream = UpstreamClient::from_config(&config.upstream)?;
        Ok(Self {
            config: Arc::new(config),
            upstream,
            credential,
        })
    }
}

/// Build the router: the chat route plus a health check
pub fn build_router(state: ProxyState) -> Router {
    let route = state.config.server.route.clone();

    Router::new()
        .route("/health", get(health_handler))
        .route(&route, any(chat_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already-bound listener
pub async fn serve(listener: tokio::net::TcpListener, state: ProxyState) -> std::io::Result<()> {
    axum::serve(listener, build_router(state)).await
}

/// Run the proxy server
pub async fn run_server(config: AppConfig, credential: Option<Credential>) -> Result<(), Box<dyn std::error::Error>> {
    if credential.is_none() {
        tracing::warn!(
            env = %config.upstream.api_key_env,
            "Upstream API key not set; chat requests will get a configuration error"
        );
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let route = config.server.route.clone();
    let state = ProxyState::new(config, credential)?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("reply-proxy listening on {}{}", addr, route);
    tracing::info!("Forwarding to {}", state.upstream.url());

    Ok(serve(listener, state).await?)
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

async fn chat_handler(State(state): State<ProxyState>, req: axum::extract::Request) -> axum::response::Response {
    let handler = ReplyProxy::new(state);
    handler.handle(req).await
}
