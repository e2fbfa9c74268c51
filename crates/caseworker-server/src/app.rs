use crate::config::ServerConfig;
use crate::error::Result;
use crate::middleware::request_log_middleware;
use crate::proxy;
use crate::static_assets::StaticAssets;
use crate::upstream_client::UpstreamClient;
use axum::{
    Json, Router,
    extract::{Request, State},
    middleware,
    response::Response,
    routing::get,
};
use std::sync::Arc;

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub upstream: UpstreamClient,
    pub assets: StaticAssets,
    pub relay_prefix: Arc<str>,
}

impl AppState {
    pub fn new(upstream: UpstreamClient, assets: StaticAssets, relay_prefix: &str) -> Self {
        Self {
            upstream,
            assets,
            relay_prefix: Arc::from(relay_prefix),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let upstream = UpstreamClient::new(&config.upstream_url, config.disable_system_proxy)?;
        let assets = StaticAssets::new(&config.asset_root, config.index_document.as_str());
        Ok(Self::new(upstream, assets, &config.relay_prefix))
    }

    fn is_relayed(&self, path: &str) -> bool {
        path.starts_with(self.relay_prefix.as_ref())
    }
}

#[derive(serde::Serialize)]
pub struct Health {
    status: String,
}

pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
    })
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(dispatch)
        .layer(middleware::from_fn(request_log_middleware))
        .with_state(state)
}

/// Relay prefixed paths; everything else is a static asset lookup.
async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    if state.is_relayed(request.uri().path()) {
        proxy::relay(&state.upstream, request).await
    } else {
        state.assets.serve(request.uri().path()).await
    }
}

/// Bind the configured address and serve until the listener fails.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    let listener = tokio::net::TcpListener::bind(config.listen_addr())
        .await
        .map_err(|err| anyhow::anyhow!("Failed to bind {}: {}", config.listen_addr(), err))?;

    tracing::info!(
        upstream = %config.upstream_url,
        relay_prefix = %config.relay_prefix,
        asset_root = %config.asset_root.display(),
        "Server running at http://localhost:{}",
        listener.local_addr()?.port()
    );

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
