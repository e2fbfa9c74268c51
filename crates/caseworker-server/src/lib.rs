//! Streaming chat relay and single-page asset server.
//!
//! Requests under the relay prefix are forwarded to one upstream completion
//! backend and its chunked answer is piped back unbuffered; every other path
//! is served from the build directory with SPA fallback.

pub mod app;
pub mod config;
pub mod demo_upstream;
pub mod error;
pub mod middleware;
pub mod proxy;
pub mod static_assets;
pub mod upstream_client;

pub use app::{AppState, build_router, serve};
pub use config::ServerConfig;
pub use demo_upstream::DemoUpstream;
pub use error::{RelayError, Result};
pub use static_assets::StaticAssets;
pub use upstream_client::UpstreamClient;
