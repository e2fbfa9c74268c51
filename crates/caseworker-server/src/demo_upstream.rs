//! Stand-in completion backend.
//!
//! Streams a fixed list of text chunks as `text/plain`, one chunk per body
//! frame, so the relay and the client can be exercised without a real model
//! behind them.

use crate::app::health;
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{any, get},
};
use bytes::Bytes;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

pub const DEMO_CHUNKS: [&str; 6] = ["Hello, ", "this ", "is ", "a ", "streamed ", "response!"];

#[derive(Debug, Clone)]
pub struct DemoUpstream {
    chunks: Arc<Vec<String>>,
    chunk_delay: Duration,
}

impl Default for DemoUpstream {
    fn default() -> Self {
        Self::new(DEMO_CHUNKS.iter().map(|chunk| chunk.to_string()).collect())
    }
}

impl DemoUpstream {
    pub fn new(chunks: Vec<String>) -> Self {
        Self {
            chunks: Arc::new(chunks),
            chunk_delay: Duration::ZERO,
        }
    }

    /// Pause before every chunk so each one leaves as its own frame.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/chat-stream", any(chat_stream))
            .with_state(self)
    }
}

async fn chat_stream(State(upstream): State<DemoUpstream>) -> Response {
    let chunks = Arc::clone(&upstream.chunks);
    let delay = upstream.chunk_delay;

    let stream = async_stream::stream! {
        for chunk in chunks.iter() {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            yield Ok::<Bytes, Infallible>(Bytes::from(chunk.clone()));
        }
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Serve the demo backend until the listener fails.
pub async fn run(listener: tokio::net::TcpListener, upstream: DemoUpstream) -> std::io::Result<()> {
    axum::serve(listener, upstream.router()).await
}
