use futures::StreamExt;
use reqwest::Url;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::ChatBackend;
use crate::conversation::TurnTicket;
use crate::decoder::ChunkDecoder;
use crate::error::{ClientError, Result};
use crate::message::{ChatRequest, Role};

/// Progress of one reply, sent from the network layer to whoever owns the
/// conversation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The request was dispatched; show an empty placeholder.
    Started { message_id: String, role: Role },
    /// Full text accumulated so far (not a delta).
    Content { message_id: String, content: String },
    Completed { message_id: String, content: String },
    Failed { message_id: String, error: String },
    Cancelled { message_id: String },
}

impl StreamEvent {
    pub fn message_id(&self) -> &str {
        match self {
            StreamEvent::Started { message_id, .. }
            | StreamEvent::Content { message_id, .. }
            | StreamEvent::Completed { message_id, .. }
            | StreamEvent::Failed { message_id, .. }
            | StreamEvent::Cancelled { message_id } => message_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::Completed { .. }
                | StreamEvent::Failed { .. }
                | StreamEvent::Cancelled { .. }
        )
    }
}

enum StreamOutcome {
    Completed(String),
    Cancelled,
}

/// Streams replies from the relay endpoint.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http_client: reqwest::Client,
    endpoint: Url,
}

impl RelayClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|err| ClientError::InvalidEndpoint(format!("{}: {}", endpoint, err)))?;
        Ok(Self {
            http_client: reqwest::Client::new(),
            endpoint,
        })
    }

    async fn consume(
        &self,
        request: &ChatRequest,
        message_id: &str,
        events: &mpsc::UnboundedSender<StreamEvent>,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome> {
        let send = self
            .http_client
            .post(self.endpoint.clone())
            .json(request)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
            response = send => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        let mut decoder = ChunkDecoder::new();
        let mut content = String::new();
        let mut chunks = 0usize;
        let mut body = response.bytes_stream();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
                next = body.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };

            chunks += 1;
            let text = decoder.decode(&chunk?);
            if text.is_empty() {
                continue;
            }
            content.push_str(&text);
            let _ = events.send(StreamEvent::Content {
                message_id: message_id.to_string(),
                content: content.clone(),
            });
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            content.push_str(&tail);
            let _ = events.send(StreamEvent::Content {
                message_id: message_id.to_string(),
                content: content.clone(),
            });
        }

        debug!(message_id, chunks, bytes = content.len(), "stream finished");
        Ok(StreamOutcome::Completed(content))
    }
}

#[async_trait::async_trait]
impl ChatBackend for RelayClient {
    async fn stream_reply(
        &self,
        ticket: &TurnTicket,
        events: &mpsc::UnboundedSender<StreamEvent>,
        cancel: &CancellationToken,
    ) {
        let message_id = ticket.reply_id.clone();
        let _ = events.send(StreamEvent::Started {
            message_id: message_id.clone(),
            role: Role::Assistant,
        });

        let event = match self
            .consume(&ticket.request, &message_id, events, cancel)
            .await
        {
            Ok(StreamOutcome::Completed(content)) => StreamEvent::Completed {
                message_id,
                content,
            },
            Ok(StreamOutcome::Cancelled) => {
                debug!(message_id = %message_id, "stream cancelled");
                StreamEvent::Cancelled { message_id }
            }
            Err(err) => {
                warn!(message_id = %message_id, error = %err, "Failed to stream response");
                StreamEvent::Failed {
                    message_id,
                    error: err.to_string(),
                }
            }
        };
        let _ = events.send(event);
    }
}
