//! Offline responder with keyword-matched canned replies.
//!
//! Follows the same message lifecycle as the relay: a thinking placeholder
//! appears immediately and is replaced by the reply after a simulated delay.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::backend::ChatBackend;
use crate::conversation::TurnTicket;
use crate::message::Role;
use crate::stream::StreamEvent;

const DEFAULT_DELAY_MS: u64 = 2000;

pub const GREETING_REPLY: &str = "Hello there! How can I assist you today?";
pub const HELP_REPLY: &str = "I'd be happy to help! Please let me know what you need assistance with, and I'll do my best to provide relevant information or guidance.";
pub const THANKS_REPLY: &str =
    "You're welcome! If you have any more questions, feel free to ask.";
pub const QUESTION_REPLY: &str = "That's an interesting question. While I'm a simulated AI in this demo, a real AI system would provide a thoughtful response based on its training data and capabilities.";
pub const GENERIC_REPLY: &str = "Thank you for your message. This is a simulated response in this demo application. In a complete implementation, this would connect to an actual AI API like OpenAI's GPT models.";

/// Pick the canned reply for a user message. First match wins.
pub fn canned_reply(text: &str) -> &'static str {
    let lower = text.to_lowercase();

    // Plain substring match: "this" counts as a greeting.
    if lower.contains("hello") || lower.contains("hi") {
        GREETING_REPLY
    } else if lower.contains("help") {
        HELP_REPLY
    } else if lower.contains("thank") {
        THANKS_REPLY
    } else if lower.contains('?') {
        QUESTION_REPLY
    } else {
        GENERIC_REPLY
    }
}

#[derive(Debug, Clone)]
pub struct CannedResponder {
    delay: Duration,
}

impl Default for CannedResponder {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_DELAY_MS))
    }
}

impl CannedResponder {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ChatBackend for CannedResponder {
    async fn stream_reply(
        &self,
        ticket: &TurnTicket,
        events: &mpsc::UnboundedSender<StreamEvent>,
        cancel: &CancellationToken,
    ) {
        let message_id = ticket.reply_id.clone();
        let _ = events.send(StreamEvent::Started {
            message_id: message_id.clone(),
            role: Role::Thinking,
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = events.send(StreamEvent::Cancelled { message_id });
                return;
            }
            _ = tokio::time::sleep(self.delay) => {}
        }

        let reply = canned_reply(ticket.request.latest().unwrap_or_default());
        let _ = events.send(StreamEvent::Completed {
            message_id,
            content: reply.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ChatRequest;

    #[test]
    fn keyword_routing() {
        assert_eq!(canned_reply("Hello!"), GREETING_REPLY);
        assert_eq!(canned_reply("hi there"), GREETING_REPLY);
        assert_eq!(canned_reply("Can you HELP me"), HELP_REPLY);
        assert_eq!(canned_reply("thanks a lot"), THANKS_REPLY);
        assert_eq!(canned_reply("Where do I apply?"), QUESTION_REPLY);
        assert_eq!(canned_reply("My rent went up"), GENERIC_REPLY);
    }

    #[test]
    fn greeting_wins_over_later_keywords() {
        assert_eq!(canned_reply("hi, I need help?"), GREETING_REPLY);
        assert_eq!(canned_reply("thank you, can you help?"), HELP_REPLY);
    }

    #[test]
    fn greeting_matches_inside_other_words() {
        assert_eq!(canned_reply("this thing is broken"), GREETING_REPLY);
        assert_eq!(canned_reply("Othello"), GREETING_REPLY);
        assert_eq!(canned_reply("My rent went up"), GENERIC_REPLY);
    }

    #[tokio::test]
    async fn emits_thinking_placeholder_then_reply() {
        let responder = CannedResponder::new(Duration::ZERO);
        let ticket = TurnTicket {
            reply_id: "r1".to_string(),
            request: ChatRequest {
                messages: vec!["thank you".to_string()],
            },
        };
        let (tx, mut rx) = mpsc::unbounded_channel();

        responder
            .stream_reply(&ticket, &tx, &CancellationToken::new())
            .await;
        drop(tx);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                StreamEvent::Started {
                    message_id: "r1".to_string(),
                    role: Role::Thinking,
                },
                StreamEvent::Completed {
                    message_id: "r1".to_string(),
                    content: THANKS_REPLY.to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_delay() {
        let responder = CannedResponder::new(Duration::from_secs(60));
        let ticket = TurnTicket {
            reply_id: "r2".to_string(),
            request: ChatRequest {
                messages: vec!["hello".to_string()],
            },
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        responder.stream_reply(&ticket, &tx, &cancel).await;

        assert!(matches!(rx.recv().await, Some(StreamEvent::Started { .. })));
        assert_eq!(
            rx.recv().await,
            Some(StreamEvent::Cancelled {
                message_id: "r2".to_string()
            })
        );
    }
}
