//! Per-conversation message state, driven by stream events.
//!
//! The network layer never touches this state directly: it emits
//! [`StreamEvent`]s and the owner of the conversation applies them in the
//! order they were received.

use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::message::{ChatRequest, GREETING, Message, Notification, Role};
use crate::stream::StreamEvent;

/// Lifecycle of a single conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingFirstChunk,
    Streaming,
    Finalized,
    Aborted,
    Cancelled,
}

impl TurnState {
    pub fn is_active(self) -> bool {
        matches!(self, TurnState::AwaitingFirstChunk | TurnState::Streaming)
    }
}

/// Handed to a backend when a turn starts.
#[derive(Debug, Clone)]
pub struct TurnTicket {
    /// Id the reply placeholder will carry.
    pub reply_id: String,
    pub request: ChatRequest,
}

#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
    notifications: Vec<Notification>,
    turn: TurnState,
    reply_id: Option<String>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            notifications: Vec::new(),
            turn: TurnState::Idle,
            reply_id: None,
        }
    }

    /// Conversation opened by the assistant's greeting.
    pub fn with_greeting() -> Self {
        let mut conversation = Self::new();
        conversation.messages.push(Message::assistant(GREETING));
        conversation
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn turn_state(&self) -> TurnState {
        self.turn
    }

    /// True while a reply is in flight; new submissions are refused.
    pub fn is_processing(&self) -> bool {
        self.turn.is_active()
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    /// Record the user's text and open a new turn.
    ///
    /// The returned request carries every user and assistant message so far,
    /// oldest first, ending with `text`.
    pub fn begin_turn(&mut self, text: &str) -> Result<TurnTicket> {
        if self.is_processing() {
            debug!("submission rejected while a reply is in flight");
            return Err(ClientError::Busy);
        }

        self.messages.push(Message::user(text));
        let request = ChatRequest {
            messages: self
                .messages
                .iter()
                .filter(|message| matches!(message.role, Role::User | Role::Assistant))
                .map(|message| message.content.clone())
                .collect(),
        };

        let reply_id = crate::message::generate_id();
        self.reply_id = Some(reply_id.clone());
        self.turn = TurnState::AwaitingFirstChunk;

        Ok(TurnTicket { reply_id, request })
    }

    /// Apply one event from the network layer.
    pub fn apply(&mut self, event: StreamEvent) {
        if !self.is_processing() || self.reply_id.as_deref() != Some(event.message_id()) {
            warn!(
                message_id = event.message_id(),
                state = ?self.turn,
                "ignoring event for a turn that is not in flight"
            );
            return;
        }

        match event {
            StreamEvent::Started { message_id, role } => {
                if self.message(&message_id).is_none() {
                    self.messages.push(Message::placeholder(message_id, role));
                }
            }
            StreamEvent::Content {
                message_id,
                content,
            } => {
                if let Some(message) = self.message_mut(&message_id) {
                    message.content = content;
                    self.turn = TurnState::Streaming;
                }
            }
            StreamEvent::Completed {
                message_id,
                content,
            } => {
                let role = self.message(&message_id).map(|message| message.role);
                match role {
                    // A thinking indicator is replaced by a new assistant message.
                    Some(Role::Thinking) => {
                        self.remove_message(&message_id);
                        self.messages.push(Message::assistant(content));
                    }
                    Some(_) => {
                        if let Some(message) = self.message_mut(&message_id) {
                            message.content = content;
                        }
                    }
                    None => self.messages.push(Message::assistant(content)),
                }
                self.finish_turn(TurnState::Finalized);
            }
            StreamEvent::Failed { message_id, error } => {
                warn!(
                    message_id = %message_id,
                    error = %error,
                    "reply failed, discarding partial message"
                );
                self.remove_message(&message_id);
                self.notifications.push(Notification::response_failed());
                self.finish_turn(TurnState::Aborted);
            }
            StreamEvent::Cancelled { message_id } => {
                let keep = self.message(&message_id).is_some_and(|message| {
                    message.role == Role::Assistant && !message.content.is_empty()
                });
                if !keep {
                    self.remove_message(&message_id);
                }
                self.finish_turn(TurnState::Cancelled);
            }
        }
    }

    /// Abort the current turn when the network layer went away without a
    /// terminal event.
    pub fn abandon_turn(&mut self, reason: &str) {
        if let Some(message_id) = self.reply_id.clone()
            && self.is_processing()
        {
            self.apply(StreamEvent::Failed {
                message_id,
                error: reason.to_string(),
            });
        }
    }

    fn finish_turn(&mut self, state: TurnState) {
        self.turn = state;
        self.reply_id = None;
    }

    fn message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|message| message.id == id)
    }

    fn remove_message(&mut self, id: &str) {
        self.messages.retain(|message| message.id != id);
    }
}
