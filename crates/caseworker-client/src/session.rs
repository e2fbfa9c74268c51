use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backend::ChatBackend;
use crate::conversation::{Conversation, TurnState};
use crate::error::Result;

/// A conversation plus the backend that answers it.
///
/// Each [`send`](Self::send) runs the backend and the state updates side by
/// side: the backend pushes [`StreamEvent`](crate::stream::StreamEvent)s into
/// a channel and the session applies them to the conversation one at a time,
/// in arrival order, calling `observer` after each one.
pub struct ChatSession {
    backend: Arc<dyn ChatBackend>,
    conversation: Conversation,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self::with_conversation(backend, Conversation::with_greeting())
    }

    pub fn with_conversation(backend: Arc<dyn ChatBackend>, conversation: Conversation) -> Self {
        Self {
            backend,
            conversation,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    /// Submit `text` and drive the reply to a terminal state.
    ///
    /// Returns [`ClientError::Busy`](crate::error::ClientError::Busy) if a
    /// reply is already in flight. Reply failures are not errors here: they
    /// end in [`TurnState::Aborted`] with a notification on the conversation.
    pub async fn send<F>(
        &mut self,
        text: &str,
        cancel: CancellationToken,
        mut observer: F,
    ) -> Result<TurnState>
    where
        F: FnMut(&Conversation),
    {
        let ticket = self.conversation.begin_turn(text)?;
        debug!(reply_id = %ticket.reply_id, "turn started");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let backend = Arc::clone(&self.backend);
        let producer = async move {
            backend.stream_reply(&ticket, &tx, &cancel).await;
        };

        let conversation = &mut self.conversation;
        let consumer = async {
            while let Some(event) = rx.recv().await {
                let terminal = event.is_terminal();
                conversation.apply(event);
                observer(conversation);
                if terminal {
                    break;
                }
            }
        };

        tokio::join!(producer, consumer);

        if self.conversation.is_processing() {
            self.conversation
                .abandon_turn("reply stream ended without a result");
            observer(&self.conversation);
        }

        debug!(state = ?self.conversation.turn_state(), "turn finished");
        Ok(self.conversation.turn_state())
    }
}
