//! Client side of the caseworker chat: consumes the relay's streamed reply
//! and keeps the visible message list in step with it.

pub mod backend;
pub mod canned;
pub mod conversation;
pub mod decoder;
pub mod error;
pub mod message;
pub mod session;
pub mod stream;

pub use backend::ChatBackend;
pub use canned::CannedResponder;
pub use conversation::{Conversation, TurnState, TurnTicket};
pub use decoder::ChunkDecoder;
pub use error::{ClientError, Result};
pub use message::{ChatRequest, Message, Notification, Role};
pub use session::ChatSession;
pub use stream::{RelayClient, StreamEvent};
