use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::conversation::TurnTicket;
use crate::stream::StreamEvent;

/// Produces the reply for one turn.
///
/// Implementations report progress only through `events`: a `Started`
/// event first, any number of `Content` events, then exactly one terminal
/// event (`Completed`, `Failed` or `Cancelled`).
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn stream_reply(
        &self,
        ticket: &TurnTicket,
        events: &mpsc::UnboundedSender<StreamEvent>,
        cancel: &CancellationToken,
    );
}
