//! Session handle and outbox writer
//!
//! A `SessionHandle` is what the broadcaster keeps for each active session:
//! enough to address it, never the stream itself. The stream's write half is
//! owned by the session's writer task, which drains the outbox.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::config::OUTBOX_CAPACITY;
use crate::error::SendError;
use crate::message::{write_line, ServerMessage};
use crate::types::SessionId;

/// Registry entry for an active session
///
/// Holds the session's unique ID, display name and the sending side of its
/// outbox.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Unique identifier for this session
    pub id: SessionId,
    /// Display name (not unique)
    pub name: String,
    /// Broadcaster → session outbox
    sender: mpsc::Sender<ServerMessage>,
}

impl SessionHandle {
    /// Create a handle for the given ID, name and outbox sender
    pub fn new(id: SessionId, name: String, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self { id, name, sender }
    }

    /// Push a message onto this session's outbox
    ///
    /// Never waits. A full outbox drops the message.
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SendError::OutboxFull,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }
}

/// Create an outbox sized for one session
pub fn outbox() -> (mpsc::Sender<ServerMessage>, mpsc::Receiver<ServerMessage>) {
    mpsc::channel(OUTBOX_CAPACITY)
}

/// Drain an outbox onto the stream's write half
///
/// Runs until every sender is dropped or a write fails, then shuts the write
/// direction down. Lines still queued after a write failure are discarded.
pub async fn write_outbox<W>(mut writer: W, mut outbox: mpsc::Receiver<ServerMessage>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = outbox.recv().await {
        if let Err(e) = write_line(&mut writer, &msg).await {
            debug!("Outbox write failed, dropping remaining lines: {}", e);
            break;
        }
    }

    let _ = writer.shutdown().await;
    debug!("Writer task ended");
}
