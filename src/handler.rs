//! Connection handler
//!
//! Drives one connection through `Handshaking -> Active -> Closed`: asks for
//! a name, registers with the Broadcaster, relays every line, and cleans up
//! on quit, EOF or I/O failure.

use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::broadcaster::BroadcasterHandle;
use crate::config::DRAIN_TIMEOUT;
use crate::error::AppError;
use crate::message::{
    read_line, resolve_name, write_line, ClientMessage, ServerMessage, DEFAULT_NAME,
};
use crate::session::{outbox, write_outbox, SessionHandle};
use crate::types::{SessionId, SessionState};

/// Handle a new TCP connection
///
/// Splits the socket and runs a `ConnectionHandler` over it until the
/// session is closed.
pub async fn handle_connection(
    stream: TcpStream,
    broadcaster: BroadcasterHandle,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let (reader, writer) = stream.into_split();
    ConnectionHandler::new(BufReader::new(reader), writer, peer_addr, broadcaster)
        .run()
        .await
}

/// One connection's state machine
///
/// Before activation the handler writes to the stream directly. Once active,
/// the write half moves into a writer task fed by the session outbox, so the
/// handler itself only reads.
pub struct ConnectionHandler<R, W> {
    id: SessionId,
    peer: String,
    name: String,
    state: SessionState,
    reader: R,
    writer: Option<W>,
    writer_task: Option<JoinHandle<()>>,
    broadcaster: BroadcasterHandle,
}

impl<R, W> ConnectionHandler<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Create a handler in the `Handshaking` state
    pub fn new(reader: R, writer: W, peer: String, broadcaster: BroadcasterHandle) -> Self {
        Self {
            id: SessionId::new(),
            peer,
            name: DEFAULT_NAME.to_string(),
            state: SessionState::Handshaking,
            reader,
            writer: Some(writer),
            writer_task: None,
            broadcaster,
        }
    }

    /// Display name; `Anonymous` until the handshake says otherwise
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the whole lifecycle
    ///
    /// Always ends in `Closed`. I/O errors are returned after cleanup so the
    /// caller can log them.
    pub async fn run(mut self) -> Result<(), AppError> {
        let result = self.serve().await;
        self.close().await;
        result
    }

    async fn serve(&mut self) -> Result<(), AppError> {
        if !self.handshake().await? {
            debug!("Peer {} closed during handshake", self.peer);
            return Ok(());
        }
        self.activate().await?;
        self.relay_lines().await
    }

    /// Prompt for a name and welcome the client
    ///
    /// Returns `false` if the stream hit EOF before a name arrived.
    async fn handshake(&mut self) -> Result<bool, AppError> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(false);
        };

        write_line(writer, &ServerMessage::Prompt).await?;
        let Some(line) = read_line(&mut self.reader).await? else {
            return Ok(false);
        };

        self.name = resolve_name(&line);
        write_line(
            writer,
            &ServerMessage::Welcome {
                name: self.name.clone(),
            },
        )
        .await?;

        Ok(true)
    }

    /// Enter `Active`: start the writer, register, announce the join
    async fn activate(&mut self) -> Result<(), AppError> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };

        let (sender, receiver) = outbox();
        self.writer_task = Some(tokio::spawn(write_outbox(writer, receiver)));

        self.broadcaster
            .register(SessionHandle::new(self.id, self.name.clone(), sender))
            .await?;
        self.state = SessionState::Active;

        info!("{} joined the chat from {}", self.name, self.peer);
        self.broadcaster
            .broadcast(
                ServerMessage::Joined {
                    name: self.name.clone(),
                },
                Some(self.id),
            )
            .await
    }

    /// Relay lines until quit or EOF
    async fn relay_lines(&mut self) -> Result<(), AppError> {
        while let Some(line) = read_line(&mut self.reader).await? {
            match ClientMessage::parse(line) {
                ClientMessage::Quit => {
                    debug!("{} sent quit", self.name);
                    break;
                }
                ClientMessage::Text(text) => {
                    info!("{}: {}", self.name, text);
                    self.broadcaster
                        .broadcast(
                            ServerMessage::Chat {
                                from: self.name.clone(),
                                text,
                            },
                            Some(self.id),
                        )
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Move to `Closed`
    ///
    /// An active session is unregistered and its departure announced before
    /// the stream is closed. A session that never became active only has its
    /// stream closed. Queued lines get `DRAIN_TIMEOUT` to reach the peer; a
    /// peer that stopped reading has its writer aborted, which drops the write
    /// half. Calling this again does nothing.
    pub async fn close(&mut self) {
        let was_active = match self.state {
            SessionState::Closed => return,
            SessionState::Active => true,
            SessionState::Handshaking => false,
        };
        self.state = SessionState::Closed;

        if was_active {
            if let Err(e) = self.broadcaster.unregister(self.id).await {
                debug!("Unregister failed for {}: {}", self.id, e);
            }
            let left = ServerMessage::Left {
                name: self.name.clone(),
            };
            if let Err(e) = self.broadcaster.broadcast(left, Some(self.id)).await {
                debug!("Departure broadcast failed for {}: {}", self.id, e);
            }
        }

        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
        // Ends once the broadcaster has dropped this session's outbox sender
        if let Some(mut task) = self.writer_task.take() {
            if timeout(DRAIN_TIMEOUT, &mut task).await.is_err() {
                debug!("Writer for {} stalled, aborting", self.id);
                task.abort();
            }
        }

        if was_active {
            info!("{} disconnected", self.name);
        } else {
            debug!("Connection from {} closed before joining", self.peer);
        }
    }
}
