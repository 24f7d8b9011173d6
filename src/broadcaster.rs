//! Broadcaster actor implementation
//!
//! The central actor that owns the registry of active sessions.
//! Uses the Actor pattern with mpsc channels for message passing: every
//! register, unregister and broadcast is a command processed one at a time,
//! so a broadcast always sees a single consistent set of sessions.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::error::AppError;
use crate::message::ServerMessage;
use crate::session::SessionHandle;
use crate::types::SessionId;

/// Commands sent from handlers to the Broadcaster actor
#[derive(Debug)]
pub enum BroadcastCommand {
    /// Session finished its handshake
    Register { session: SessionHandle },
    /// Session is closing
    Unregister { session_id: SessionId },
    /// Fan a message out to everyone except `exclude`
    Broadcast {
        message: ServerMessage,
        exclude: Option<SessionId>,
    },
    /// Report how many sessions are registered
    ActiveCount { reply: oneshot::Sender<usize> },
}

/// The Broadcaster actor
///
/// Exclusively owns the registry; nothing else can reach it except through
/// the command channel.
pub struct Broadcaster {
    /// All active sessions: SessionId -> SessionHandle
    sessions: HashMap<SessionId, SessionHandle>,
    /// Command receiver channel
    receiver: mpsc::Receiver<BroadcastCommand>,
}

impl Broadcaster {
    /// Create a new Broadcaster with the given command receiver
    pub fn new(receiver: mpsc::Receiver<BroadcastCommand>) -> Self {
        Self {
            sessions: HashMap::new(),
            receiver,
        }
    }

    /// Start a Broadcaster task and return a handle to it
    ///
    /// The task ends once every handle has been dropped.
    pub fn spawn(buffer: usize) -> BroadcasterHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(buffer);
        tokio::spawn(Broadcaster::new(cmd_rx).run());
        BroadcasterHandle::new(cmd_tx)
    }

    /// Run the Broadcaster event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("Broadcaster started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("Broadcaster shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: BroadcastCommand) {
        match cmd {
            BroadcastCommand::Register { session } => {
                self.handle_register(session);
            }
            BroadcastCommand::Unregister { session_id } => {
                self.handle_unregister(session_id);
            }
            BroadcastCommand::Broadcast { message, exclude } => {
                self.handle_broadcast(message, exclude);
            }
            BroadcastCommand::ActiveCount { reply } => {
                let _ = reply.send(self.sessions.len());
            }
        }
    }

    fn handle_register(&mut self, session: SessionHandle) {
        debug!("Registering session {} ({})", session.id, session.name);
        self.sessions.insert(session.id, session);
        debug!("Active sessions: {}", self.sessions.len());
    }

    fn handle_unregister(&mut self, session_id: SessionId) {
        if self.sessions.remove(&session_id).is_some() {
            debug!("Unregistered session {}", session_id);
        }
        debug!("Active sessions: {}", self.sessions.len());
    }

    /// Deliver to every registered session but `exclude`
    ///
    /// A failed delivery is ignored; the recipient stays registered until its
    /// own handler unregisters it.
    fn handle_broadcast(&self, message: ServerMessage, exclude: Option<SessionId>) {
        for session in self.sessions.values() {
            if Some(session.id) == exclude {
                continue;
            }
            if session.send(message.clone()).is_err() {
                debug!("Dropped message for session {}", session.id);
            }
        }
    }
}

/// Cloneable handle used by connection handlers to reach the Broadcaster
#[derive(Debug, Clone)]
pub struct BroadcasterHandle {
    sender: mpsc::Sender<BroadcastCommand>,
}

impl BroadcasterHandle {
    /// Wrap a command sender
    pub fn new(sender: mpsc::Sender<BroadcastCommand>) -> Self {
        Self { sender }
    }

    async fn send(&self, cmd: BroadcastCommand) -> Result<(), AppError> {
        self.sender.send(cmd).await.map_err(|_| AppError::ChannelSend)
    }

    /// Add a session to the registry
    pub async fn register(&self, session: SessionHandle) -> Result<(), AppError> {
        self.send(BroadcastCommand::Register { session }).await
    }

    /// Remove a session from the registry; no-op if it is not there
    pub async fn unregister(&self, session_id: SessionId) -> Result<(), AppError> {
        self.send(BroadcastCommand::Unregister { session_id }).await
    }

    /// Send `message` to every registered session except `exclude`
    pub async fn broadcast(
        &self,
        message: ServerMessage,
        exclude: Option<SessionId>,
    ) -> Result<(), AppError> {
        self.send(BroadcastCommand::Broadcast { message, exclude })
            .await
    }

    /// Number of registered sessions
    ///
    /// Answered after every command sent earlier through this handle.
    pub async fn active_count(&self) -> Result<usize, AppError> {
        let (reply, rx) = oneshot::channel();
        self.send(BroadcastCommand::ActiveCount { reply }).await?;
        rx.await.map_err(|_| AppError::ChannelRecv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::outbox;

    fn session(name: &str) -> (SessionHandle, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = outbox();
        (SessionHandle::new(SessionId::new(), name.to_string(), tx), rx)
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn chat(from: &str, text: &str) -> ServerMessage {
        ServerMessage::Chat {
            from: from.to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_broadcast_excludes_sender() {
        let broadcaster = Broadcaster::spawn(16);
        let (alice, mut alice_rx) = session("Alice");
        let (bob, mut bob_rx) = session("Bob");
        let (carol, mut carol_rx) = session("Carol");
        let alice_id = alice.id;

        broadcaster.register(alice).await.unwrap();
        broadcaster.register(bob).await.unwrap();
        broadcaster.register(carol).await.unwrap();
        broadcaster
            .broadcast(chat("Alice", "hello"), Some(alice_id))
            .await
            .unwrap();
        assert_eq!(broadcaster.active_count().await.unwrap(), 3);

        assert!(drain(&mut alice_rx).is_empty());
        assert_eq!(drain(&mut bob_rx), vec![chat("Alice", "hello")]);
        assert_eq!(drain(&mut carol_rx), vec![chat("Alice", "hello")]);
    }

    #[tokio::test]
    async fn test_broadcast_without_exclusion_reaches_everyone() {
        let broadcaster = Broadcaster::spawn(16);
        let (alice, mut alice_rx) = session("Alice");
        broadcaster.register(alice).await.unwrap();

        broadcaster
            .broadcast(chat("server", "notice"), None)
            .await
            .unwrap();
        broadcaster.active_count().await.unwrap();

        assert_eq!(drain(&mut alice_rx), vec![chat("server", "notice")]);
    }

    #[tokio::test]
    async fn test_unregister_absent_is_noop() {
        let broadcaster = Broadcaster::spawn(16);
        let (alice, _alice_rx) = session("Alice");
        broadcaster.register(alice).await.unwrap();

        broadcaster.unregister(SessionId::new()).await.unwrap();
        assert_eq!(broadcaster.active_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unregister_twice_is_noop() {
        let broadcaster = Broadcaster::spawn(16);
        let (alice, _alice_rx) = session("Alice");
        let alice_id = alice.id;
        broadcaster.register(alice).await.unwrap();

        broadcaster.unregister(alice_id).await.unwrap();
        broadcaster.unregister(alice_id).await.unwrap();
        assert_eq!(broadcaster.active_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unregistered_session_receives_nothing() {
        let broadcaster = Broadcaster::spawn(16);
        let (alice, mut alice_rx) = session("Alice");
        let (bob, mut bob_rx) = session("Bob");
        let bob_id = bob.id;
        broadcaster.register(alice).await.unwrap();
        broadcaster.register(bob).await.unwrap();

        broadcaster.unregister(bob_id).await.unwrap();
        broadcaster
            .broadcast(ServerMessage::Left { name: "Bob".into() }, Some(bob_id))
            .await
            .unwrap();
        broadcaster.active_count().await.unwrap();

        assert_eq!(
            drain(&mut alice_rx),
            vec![ServerMessage::Left { name: "Bob".into() }]
        );
        assert!(drain(&mut bob_rx).is_empty());
    }

    #[tokio::test]
    async fn test_failed_recipient_does_not_block_others() {
        let broadcaster = Broadcaster::spawn(16);
        let (gone, gone_rx) = session("Gone");
        let (bob, mut bob_rx) = session("Bob");
        broadcaster.register(gone).await.unwrap();
        broadcaster.register(bob).await.unwrap();
        drop(gone_rx);

        broadcaster.broadcast(chat("x", "1"), None).await.unwrap();
        broadcaster.broadcast(chat("x", "2"), None).await.unwrap();

        // Dead recipient stays registered until its handler removes it
        assert_eq!(broadcaster.active_count().await.unwrap(), 2);
        assert_eq!(drain(&mut bob_rx), vec![chat("x", "1"), chat("x", "2")]);
    }

    #[tokio::test]
    async fn test_full_outbox_does_not_block_others() {
        let broadcaster = Broadcaster::spawn(16);
        let (slow_tx, mut slow_rx) = mpsc::channel(1);
        let slow = SessionHandle::new(SessionId::new(), "Slow".to_string(), slow_tx);
        let (bob, mut bob_rx) = session("Bob");
        broadcaster.register(slow).await.unwrap();
        broadcaster.register(bob).await.unwrap();

        for i in 0..3 {
            broadcaster
                .broadcast(chat("x", &i.to_string()), None)
                .await
                .unwrap();
        }

        assert_eq!(broadcaster.active_count().await.unwrap(), 2);
        assert_eq!(drain(&mut slow_rx), vec![chat("x", "0")]);
        assert_eq!(
            drain(&mut bob_rx),
            vec![chat("x", "0"), chat("x", "1"), chat("x", "2")]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_churn_does_not_skip_or_duplicate() {
        const MESSAGES: usize = 200;

        let broadcaster = Broadcaster::spawn(64);
        let mut stable = Vec::new();
        for i in 0..5 {
            let (handle, rx) = session(&format!("stable-{}", i));
            broadcaster.register(handle).await.unwrap();
            stable.push(rx);
        }

        let churn = {
            let broadcaster = broadcaster.clone();
            tokio::spawn(async move {
                for i in 0..100 {
                    let (handle, _rx) = session(&format!("transient-{}", i));
                    let id = handle.id;
                    broadcaster.register(handle).await.unwrap();
                    tokio::task::yield_now().await;
                    broadcaster.unregister(id).await.unwrap();
                }
            })
        };

        let sender = {
            let broadcaster = broadcaster.clone();
            tokio::spawn(async move {
                for i in 0..MESSAGES {
                    broadcaster
                        .broadcast(chat("sender", &i.to_string()), None)
                        .await
                        .unwrap();
                }
            })
        };

        churn.await.unwrap();
        sender.await.unwrap();
        assert_eq!(broadcaster.active_count().await.unwrap(), 5);

        let expected: Vec<ServerMessage> = (0..MESSAGES)
            .map(|i| chat("sender", &i.to_string()))
            .collect();
        for rx in stable.iter_mut() {
            assert_eq!(drain(rx), expected);
        }
    }

    #[tokio::test]
    async fn test_handle_errors_after_actor_stops() {
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        drop(cmd_rx);
        let handle = BroadcasterHandle::new(cmd_tx);

        assert!(matches!(
            handle.unregister(SessionId::new()).await,
            Err(AppError::ChannelSend)
        ));
        assert!(matches!(
            handle.active_count().await,
            Err(AppError::ChannelSend)
        ));
    }
}
