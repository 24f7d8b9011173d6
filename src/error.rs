//! Error types for the chat relay
//!
//! Defines application-level errors and per-recipient send errors.
//! Uses thiserror for ergonomic error definitions.

use std::net::SocketAddr;

use thiserror::Error;

/// Application-level errors
///
/// Everything here is fatal for the unit that raised it: a bind error stops
/// the process, anything else ends a single connection.
#[derive(Debug, Error)]
pub enum AppError {
    /// Could not bind the listening socket (fatal)
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// IO error on a connection
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Broadcaster command channel closed (internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Broadcaster dropped a reply before answering
    #[error("Channel receive error")]
    ChannelRecv,
}

/// Message send errors
///
/// Occurs when pushing a line to a session whose outbox is already gone.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The session is not keeping up; the message was dropped
    #[error("Outbox full")]
    OutboxFull,
}
