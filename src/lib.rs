//! Multi-client line chat relay
//!
//! A tokio TCP server that asks each client for a display name and then
//! relays every line it sends to all other connected clients.
//!
//! # Protocol
//! Newline-delimited UTF-8 text:
//! - server: `Enter your name:`; client: a name (blank means `Anonymous`)
//! - server: `Welcome <name>! Type /quit to leave.`
//! - others: `<name> joined the chat`
//! - each client line is relayed to the others as `<name>: <line>`
//! - `/quit` (any case) or disconnect: others get `<name> left the chat`
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `Broadcaster` is the actor owning the registry of active sessions
//! - Each connection has a `handler` task that reads lines and sends
//!   commands to the broadcaster, plus a writer task draining its outbox
//! - No locks needed - the registry is only touched by the actor
//!
//! # Example
//! ```ignore
//! use line_chat::{Listener, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = Listener::bind(&ServerConfig::default()).await.unwrap();
//!     listener.run().await;
//! }
//! ```

pub mod broadcaster;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod listener;
pub mod message;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use broadcaster::{BroadcastCommand, Broadcaster, BroadcasterHandle};
pub use config::{ClientConfig, ServerConfig};
pub use error::{AppError, SendError};
pub use handler::{handle_connection, ConnectionHandler};
pub use listener::Listener;
pub use message::{ClientMessage, ServerMessage};
pub use session::SessionHandle;
pub use types::{SessionId, SessionState};
