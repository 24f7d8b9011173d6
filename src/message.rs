//! Line protocol definitions
//!
//! Newline-delimited UTF-8 text in both directions. `ServerMessage` renders
//! each server line through `Display`; `ClientMessage` classifies an incoming
//! line once the handshake is over.

use std::fmt;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Command that ends a session, compared case-insensitively
pub const QUIT_COMMAND: &str = "/quit";

/// Name given to clients that send a blank name
pub const DEFAULT_NAME: &str = "Anonymous";

/// Client → Server line (after the handshake)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Leave the chat
    Quit,
    /// Anything else, relayed verbatim
    Text(String),
}

impl ClientMessage {
    /// Classify a line read from the client
    pub fn parse(line: String) -> Self {
        if line.eq_ignore_ascii_case(QUIT_COMMAND) {
            ClientMessage::Quit
        } else {
            ClientMessage::Text(line)
        }
    }
}

/// Server → Client line
///
/// `Prompt` and `Welcome` go only to the connecting client; the rest are
/// fanned out by the broadcaster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Ask for a display name
    Prompt,
    /// Handshake finished
    Welcome { name: String },
    /// Someone finished their handshake
    Joined { name: String },
    /// Chat line from another session
    Chat { from: String, text: String },
    /// Someone quit or dropped
    Left { name: String },
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Prompt => write!(f, "Enter your name:"),
            ServerMessage::Welcome { name } => {
                write!(f, "Welcome {}! Type {} to leave.", name, QUIT_COMMAND)
            }
            ServerMessage::Joined { name } => write!(f, "{} joined the chat", name),
            ServerMessage::Chat { from, text } => write!(f, "{}: {}", from, text),
            ServerMessage::Left { name } => write!(f, "{} left the chat", name),
        }
    }
}

/// Resolve the handshake line into a display name
///
/// Blank input becomes `Anonymous`; anything else is kept as typed.
pub fn resolve_name(line: &str) -> String {
    if line.trim().is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        line.to_string()
    }
}

/// Read one line, without its `\n` or `\r\n` terminator
///
/// Returns `Ok(None)` at EOF. Invalid UTF-8 is replaced rather than rejected,
/// so a stray byte never kills the session.
pub async fn read_line<R>(reader: &mut R) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }

    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Write one server line followed by `\n` and flush
pub async fn write_line<W>(writer: &mut W, msg: &ServerMessage) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(format!("{}\n", msg).as_bytes()).await?;
    writer.flush().await
}
