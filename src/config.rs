//! Server and client configuration
//!
//! The server has no command-line surface: it always listens on every
//! interface at `DEFAULT_PORT`. The client takes an optional host and port.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;

/// Port the server listens on and the client connects to by default
pub const DEFAULT_PORT: u16 = 12345;

/// Host the client connects to by default
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Channel buffer size for broadcaster commands
pub const COMMAND_BUFFER_SIZE: usize = 256;

/// Lines queued for one session before further lines to it are dropped
pub const OUTBOX_CAPACITY: usize = 256;

/// How long a closing session may spend flushing its outbox
pub const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub bind_addr: SocketAddr,
    /// Capacity of the broadcaster command channel
    pub command_buffer: usize,
}

impl ServerConfig {
    /// Default settings bound to a specific address
    pub fn with_addr(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Self::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            command_buffer: COMMAND_BUFFER_SIZE,
        }
    }
}

/// Client command line
#[derive(Debug, Clone, Parser)]
#[command(name = "line_chat_client", about = "Connect to a line_chat server")]
pub struct ClientConfig {
    /// Server host
    #[arg(default_value = DEFAULT_HOST)]
    pub host: String,

    /// Server port
    #[arg(default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl ClientConfig {
    /// `host:port` string to connect to
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
