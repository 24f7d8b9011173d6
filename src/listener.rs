//! TCP listener
//!
//! Owns the listening socket and the Broadcaster. Every accepted connection
//! gets its own handler task holding a clone of the broadcaster handle.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::broadcaster::{Broadcaster, BroadcasterHandle};
use crate::config::ServerConfig;
use crate::error::AppError;
use crate::handler::handle_connection;

pub struct Listener {
    listener: TcpListener,
    broadcaster: BroadcasterHandle,
}

impl Listener {
    /// Bind the socket and start the Broadcaster
    pub async fn bind(config: &ServerConfig) -> Result<Self, AppError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| AppError::Bind {
                addr: config.bind_addr,
                source,
            })?;
        let broadcaster = Broadcaster::spawn(config.command_buffer);

        Ok(Self {
            listener,
            broadcaster,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle to the Broadcaster this listener feeds
    pub fn broadcaster(&self) -> BroadcasterHandle {
        self.broadcaster.clone()
    }

    /// Connection accept loop
    ///
    /// Never returns. Accept errors are logged and the loop keeps going.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let broadcaster = self.broadcaster.clone();

                    // Spawn handler task for each connection
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, broadcaster).await {
                            error!("Connection handler error for {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}
