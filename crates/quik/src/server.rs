//! `QuikServer` builder and accept loop.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use quik_protocol::{Codec, JsonCodec};
use quik_room::{RoomConfig, RoomRegistry};
use quik_transport::{Transport, WebSocketTransport};

use crate::QuikError;
use crate::config::ServerConfig;
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: RoomRegistry,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Quik server.
///
/// ```rust,no_run
/// # async fn start() -> Result<(), quik::QuikError> {
/// use quik::prelude::*;
///
/// let server = QuikServer::builder().bind("127.0.0.1:5000").build().await?;
/// server.run().await
/// # }
/// ```
pub struct QuikServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
}

impl QuikServerBuilder {
    pub fn new() -> Self {
        let defaults = ServerConfig::default();
        Self {
            bind_addr: defaults.bind_addr(),
            room_config: defaults.room,
        }
    }

    /// Takes address and room settings from a [`ServerConfig`].
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.bind_addr = config.bind_addr();
        self.room_config = config.room;
        self
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Settings for every room the server creates.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Binds the listener. Events are JSON on WebSocket text frames.
    pub async fn build(self) -> Result<QuikServer<JsonCodec>, QuikError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let state = Arc::new(ServerState {
            registry: RoomRegistry::new(self.room_config),
            codec: JsonCodec,
        });
        Ok(QuikServer { transport, state })
    }
}

impl Default for QuikServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Quik server. Call [`run`](Self::run) to start accepting.
pub struct QuikServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl QuikServer<JsonCodec> {
    pub fn builder() -> QuikServerBuilder {
        QuikServerBuilder::new()
    }
}

impl<C: Codec> QuikServer<C> {
    pub fn local_addr(&self) -> Result<SocketAddr, QuikError> {
        Ok(self.transport.local_addr()?)
    }

    /// Accepts connections until the process is terminated, one handler
    /// task per connection.
    pub async fn run(self) -> Result<(), QuikError> {
        self.run_until(std::future::pending()).await
    }

    /// Like [`run`](Self::run) but returns once `shutdown` completes,
    /// after stopping every room.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<(), QuikError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Quik server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                },
            }
        }

        tracing::info!(rooms = self.state.registry.room_count(), "shutting down");
        for room_id in self.state.registry.room_ids() {
            if let Err(e) = self.state.registry.remove_room(&room_id).await {
                tracing::debug!(%room_id, error = %e, "room already gone");
            }
        }
        Ok(())
    }
}
