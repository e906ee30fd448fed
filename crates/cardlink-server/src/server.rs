//! `CardlinkServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → router. Each accepted
//! connection gets a reader task (decode inbound frames into router
//! events) and a writer task (drain the router's outbound queue onto the
//! socket); all state mutation happens inside the router actor.

use std::sync::Arc;

use cardlink_protocol::{ClientMessage, Codec, JsonCodec, PlayerId};
use cardlink_transport::{Connection, Transport, WebSocketConnection, WebSocketTransport};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ServerError;
use crate::config::ServerConfig;
use crate::router::{Router, RouterEvent};
use crate::sweep::spawn_sweeper;

/// Builder for configuring and starting a Cardlink server.
///
/// # Example
///
/// ```rust,no_run
/// use cardlink_server::CardlinkServer;
///
/// # async fn run() -> Result<(), cardlink_server::ServerError> {
/// let server = CardlinkServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct CardlinkServerBuilder {
    bind_addr: String,
    config: ServerConfig,
}

impl CardlinkServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the room lifecycle configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and spawns the router and sweeper.
    pub async fn build(self) -> Result<CardlinkServer, ServerError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let (events, router) = Router::spawn(self.config.room_ttl);
        let sweeper = spawn_sweeper(events.clone(), self.config.sweep_interval);
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();

        Ok(CardlinkServer {
            transport,
            events,
            router,
            sweeper,
            shutdown_tx,
            shutdown_rx,
        })
    }
}

impl Default for CardlinkServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Requests a graceful stop of a running server from another task.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl ShutdownHandle {
    /// Signals the accept loop to stop. Room occupants receive
    /// `server_shutdown` before the router exits.
    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }
}

/// A running Cardlink matchmaking server.
pub struct CardlinkServer {
    transport: WebSocketTransport,
    events: mpsc::UnboundedSender<RouterEvent>,
    router: JoinHandle<()>,
    sweeper: JoinHandle<()>,
    shutdown_tx: mpsc::UnboundedSender<()>,
    shutdown_rx: mpsc::UnboundedReceiver<()>,
}

impl CardlinkServer {
    /// Creates a new builder.
    pub fn builder() -> CardlinkServerBuilder {
        CardlinkServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns a handle that can stop the server from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Runs the accept loop until a shutdown is requested.
    ///
    /// On shutdown the listener stops accepting, the sweeper is cancelled,
    /// and the router drains its queue — broadcasting `server_shutdown` to
    /// every room occupant — before this returns.
    pub async fn run(mut self) -> Result<(), ServerError> {
        tracing::info!("Cardlink server running");

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => spawn_connection(conn, self.events.clone()),
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                }
            }
        }

        drop(self.transport);
        self.sweeper.abort();
        let _ = self.events.send(RouterEvent::Shutdown);
        let _ = self.router.await;
        Ok(())
    }
}

/// Wires one accepted connection into the router: issues its player id,
/// registers the outbound channel, and starts the reader/writer tasks.
fn spawn_connection(
    conn: WebSocketConnection<tokio::net::TcpStream>,
    events: mpsc::UnboundedSender<RouterEvent>,
) {
    let player_id = PlayerId(conn.id().into_inner());
    let conn = Arc::new(conn);
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();

    if events
        .send(RouterEvent::Connected {
            player_id,
            sender: outbound_tx,
        })
        .is_err()
    {
        return;
    }

    // Writer: drains the router's outbound queue onto the socket.
    let writer_conn = Arc::clone(&conn);
    tokio::spawn(async move {
        let codec = JsonCodec;
        while let Some(message) = outbound_rx.recv().await {
            let bytes = match codec.encode(&message) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(%player_id, error = %e, "failed to encode outbound message");
                    continue;
                }
            };
            if let Err(e) = writer_conn.send(&bytes).await {
                tracing::debug!(%player_id, error = %e, "outbound send failed");
                break;
            }
        }
    });

    // Reader: decodes inbound frames into router events. A frame that
    // fails to decode is logged and dropped; the connection stays up.
    tokio::spawn(async move {
        let codec = JsonCodec;
        loop {
            match conn.recv().await {
                Ok(Some(data)) => match codec.decode::<ClientMessage>(&data) {
                    Ok(message) => {
                        if events
                            .send(RouterEvent::Inbound { player_id, message })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(%player_id, error = %e, "dropping undecodable message");
                    }
                },
                Ok(None) => {
                    tracing::debug!(%player_id, "connection closed");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%player_id, error = %e, "recv error");
                    break;
                }
            }
        }
        let _ = events.send(RouterEvent::Disconnected { player_id });
    });
}
