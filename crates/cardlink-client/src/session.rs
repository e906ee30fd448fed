//! The session controller and its driver actor.
//!
//! [`SessionController`] is a cheap handle: it forwards commands over a
//! channel to a driver task that owns the socket, mirrors inbound messages
//! into shared read-only state, and surfaces them as [`SessionEvent`]s.
//! Apart from `connect()` — which awaits the server's acknowledgment —
//! every operation is a fire-and-forget send; replies arrive later as
//! events.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cardlink_protocol::{
    ClientMessage, Codec, JsonCodec, PlayerId, RoomCode, ServerMessage,
};
use cardlink_transport::{ClientWebSocket, Connection, TransportError};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant as TokioInstant;

use crate::{ClientError, SessionEvent};

/// How long `connect()` waits for the server's `connected` acknowledgment.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Reconnection backoff: `base_delay × 2^attempt`, capped at `max_delay`,
/// for at most `max_attempts` attempts.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// The delay before the given (1-based) attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Read-only snapshot of the controller's connection state.
///
/// Mutated only by inbound protocol messages or explicit disconnect,
/// never by consumers.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub connected: bool,
    pub player_id: Option<PlayerId>,
    pub room_code: Option<RoomCode>,
    pub is_host: bool,
}

fn with_shared<R>(shared: &Arc<Mutex<SessionState>>, f: impl FnOnce(&mut SessionState) -> R) -> R {
    let mut guard = shared.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut guard)
}

enum Command {
    Connect {
        reply: oneshot::Sender<Result<PlayerId, ClientError>>,
    },
    Disconnect,
    Send(ClientMessage),
}

/// Handle to the client session. Owns exactly one duplex connection at a
/// time (via its driver task); drop it to tear the session down.
pub struct SessionController {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<Mutex<SessionState>>,
}

impl SessionController {
    /// Creates a controller for the given server URL with the default
    /// reconnection policy. Returns the controller and the event stream
    /// the application consumes.
    pub fn new(url: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        Self::with_policy(url, ReconnectPolicy::default())
    }

    /// Like [`new`](Self::new) with an explicit reconnection policy.
    pub fn with_policy(
        url: impl Into<String>,
        policy: ReconnectPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Mutex::new(SessionState::default()));

        let driver = SessionDriver {
            url: url.into(),
            policy,
            codec: JsonCodec,
            commands: command_rx,
            events,
            shared: Arc::clone(&shared),
            socket: None,
            attempts: 0,
            reconnect_at: None,
        };
        tokio::spawn(driver.run());

        (Self { commands, shared }, event_rx)
    }

    /// Opens the channel and resolves once the server's `connected`
    /// acknowledgment arrives with this connection's identity.
    ///
    /// Also cancels any pending automatic reconnect and resets the
    /// attempt counter.
    ///
    /// # Errors
    /// Fails on transport-level errors or a bad/missing acknowledgment.
    pub async fn connect(&self) -> Result<PlayerId, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Connect { reply })
            .map_err(|_| ClientError::ControllerClosed)?;
        rx.await.map_err(|_| ClientError::ControllerClosed)?
    }

    /// Closes the channel and suppresses any pending reconnect.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    /// Requests a new room with the caller as host. Result arrives as
    /// [`SessionEvent::RoomCreated`].
    pub fn create_room(&self, player_name: &str, character_index: u32) {
        self.send(ClientMessage::CreateRoom {
            player_name: player_name.to_string(),
            character_index,
        });
    }

    /// Requests to join a room by code. Result arrives as
    /// [`SessionEvent::RoomJoined`] or [`SessionEvent::JoinFailed`].
    pub fn join_room(&self, room_code: &str, player_name: &str, character_index: u32) {
        self.send(ClientMessage::JoinRoom {
            room_code: room_code.to_string(),
            player_name: player_name.to_string(),
            character_index,
        });
    }

    /// Leaves the current room.
    pub fn leave_room(&self) {
        self.send(ClientMessage::LeaveRoom);
        // The server sends no acknowledgment for leaving; clear locally.
        with_shared(&self.shared, |s| {
            s.room_code = None;
            s.is_host = false;
        });
    }

    /// Announces a new character selection to the peer.
    pub fn update_character(&self, character_index: u32) {
        self.send(ClientMessage::UpdateCharacter { character_index });
    }

    /// Announces a ready-flag change to the peer.
    pub fn set_ready(&self, ready: bool) {
        self.send(ClientMessage::SetReady { ready });
    }

    /// Starts the match. Only meaningful for the host; silently ignored
    /// otherwise, matching the server's own rule.
    pub fn start_game(&self) {
        if !self.is_host() {
            tracing::warn!("start_game ignored: not the host");
            return;
        }
        self.send(ClientMessage::StartGame);
    }

    /// Relays an opaque combat-engine action to the peer.
    pub fn send_game_action(&self, action: &str, data: Value) {
        self.send(ClientMessage::GameAction {
            action: action.to_string(),
            data,
        });
    }

    /// Whether the channel is currently open and acknowledged.
    pub fn is_connected(&self) -> bool {
        with_shared(&self.shared, |s| s.connected)
    }

    /// The identity the server assigned, if connected.
    pub fn player_id(&self) -> Option<PlayerId> {
        with_shared(&self.shared, |s| s.player_id)
    }

    /// The room this session occupies, if any.
    pub fn room_code(&self) -> Option<RoomCode> {
        with_shared(&self.shared, |s| s.room_code.clone())
    }

    /// Whether this session hosts its current room.
    pub fn is_host(&self) -> bool {
        with_shared(&self.shared, |s| s.is_host)
    }

    /// A full copy of the current state.
    pub fn state(&self) -> SessionState {
        with_shared(&self.shared, |s| s.clone())
    }

    fn send(&self, message: ClientMessage) {
        if self.commands.send(Command::Send(message)).is_err() {
            tracing::warn!("session driver gone, dropping outbound message");
        }
    }
}

/// The driver actor: owns the socket and all protocol logic.
struct SessionDriver {
    url: String,
    policy: ReconnectPolicy,
    codec: JsonCodec,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<SessionEvent>,
    shared: Arc<Mutex<SessionState>>,
    socket: Option<ClientWebSocket>,
    /// Consecutive failed-connection count; reset on any successful
    /// connect.
    attempts: u32,
    /// When the next automatic reconnect fires, if one is scheduled.
    reconnect_at: Option<TokioInstant>,
}

impl SessionDriver {
    async fn run(mut self) {
        tracing::debug!(url = %self.url, "session driver started");

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(Command::Connect { reply }) => {
                            self.reconnect_at = None;
                            self.attempts = 0;
                            let result = self.establish().await;
                            let _ = reply.send(result);
                        }
                        Some(Command::Disconnect) => self.handle_disconnect().await,
                        Some(Command::Send(message)) => self.handle_send(message).await,
                        // Controller dropped — tear down.
                        None => break,
                    }
                }
                frame = Self::next_frame(&self.socket) => {
                    match frame {
                        Ok(Some(data)) => self.handle_frame(&data),
                        Ok(None) => self.handle_closure("closed by server"),
                        Err(e) => self.handle_closure(&e.to_string()),
                    }
                }
                _ = tokio::time::sleep_until(
                    self.reconnect_at.unwrap_or_else(TokioInstant::now),
                ), if self.reconnect_at.is_some() => {
                    self.attempt_reconnect().await;
                }
            }
        }

        if let Some(socket) = self.socket.take() {
            let _ = socket.close().await;
        }
        tracing::debug!("session driver stopped");
    }

    /// Resolves to the next inbound frame, or pends forever while there
    /// is no socket (`select!` keeps servicing the other branches).
    async fn next_frame(
        socket: &Option<ClientWebSocket>,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        match socket {
            Some(conn) => conn.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Dials the server and waits for the `connected` acknowledgment.
    async fn establish(&mut self) -> Result<PlayerId, ClientError> {
        self.socket = None;
        tracing::debug!(url = %self.url, "connecting");

        let conn = cardlink_transport::connect(&self.url).await?;

        let ack = tokio::time::timeout(CONNECT_TIMEOUT, conn.recv())
            .await
            .map_err(|_| {
                ClientError::Handshake("timed out waiting for acknowledgment".into())
            })??;
        let data = ack.ok_or_else(|| {
            ClientError::Handshake("connection closed before acknowledgment".into())
        })?;

        let message: ServerMessage = self.codec.decode(&data)?;
        let ServerMessage::Connected { player_id } = message else {
            return Err(ClientError::Handshake(
                "first message was not the connected acknowledgment".into(),
            ));
        };

        self.socket = Some(conn);
        self.attempts = 0;
        self.reconnect_at = None;
        with_shared(&self.shared, |s| {
            s.connected = true;
            s.player_id = Some(player_id);
        });
        self.emit(SessionEvent::Connected(player_id));
        tracing::info!(%player_id, "session connected");

        Ok(player_id)
    }

    async fn handle_disconnect(&mut self) {
        self.reconnect_at = None;
        self.attempts = 0;

        let was_connected = self.socket.is_some();
        if let Some(socket) = self.socket.take() {
            let _ = socket.close().await;
        }
        with_shared(&self.shared, |s| *s = SessionState::default());

        if was_connected {
            self.emit(SessionEvent::Disconnected);
            tracing::info!("disconnected");
        }
    }

    async fn handle_send(&mut self, message: ClientMessage) {
        let Some(socket) = &self.socket else {
            tracing::warn!("not connected, dropping outbound message");
            return;
        };
        let bytes = match self.codec.encode(&message) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode outbound message");
                return;
            }
        };
        if let Err(e) = socket.send(&bytes).await {
            // The read side will observe the closure and start backoff.
            tracing::debug!(error = %e, "outbound send failed");
        }
    }

    fn handle_frame(&mut self, data: &[u8]) {
        let message: ServerMessage = match self.codec.decode(data) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "dropping undecodable message");
                return;
            }
        };
        self.apply(message);
    }

    /// Mirrors an inbound message into the shared state and emits the
    /// matching event.
    fn apply(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Connected { player_id } => {
                // Normally consumed by `establish`; a repeat ack just
                // refreshes the identity.
                with_shared(&self.shared, |s| {
                    s.connected = true;
                    s.player_id = Some(player_id);
                });
                self.emit(SessionEvent::Connected(player_id));
            }
            ServerMessage::RoomCreated { room_code, room } => {
                with_shared(&self.shared, |s| {
                    s.room_code = Some(room_code.clone());
                    s.is_host = true;
                });
                self.emit(SessionEvent::RoomCreated { room_code, room });
            }
            ServerMessage::RoomJoined { room_code, room } => {
                with_shared(&self.shared, |s| {
                    s.room_code = Some(room_code.clone());
                    s.is_host = false;
                });
                self.emit(SessionEvent::RoomJoined { room_code, room });
            }
            ServerMessage::JoinError { error } => {
                self.emit(SessionEvent::JoinFailed(error));
            }
            ServerMessage::PlayerJoined { guest } => {
                self.emit(SessionEvent::PlayerJoined(guest));
            }
            ServerMessage::PlayerLeft { player_id } => {
                self.emit(SessionEvent::PlayerLeft(player_id));
            }
            ServerMessage::CharacterUpdated {
                player_id,
                character_index,
                is_host,
            } => {
                self.emit(SessionEvent::CharacterUpdated {
                    player_id,
                    character_index,
                    is_host,
                });
            }
            ServerMessage::ReadyUpdated {
                player_id,
                ready,
                is_host,
            } => {
                self.emit(SessionEvent::ReadyUpdated {
                    player_id,
                    ready,
                    is_host,
                });
            }
            ServerMessage::GameStarted { room } => {
                self.emit(SessionEvent::GameStarted(room));
            }
            ServerMessage::GameAction {
                player_id,
                action,
                data,
            } => {
                self.emit(SessionEvent::GameAction {
                    player_id,
                    action,
                    data,
                });
            }
            ServerMessage::RoomClosed { reason } => {
                with_shared(&self.shared, |s| {
                    s.room_code = None;
                    s.is_host = false;
                });
                self.emit(SessionEvent::RoomClosed(reason));
            }
            ServerMessage::ServerShutdown => {
                // The server is going away; reconnecting would be futile.
                tracing::info!("server shutting down");
                self.socket = None;
                with_shared(&self.shared, |s| s.connected = false);
                self.emit(SessionEvent::ServerShutdown);
                self.emit(SessionEvent::Disconnected);
            }
        }
    }

    /// The channel closed without an explicit `disconnect()`.
    fn handle_closure(&mut self, reason: &str) {
        tracing::info!(reason, "connection lost");
        self.socket = None;
        with_shared(&self.shared, |s| s.connected = false);
        self.emit(SessionEvent::Disconnected);
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if self.attempts >= self.policy.max_attempts {
            tracing::info!(
                attempts = self.attempts,
                "reconnect attempts exhausted, going idle"
            );
            self.emit(SessionEvent::ReconnectExhausted);
            return;
        }
        self.attempts += 1;
        let delay = self.policy.delay_for(self.attempts);
        tracing::info!(
            attempt = self.attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );
        self.reconnect_at = Some(TokioInstant::now() + delay);
    }

    async fn attempt_reconnect(&mut self) {
        self.reconnect_at = None;
        tracing::debug!(attempt = self.attempts, "reconnecting");
        match self.establish().await {
            Ok(player_id) => {
                tracing::info!(%player_id, "reconnected");
            }
            Err(e) => {
                tracing::debug!(error = %e, "reconnect attempt failed");
                self.schedule_reconnect();
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

// =========================================================================
// Tests
// =========================================================================
