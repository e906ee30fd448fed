//! Session events delivered to the owning application.

use cardlink_protocol::{CloseReason, JoinError, Participant, PlayerId, RoomCode, RoomSnapshot};
use serde_json::Value;

/// Everything the session layer surfaces to its consumer — typically the
/// combat engine plus whatever drives the lobby UI.
///
/// Protocol-driven variants fire exactly once per corresponding inbound
/// server message and carry the same payload. [`Disconnected`] and
/// [`ReconnectExhausted`] are lifecycle events the controller emits itself.
///
/// [`Disconnected`]: SessionEvent::Disconnected
/// [`ReconnectExhausted`]: SessionEvent::ReconnectExhausted
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The server acknowledged the channel and assigned an identity.
    /// Fires on every successful connect, including automatic reconnects.
    Connected(PlayerId),
    /// The channel closed — explicitly, or out from under the controller.
    Disconnected,
    /// Automatic reconnection gave up after exhausting its attempts.
    /// The controller is idle; the application must prompt the user.
    ReconnectExhausted,

    /// Reply to `create_room`: the caller now hosts this room.
    RoomCreated { room_code: RoomCode, room: RoomSnapshot },
    /// Reply to `join_room`: the caller is now the guest of this room.
    RoomJoined { room_code: RoomCode, room: RoomSnapshot },
    /// Reply to a rejected `join_room`.
    JoinFailed(JoinError),
    /// A guest joined the room this client hosts.
    PlayerJoined(Participant),
    /// The guest left the room this client hosts.
    PlayerLeft(PlayerId),
    /// The other occupant changed character selection.
    CharacterUpdated {
        player_id: PlayerId,
        character_index: u32,
        is_host: bool,
    },
    /// The other occupant changed their ready flag.
    ReadyUpdated {
        player_id: PlayerId,
        ready: bool,
        is_host: bool,
    },
    /// The match started. Carries both participants' final selections;
    /// hand this to the combat engine.
    GameStarted(RoomSnapshot),
    /// An opaque action from the peer's combat engine.
    GameAction {
        player_id: PlayerId,
        action: String,
        data: Value,
    },
    /// The room was closed out from under this client.
    RoomClosed(CloseReason),
    /// The server announced it is going away.
    ServerShutdown,
}
