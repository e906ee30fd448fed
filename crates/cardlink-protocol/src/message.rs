//! The request and event messages that cross the wire.
//!
//! Every message is a JSON object with a snake_case `type` discriminator and
//! camelCase payload fields. The server treats `game_action` payloads as
//! opaque — `data` is relayed verbatim to the peer without inspection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CloseReason, JoinError, Participant, PlayerId, RoomCode, RoomSnapshot};

fn default_host_name() -> String {
    "Host".to_string()
}

fn default_guest_name() -> String {
    "Player 2".to_string()
}

/// Requests a client sends to the server.
///
/// `playerName` and `characterIndex` are optional on the wire; omitted
/// values fall back to the same defaults the reference client relied on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Create a room and become its host.
    CreateRoom {
        #[serde(default = "default_host_name")]
        player_name: String,
        #[serde(default)]
        character_index: u32,
    },
    /// Join an existing room as the guest. The code is matched
    /// case-insensitively.
    JoinRoom {
        room_code: String,
        #[serde(default = "default_guest_name")]
        player_name: String,
        #[serde(default)]
        character_index: u32,
    },
    /// Leave the current room, if any.
    LeaveRoom,
    /// Change the sender's character selection.
    UpdateCharacter { character_index: u32 },
    /// Flip the sender's ready flag.
    SetReady { ready: bool },
    /// Start the match. Host-only; ignored otherwise.
    StartGame,
    /// Relay an opaque combat-engine action to the peer.
    GameAction {
        action: String,
        #[serde(default)]
        data: Value,
    },
}

/// Events the server sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Acknowledges the opened channel and assigns the connection identity.
    Connected { player_id: PlayerId },
    /// Reply to `create_room`.
    RoomCreated { room_code: RoomCode, room: RoomSnapshot },
    /// Reply to a successful `join_room`.
    RoomJoined { room_code: RoomCode, room: RoomSnapshot },
    /// Reply to a failed `join_room`.
    JoinError { error: JoinError },
    /// Sent to the host when a guest joins.
    PlayerJoined { guest: Participant },
    /// Sent to the host when the guest leaves or disconnects.
    PlayerLeft { player_id: PlayerId },
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
    /// The match started. Unlike every other mutation, this is broadcast to
    /// both occupants including the initiator, so start-of-match timing is
    /// identical on both sides.
    GameStarted { room: RoomSnapshot },
    /// An opaque action relayed from the peer.
    GameAction {
        player_id: PlayerId,
        action: String,
        data: Value,
    },
    /// The room was closed out from under the recipient.
    RoomClosed { reason: CloseReason },
    /// The server is shutting down.
    ServerShutdown,
}

// =========================================================================
// Tests
// =========================================================================
