//! Connection directory: maps player ids to live outbound channels.

use std::collections::HashMap;

use cardlink_protocol::{PlayerId, RoomCode, ServerMessage};
use tokio::sync::mpsc;

use crate::registry::Room;

/// Channel sender for delivering outbound messages to one connection's
/// writer task.
pub type OutboundSender = mpsc::UnboundedSender<ServerMessage>;

/// One live connection's bookkeeping.
struct ConnectionEntry {
    sender: OutboundSender,
    /// The room this connection occupies, and whether it is the host.
    /// Unset until a create/join succeeds.
    room: Option<(RoomCode, bool)>,
}

/// Maps each connection's player id to its outbound channel and room
/// association. Populated on connect, removed on close.
pub struct ConnectionDirectory {
    connections: HashMap<PlayerId, ConnectionEntry>,
}

impl ConnectionDirectory {
    /// Creates a new, empty directory.
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
        }
    }

    /// Registers a freshly opened connection.
    pub fn insert(&mut self, player_id: PlayerId, sender: OutboundSender) {
        self.connections.insert(
            player_id,
            ConnectionEntry {
                sender,
                room: None,
            },
        );
    }

    /// Forgets a closed connection.
    pub fn remove(&mut self, player_id: PlayerId) {
        self.connections.remove(&player_id);
    }

    /// The room association for a connection, if any.
    pub fn room_of(&self, player_id: PlayerId) -> Option<(RoomCode, bool)> {
        self.connections
            .get(&player_id)
            .and_then(|entry| entry.room.clone())
    }

    /// Sets or clears a connection's room association.
    pub fn set_room(&mut self, player_id: PlayerId, room: Option<(RoomCode, bool)>) {
        if let Some(entry) = self.connections.get_mut(&player_id) {
            entry.room = room;
        }
    }

    /// Delivers a message to one connection.
    ///
    /// Silently skips ids whose channel is absent or already closed — the
    /// peer may have disconnected between mutation and delivery, and that
    /// is not an error.
    pub fn send(&self, player_id: PlayerId, message: ServerMessage) {
        if let Some(entry) = self.connections.get(&player_id) {
            let _ = entry.sender.send(message);
        }
    }

    /// Delivers a message to every occupant of `room`, minus an optional
    /// excluded sender.
    pub fn broadcast_room(
        &self,
        room: &Room,
        exclude: Option<PlayerId>,
        message: &ServerMessage,
    ) {
        let recipients = std::iter::once(room.host.id).chain(room.guest.as_ref().map(|g| g.id));
        for recipient in recipients {
            if Some(recipient) != exclude {
                self.send(recipient, message.clone());
            }
        }
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns `true` if no connections are live.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionDirectory {
    fn default() -> Self {
        Self::new()
    }
}
