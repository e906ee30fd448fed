//! Server message router: a single actor owning all room state.
//!
//! Every connection's inbound messages, connect/disconnect notifications,
//! and the sweeper's ticks arrive on one event queue. The router processes
//! each event fully — registry mutation plus broadcasts — before taking the
//! next, so no locks guard room state and the sweeper can never race an
//! in-flight mutation. The flip side is that handlers must stay
//! non-blocking: everything below is synchronous map work and channel
//! sends.

use std::time::Duration;

use cardlink_protocol::{
    ClientMessage, CloseReason, Participant, PlayerId, RoomCode, ServerMessage,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::directory::{ConnectionDirectory, OutboundSender};
use crate::registry::RoomRegistry;

/// Events fed into the router's queue.
#[derive(Debug)]
pub enum RouterEvent {
    /// A duplex channel opened; `sender` delivers to its writer task.
    Connected {
        player_id: PlayerId,
        sender: OutboundSender,
    },
    /// A decoded message from a connection. Malformed frames are dropped
    /// by the reader task and never reach the router.
    Inbound {
        player_id: PlayerId,
        message: ClientMessage,
    },
    /// A duplex channel closed.
    Disconnected { player_id: PlayerId },
    /// The expiry sweeper's tick.
    Sweep,
    /// Broadcast `server_shutdown` to all room occupants and stop.
    Shutdown,
}

/// The router actor. Owns the [`RoomRegistry`] and [`ConnectionDirectory`];
/// constructed at server start, torn down at shutdown.
pub struct Router {
    registry: RoomRegistry,
    directory: ConnectionDirectory,
    room_ttl: Duration,
    events: mpsc::UnboundedReceiver<RouterEvent>,
}

impl Router {
    /// Spawns the router task and returns the queue feeding it.
    pub fn spawn(room_ttl: Duration) -> (mpsc::UnboundedSender<RouterEvent>, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let router = Self {
            registry: RoomRegistry::new(),
            directory: ConnectionDirectory::new(),
            room_ttl,
            events: rx,
        };
        let handle = tokio::spawn(router.run());
        (tx, handle)
    }

    async fn run(mut self) {
        tracing::debug!("message router started");

        while let Some(event) = self.events.recv().await {
            match event {
                RouterEvent::Connected { player_id, sender } => {
                    self.handle_connected(player_id, sender);
                }
                RouterEvent::Inbound { player_id, message } => {
                    self.handle_inbound(player_id, message);
                }
                RouterEvent::Disconnected { player_id } => {
                    self.handle_disconnected(player_id);
                }
                RouterEvent::Sweep => self.handle_sweep(),
                RouterEvent::Shutdown => {
                    self.handle_shutdown();
                    break;
                }
            }
        }

        tracing::debug!("message router stopped");
    }

    fn handle_connected(&mut self, player_id: PlayerId, sender: OutboundSender) {
        self.directory.insert(player_id, sender);
        self.directory
            .send(player_id, ServerMessage::Connected { player_id });
        tracing::info!(%player_id, connections = self.directory.len(), "player connected");
    }

    fn handle_disconnected(&mut self, player_id: PlayerId) {
        self.leave_current(player_id);
        self.directory.remove(player_id);
        tracing::info!(%player_id, connections = self.directory.len(), "player disconnected");
    }

    fn handle_inbound(&mut self, player_id: PlayerId, message: ClientMessage) {
        match message {
            ClientMessage::CreateRoom {
                player_name,
                character_index,
            } => self.handle_create_room(player_id, player_name, character_index),
            ClientMessage::JoinRoom {
                room_code,
                player_name,
                character_index,
            } => self.handle_join_room(player_id, &room_code, player_name, character_index),
            ClientMessage::LeaveRoom => self.leave_current(player_id),
            ClientMessage::UpdateCharacter { character_index } => {
                self.handle_update_character(player_id, character_index);
            }
            ClientMessage::SetReady { ready } => self.handle_set_ready(player_id, ready),
            ClientMessage::StartGame => self.handle_start_game(player_id),
            ClientMessage::GameAction { action, data } => {
                self.handle_game_action(player_id, action, data);
            }
        }
    }

    fn handle_create_room(&mut self, player_id: PlayerId, name: String, character_index: u32) {
        // A connection occupies at most one room; creating a new one
        // runs the ordinary departure path for the old one first.
        self.leave_current(player_id);

        let host = Participant {
            id: player_id,
            name,
            character_index,
            ready: true,
        };
        let room = self.registry.create(host);
        let room_code = room.code.clone();
        let snapshot = room.snapshot();

        self.directory
            .set_room(player_id, Some((room_code.clone(), true)));
        self.directory.send(
            player_id,
            ServerMessage::RoomCreated {
                room_code,
                room: snapshot,
            },
        );
    }

    fn handle_join_room(
        &mut self,
        player_id: PlayerId,
        room_code: &str,
        name: String,
        character_index: u32,
    ) {
        self.leave_current(player_id);

        let code = RoomCode::normalized(room_code);
        let guest = Participant {
            id: player_id,
            name,
            character_index,
            ready: false,
        };
        let joined = guest.clone();

        match self.registry.join(&code, guest) {
            Ok(room) => {
                let snapshot = room.snapshot();
                self.directory
                    .set_room(player_id, Some((code.clone(), false)));
                self.directory.send(
                    player_id,
                    ServerMessage::RoomJoined {
                        room_code: code,
                        room: snapshot,
                    },
                );
                self.directory.broadcast_room(
                    room,
                    Some(player_id),
                    &ServerMessage::PlayerJoined { guest: joined },
                );
            }
            Err(error) => {
                tracing::debug!(%player_id, %code, %error, "join rejected");
                self.directory
                    .send(player_id, ServerMessage::JoinError { error });
            }
        }
    }

    fn handle_update_character(&mut self, player_id: PlayerId, character_index: u32) {
        let Some((code, is_host)) = self.directory.room_of(player_id) else {
            tracing::debug!(%player_id, "update_character outside a room, ignoring");
            return;
        };
        let Some(room) = self.registry.get_mut(&code) else {
            return;
        };
        let Some(participant) = room.participant_mut(is_host) else {
            return;
        };
        participant.character_index = character_index;

        self.directory.broadcast_room(
            room,
            Some(player_id),
            &ServerMessage::CharacterUpdated {
                player_id,
                character_index,
                is_host,
            },
        );
    }

    fn handle_set_ready(&mut self, player_id: PlayerId, ready: bool) {
        let Some((code, is_host)) = self.directory.room_of(player_id) else {
            tracing::debug!(%player_id, "set_ready outside a room, ignoring");
            return;
        };
        let Some(room) = self.registry.get_mut(&code) else {
            return;
        };
        let Some(participant) = room.participant_mut(is_host) else {
            return;
        };
        participant.ready = ready;

        self.directory.broadcast_room(
            room,
            Some(player_id),
            &ServerMessage::ReadyUpdated {
                player_id,
                ready,
                is_host,
            },
        );
    }

    fn handle_start_game(&mut self, player_id: PlayerId) {
        let Some((code, is_host)) = self.directory.room_of(player_id) else {
            tracing::debug!(%player_id, "start_game outside a room, ignoring");
            return;
        };
        if !is_host {
            tracing::debug!(%player_id, %code, "start_game from non-host, ignoring");
            return;
        }
        let Some(room) = self.registry.get_mut(&code) else {
            return;
        };
        if room.guest.is_none() {
            tracing::debug!(%code, "start_game without a guest, ignoring");
            return;
        }

        room.start();
        let snapshot = room.snapshot();

        // Deliberately echoed to the initiator as well: both clients key
        // start-of-match timing off this broadcast, not the local call.
        self.directory
            .broadcast_room(room, None, &ServerMessage::GameStarted { room: snapshot });
        tracing::info!(%code, "game started");
    }

    fn handle_game_action(&mut self, player_id: PlayerId, action: String, data: serde_json::Value) {
        let Some((code, _)) = self.directory.room_of(player_id) else {
            tracing::debug!(%player_id, "game_action outside a room, ignoring");
            return;
        };
        let Some(room) = self.registry.get(&code) else {
            return;
        };

        // Relayed verbatim, unvalidated — game-state authority lives in
        // the combat engines on either end.
        self.directory.broadcast_room(
            room,
            Some(player_id),
            &ServerMessage::GameAction {
                player_id,
                action,
                data,
            },
        );
    }

    /// Removes `player_id` from its current room, if any, with the
    /// role-dependent side effects: a departing host closes the room, a
    /// departing guest reverts it to `waiting`.
    fn leave_current(&mut self, player_id: PlayerId) {
        let Some((code, is_host)) = self.directory.room_of(player_id) else {
            return;
        };
        self.directory.set_room(player_id, None);

        if is_host {
            if let Some(room) = self.registry.remove(&code) {
                self.directory.broadcast_room(
                    &room,
                    Some(player_id),
                    &ServerMessage::RoomClosed {
                        reason: CloseReason::HostLeft,
                    },
                );
                if let Some(guest) = &room.guest {
                    self.directory.set_room(guest.id, None);
                }
                tracing::info!(%code, "room closed (host left)");
            }
        } else if let Some(room) = self.registry.get_mut(&code) {
            room.clear_guest();
            self.directory.broadcast_room(
                room,
                Some(player_id),
                &ServerMessage::PlayerLeft { player_id },
            );
            tracing::info!(%code, %player_id, "guest left room");
        }
    }

    fn handle_sweep(&mut self) {
        for code in self.registry.expired(self.room_ttl) {
            if let Some(room) = self.registry.remove(&code) {
                self.directory.broadcast_room(
                    &room,
                    None,
                    &ServerMessage::RoomClosed {
                        reason: CloseReason::Timeout,
                    },
                );
                self.directory.set_room(room.host.id, None);
                if let Some(guest) = &room.guest {
                    self.directory.set_room(guest.id, None);
                }
                tracing::info!(%code, "room expired and removed");
            }
        }
    }

    fn handle_shutdown(&mut self) {
        tracing::info!(rooms = self.registry.len(), "notifying occupants of shutdown");
        for code in self.registry.codes() {
            if let Some(room) = self.registry.get(&code) {
                self.directory
                    .broadcast_room(room, None, &ServerMessage::ServerShutdown);
            }
        }
    }
}
