//! Room registry: the authoritative in-memory room store.
//!
//! # Concurrency note
//!
//! `RoomRegistry` is NOT thread-safe by itself — it uses a plain `HashMap`.
//! This is intentional: the registry is owned by the router task and every
//! mutation goes through that task's event queue, which serializes access.

use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use cardlink_protocol::{JoinError, Participant, RoomCode, RoomSnapshot, RoomStatus};

/// Milliseconds since the Unix epoch, for wire timestamps.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// One live room. Owned exclusively by the registry; clients only ever see
/// [`RoomSnapshot`] copies.
#[derive(Debug)]
pub struct Room {
    pub code: RoomCode,
    pub host: Participant,
    pub guest: Option<Participant>,
    pub status: RoomStatus,
    /// Monotonic creation instant; drives expiry.
    created: Instant,
    /// Wall-clock creation time for the wire.
    created_at: u64,
    started_at: Option<u64>,
}

impl Room {
    fn new(code: RoomCode, host: Participant) -> Self {
        Self {
            code,
            host,
            guest: None,
            status: RoomStatus::Waiting,
            created: Instant::now(),
            created_at: unix_millis(),
            started_at: None,
        }
    }

    /// How long ago the room was created.
    pub fn age(&self) -> Duration {
        self.created.elapsed()
    }

    /// The read-only copy delivered to clients.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            code: self.code.clone(),
            host: self.host.clone(),
            guest: self.guest.clone(),
            status: self.status,
            created_at: self.created_at,
            started_at: self.started_at,
        }
    }

    /// The host's or the guest's slot, by role.
    pub fn participant_mut(&mut self, is_host: bool) -> Option<&mut Participant> {
        if is_host {
            Some(&mut self.host)
        } else {
            self.guest.as_mut()
        }
    }

    /// Marks the match as started.
    pub fn start(&mut self) {
        self.status = RoomStatus::Playing;
        self.started_at = Some(unix_millis());
    }

    /// Clears the guest slot and reverts the room to `waiting`.
    ///
    /// Returns the departed guest, if one was present.
    pub fn clear_guest(&mut self) -> Option<Participant> {
        let guest = self.guest.take();
        if guest.is_some() {
            self.status = RoomStatus::Waiting;
        }
        guest
    }
}

/// The authoritative store of live rooms, keyed by code.
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, Room>,
}

impl RoomRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    /// Creates a room in `waiting` with the given host.
    ///
    /// The code is generated fresh and retried until it doesn't collide
    /// with any live room.
    pub fn create(&mut self, host: Participant) -> &Room {
        let mut code = RoomCode::generate();
        while self.rooms.contains_key(&code) {
            code = RoomCode::generate();
        }

        let room = Room::new(code.clone(), host);
        self.rooms.insert(code.clone(), room);
        tracing::info!(%code, rooms = self.rooms.len(), "room created");

        self.rooms.get(&code).expect("just inserted")
    }

    /// Seats a guest in the room with the given code and transitions it
    /// to `ready`.
    ///
    /// # Errors
    /// - [`JoinError::RoomNotFound`] — no live room has this code
    /// - [`JoinError::GameInProgress`] — the match already started
    /// - [`JoinError::RoomFull`] — both slots occupied
    pub fn join(&mut self, code: &RoomCode, guest: Participant) -> Result<&Room, JoinError> {
        let room = self.rooms.get_mut(code).ok_or(JoinError::RoomNotFound)?;
        if room.status == RoomStatus::Playing {
            return Err(JoinError::GameInProgress);
        }
        if room.guest.is_some() {
            return Err(JoinError::RoomFull);
        }

        room.guest = Some(guest);
        room.status = RoomStatus::Ready;
        tracing::info!(%code, "guest joined room");
        Ok(room)
    }

    /// Looks up a room by code.
    pub fn get(&self, code: &RoomCode) -> Option<&Room> {
        self.rooms.get(code)
    }

    /// Looks up a room by code, mutably.
    pub fn get_mut(&mut self, code: &RoomCode) -> Option<&mut Room> {
        self.rooms.get_mut(code)
    }

    /// Deletes a room. Idempotent — removing an absent code is a no-op
    /// returning `None`.
    pub fn remove(&mut self, code: &RoomCode) -> Option<Room> {
        let room = self.rooms.remove(code);
        if room.is_some() {
            tracing::info!(%code, rooms = self.rooms.len(), "room removed");
        }
        room
    }

    /// Codes of all rooms older than `ttl`, for the expiry sweep.
    pub fn expired(&self, ttl: Duration) -> Vec<RoomCode> {
        self.rooms
            .iter()
            .filter(|(_, room)| room.age() > ttl)
            .map(|(code, _)| code.clone())
            .collect()
    }

    /// Codes of all live rooms.
    pub fn codes(&self) -> Vec<RoomCode> {
        self.rooms.keys().cloned().collect()
    }

    /// Number of live rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Returns `true` if no rooms are live.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
