//! Core protocol types: identities, room codes, and room snapshots.
//!
//! Everything in this module travels on the wire. The JSON field names are
//! part of the protocol contract with clients, so the serde attributes here
//! are load-bearing — see the shape tests at the bottom.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a connected player.
///
/// Issued by the server when the duplex channel opens — one per connection,
/// never reused while the process lives. Serializes as a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// The alphabet room codes are drawn from.
///
/// Excludes `0`, `1`, `I`, and `O` so codes stay unambiguous when read
/// aloud or typed from a screenshot.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a room code.
pub const CODE_LEN: usize = 6;

/// A six-character, human-shareable room code.
///
/// Codes are matched case-insensitively: [`RoomCode::normalized`] uppercases
/// input before lookup, so `ab2cde` and `AB2CDE` address the same room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Generates a random code from [`CODE_ALPHABET`].
    ///
    /// Uniqueness against live rooms is the registry's job — it retries
    /// generation on collision.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let code = (0..CODE_LEN)
            .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Builds a code from client input, uppercasing and trimming it.
    pub fn normalized(input: &str) -> Self {
        Self(input.trim().to_ascii_uppercase())
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Room model
// ---------------------------------------------------------------------------

/// One occupant of a room — the host or the guest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// The occupant's connection-scoped identity.
    pub id: PlayerId,
    /// Display name shown to the other player.
    pub name: String,
    /// Index into the externally supplied character roster. Not range
    /// checked here — the combat engine validates it.
    pub character_index: u32,
    /// Whether the occupant has confirmed readiness. Hosts are created
    /// ready; guests start unready.
    pub ready: bool,
}

/// Lifecycle state of a room.
///
/// `waiting → ready → playing`; the terminal "closed" state is represented
/// by absence from the registry, not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Host alone, waiting for a guest.
    Waiting,
    /// Both slots filled, match not started.
    Ready,
    /// Match in progress. No further joins.
    Playing,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => f.write_str("waiting"),
            Self::Ready => f.write_str("ready"),
            Self::Playing => f.write_str("playing"),
        }
    }
}

/// Read-only copy of a room's state, as delivered to clients.
///
/// Clients never mutate this — every broadcast carries the authoritative
/// current snapshot, not a diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub code: RoomCode,
    pub host: Participant,
    /// `null` until someone joins.
    pub guest: Option<Participant>,
    pub status: RoomStatus,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    /// Stamped when the match starts; absent from the JSON before that.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
}

// ---------------------------------------------------------------------------
// Reason codes
// ---------------------------------------------------------------------------

/// Why a `join_room` request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinError {
    /// No live room has this code.
    #[error("room not found")]
    RoomNotFound,
    /// Both slots are occupied.
    #[error("room is full")]
    RoomFull,
    /// The match already started.
    #[error("game in progress")]
    GameInProgress,
}

/// Why a room was closed out from under its occupants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    /// The host left or disconnected.
    HostLeft,
    /// The room exceeded the server's age threshold.
    Timeout,
}

// =========================================================================
// Tests
// =========================================================================
