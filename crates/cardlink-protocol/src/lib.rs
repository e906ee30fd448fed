//! Wire protocol for Cardlink.
//!
//! Defines the language the matchmaking server and its clients speak:
//!
//! - **Types** ([`RoomSnapshot`], [`Participant`], [`RoomCode`], …) — the
//!   room model as it appears on the wire.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`]) — the tagged
//!   request/event envelopes.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how messages become bytes.
//!
//! The protocol layer sits between transport (raw frames) and the session
//! layers on either end. It knows nothing about connections or rooms beyond
//! their serialized shapes.

mod codec;
mod error;
mod message;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use message::{ClientMessage, ServerMessage};
pub use types::{
    CODE_ALPHABET, CODE_LEN, CloseReason, JoinError, Participant, PlayerId, RoomCode,
    RoomSnapshot, RoomStatus,
};
