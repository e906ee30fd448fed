//! Authoritative matchmaking server for Cardlink.
//!
//! Tracks two-player game rooms, relays opaque game actions between room
//! occupants, and expires abandoned rooms. The server never simulates or
//! validates combat — it is a relay with a room-lifecycle state machine.
//!
//! # Architecture
//!
//! Every connection gets a reader and a writer task, but all room state
//! lives in one place: the router actor. Readers decode inbound frames
//! and feed them — together with connect/disconnect notifications and the
//! sweeper's timer ticks — into a single event queue. The router processes
//! one event at a time, so room mutations are serialized without locks.
//!
//! ```text
//! reader tasks ──┐
//! sweeper tick ──┼──► router (registry + directory) ──► writer tasks
//! accept loop  ──┘
//! ```
//!
//! # Key types
//!
//! - [`CardlinkServer`] / [`CardlinkServerBuilder`] — bind and run
//! - [`ServerConfig`] — room TTL and sweep cadence
//! - [`RoomRegistry`] — the room store and its state machine
//! - [`ConnectionDirectory`] — resolves player ids to live channels

mod config;
mod directory;
mod error;
mod registry;
mod router;
mod server;
mod sweep;

pub use config::ServerConfig;
pub use directory::{ConnectionDirectory, OutboundSender};
pub use error::ServerError;
pub use registry::{Room, RoomRegistry};
pub use router::{Router, RouterEvent};
pub use server::{CardlinkServer, CardlinkServerBuilder, ShutdownHandle};
