//! Client session controller for Cardlink matchmaking.
//!
//! Owns one duplex connection to the matchmaking server, speaks the
//! `cardlink-protocol` wire format, and exposes:
//!
//! - [`SessionController`] — `connect()` plus fire-and-forget room
//!   operations (`create_room`, `join_room`, `start_game`, …)
//! - a [`SessionEvent`] stream the combat engine and lobby UI consume
//! - read-only connection state (`is_connected`, `room_code`, `is_host`)
//! - automatic reconnection with exponential backoff ([`ReconnectPolicy`])
//!
//! # Example
//!
//! ```rust,no_run
//! use cardlink_client::{SessionController, SessionEvent};
//!
//! # async fn run() -> Result<(), cardlink_client::ClientError> {
//! let (session, mut events) = SessionController::new("ws://127.0.0.1:8080");
//! session.connect().await?;
//! session.create_room("Alice", 2);
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SessionEvent::RoomCreated { room_code, .. } => {
//!             println!("share this code: {room_code}");
//!         }
//!         SessionEvent::GameStarted(room) => { /* hand off to the engine */ }
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod event;
mod session;

pub use error::ClientError;
pub use event::SessionEvent;
pub use session::{ReconnectPolicy, SessionController, SessionState};
