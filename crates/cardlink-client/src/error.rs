//! Error types for the client session layer.

use cardlink_protocol::ProtocolError;
use cardlink_transport::TransportError;

/// Errors surfaced by [`SessionController`](crate::SessionController).
///
/// Only `connect()` returns errors directly; room operations are
/// fire-and-forget and report outcomes through session events.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Dialing, sending, or receiving failed at the transport level.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame failed to encode or decode.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The channel opened but the server's `connected` acknowledgment
    /// never arrived, arrived malformed, or wasn't first.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The controller's driver task is gone — the session was dropped.
    #[error("session controller closed")]
    ControllerClosed,
}
