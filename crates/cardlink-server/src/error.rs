//! Unified error type for the server crate.

use cardlink_protocol::ProtocolError;
use cardlink_transport::TransportError;

/// Top-level error for building and running the server.
///
/// Per-connection protocol failures never surface here — malformed
/// messages are logged and dropped without touching the connection, and a
/// single connection's transport failure only ends that connection's
/// tasks.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A transport-level error (bind, accept).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
