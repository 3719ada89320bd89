//! Application-level error types.

use thiserror::Error;

/// Failures of the session bootstrap request.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The bootstrap HTTP exchange failed before a response was parsed.
    #[error("session request failed: {0}")]
    Http(String),
}

/// Failures reported by a display tunnel implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TunnelError {
    /// The tunnel is not connected, or was already torn down.
    #[error("tunnel closed")]
    Closed,

    /// `connect` was called twice on the same tunnel.
    #[error("tunnel already connected")]
    AlreadyConnected,

    /// An inbound instruction could not be parsed.
    #[error("malformed instruction: {0}")]
    Protocol(String),
}
