//! Error types for the relay hub and the session manager.

use thiserror::Error;

/// Errors raised by the relay hub and the relay peer.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Binding or accepting on the listening socket failed
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),

    /// The websocket layer rejected a handshake or frame
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A payload could not be parsed or serialised as JSON
    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// A payload exceeded the configured size limit
    #[error("payload of {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    /// The hub closed the connection before sending the handshake
    #[error("hub did not send the connected handshake")]
    MissingHandshake,
}

/// Errors reported by an external transport engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The user or the platform refused access to a capture device
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The engine could not reach the media service
    #[error("network error: {0}")]
    Network(String),

    /// The media service refused the request
    #[error("rejected by engine: {0}")]
    Rejected(String),
}

/// Errors surfaced by the session manager to calling code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The requested operation is not valid in the current lifecycle state
    #[error("operation not allowed while session is {0}")]
    InvalidState(&'static str),

    /// The coordinator task has stopped
    #[error("session coordinator is no longer running")]
    Closed,
}

pub type RelayResult<T> = Result<T, RelayError>;
pub type SessionResult<T> = Result<T, SessionError>;
