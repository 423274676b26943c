//! Real-time communication layer: a websocket relay hub that mirrors every
//! message to all connected peers, and a session manager that drives a
//! multi-party media session over an external transport engine.

pub mod config;
pub mod error;
pub mod model;
pub mod peer;
pub mod server;
pub mod session;
pub mod util;

pub use error::{EngineError, RelayError, SessionError};
pub use server::RelayHub;
pub use session::{SessionConfig, SessionManager, SessionSnapshot, SessionState};
