use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RelayError, RelayResult};

/// Message type sent by the hub right after a connection is accepted.
pub const CONNECTED: &str = "connected";

/// Tagged envelope used at the protocol boundary.
///
/// The hub never looks inside relayed payloads; this type only exists so
/// peers can agree on `{ "type": ..., "payload": ... }` framing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, payload: Value) -> Envelope {
        Envelope {
            kind: kind.into(),
            payload: Some(payload),
        }
    }

    /// The handshake: `{"type":"connected"}`.
    pub fn connected() -> Envelope {
        Envelope {
            kind: CONNECTED.to_string(),
            payload: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.kind == CONNECTED && self.payload.is_none()
    }

    pub fn to_value(&self) -> RelayResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Interpret a relayed value as an envelope, if it has that shape.
    pub fn from_value(value: &Value) -> Option<Envelope> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// Parse one inbound frame, enforcing the size limit first.
pub fn parse_inbound(bytes: &[u8], limit: usize) -> RelayResult<Value> {
    if bytes.len() > limit {
        return Err(RelayError::PayloadTooLarge {
            size: bytes.len(),
            limit,
        });
    }

    Ok(serde_json::from_slice(bytes)?)
}
