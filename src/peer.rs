//! Relay peer
//!
//! A minimal client for the relay hub: connects, checks the handshake, and
//! exchanges JSON messages. Backs the `peer` subcommand.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::error::{RelayError, RelayResult};
use crate::model::payload::Envelope;

pub struct RelayPeer {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl RelayPeer {
    /// Connect to `url` and wait for the hub's `connected` handshake.
    pub async fn connect(url: &str) -> RelayResult<RelayPeer> {
        let (ws, _) = tokio_tungstenite::connect_async(url).await?;
        let mut peer = RelayPeer { ws };

        match peer.next_message().await? {
            Some(value) if Envelope::from_value(&value).is_some_and(|e| e.is_connected()) => {
                debug!("Handshake received from {}", url);
                Ok(peer)
            }
            _ => Err(RelayError::MissingHandshake),
        }
    }

    pub async fn send(&mut self, value: &Value) -> RelayResult<()> {
        self.send_raw(&value.to_string()).await
    }

    pub async fn send_envelope(&mut self, envelope: &Envelope) -> RelayResult<()> {
        self.send(&envelope.to_value()?).await
    }

    /// Send text as-is, without checking that it is JSON.
    pub async fn send_raw(&mut self, text: &str) -> RelayResult<()> {
        self.ws.send(Message::text(text)).await?;
        Ok(())
    }

    /// The next relayed value, or `None` once the hub closed the connection.
    pub async fn next_message(&mut self) -> RelayResult<Option<Value>> {
        while let Some(frame) = self.ws.next().await {
            let value = match frame? {
                Message::Text(text) => serde_json::from_str(&text)?,
                Message::Binary(data) => serde_json::from_slice(&data)?,
                Message::Close(frame) => {
                    debug!("Hub closed connection: {:?}", frame);
                    return Ok(None);
                }
                _ => continue,
            };
            return Ok(Some(value));
        }

        Ok(None)
    }

    pub async fn close(mut self) -> RelayResult<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}

/// Send one chat envelope and print everything relayed until the hub closes
/// or Ctrl-C.
pub async fn main(url: &str, text: &str) -> RelayResult<()> {
    let mut peer = RelayPeer::connect(url).await?;
    info!("Connected to relay hub at {}", url);

    peer.send_envelope(&Envelope::new("chat", json!({ "text": text })))
        .await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            msg = peer.next_message() => match msg? {
                Some(value) => println!("{}", value),
                None => {
                    info!("Relay hub closed the connection");
                    return Ok(());
                }
            },
        }
    }

    peer.close().await
}
