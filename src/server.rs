//! Relay hub
//!
//! Accepts websocket connections on a single port and mirrors every inbound
//! JSON message to all open connections, the sender included. The hub never
//! looks inside payloads.
//!
//! Each connection gets a reader (this task) and a writer task draining a
//! bounded queue. Fan-out only ever does a non-blocking `try_send` into those
//! queues, so a slow peer cannot stall the sender or anyone else.

use std::future::{pending, Future};
use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    tungstenite::{
        protocol::{frame::coding::CloseCode, CloseFrame},
        Message,
    },
    WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::model::{
    connection::{ConnectionHandle, ConnectionId},
    payload::{parse_inbound, Envelope},
    registry::ConnectionRegistry,
};
use crate::util::advertised_url;

/// How long a closed connection's writer may take to flush its queue.
const WRITER_DRAIN: Duration = Duration::from_secs(5);

/// Run the hub until Ctrl-C.
pub async fn main(config: RelayConfig) -> RelayResult<()> {
    let hub = RelayHub::bind(config).await?;
    let addr = hub.local_addr()?;
    info!("Relay hub listening on {}", addr);
    info!("Connect peers to {}", advertised_url(addr));

    hub.run_until(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Waiting for Ctrl-C failed: {}", e);
            pending::<()>().await;
        }
        info!("Shutting down relay hub");
    })
    .await
}

pub struct RelayHub {
    listener: TcpListener,
    config: RelayConfig,
    registry: ConnectionRegistry,
}

impl RelayHub {
    pub async fn bind(config: RelayConfig) -> RelayResult<RelayHub> {
        let listener = TcpListener::bind(config.bind_addr()).await?;

        Ok(RelayHub {
            listener,
            config,
            registry: ConnectionRegistry::new(),
        })
    }

    /// Listen on `port` with default settings and serve forever.
    pub async fn start(port: u16) -> RelayResult<()> {
        RelayHub::bind(RelayConfig::with_port(port))
            .await?
            .run()
            .await
    }

    pub fn local_addr(&self) -> RelayResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared handle to the hub's connection set.
    pub fn registry(&self) -> ConnectionRegistry {
        self.registry.clone()
    }

    pub async fn run(self) -> RelayResult<()> {
        self.run_until(pending()).await
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> RelayResult<()> {
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => {
                    let registry = self.registry.clone();
                    let config = self.config.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, registry, config).await {
                            debug!("Connection from {} ended with error: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    // Typically fd exhaustion; back off instead of spinning.
                    warn!("Accept failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }

        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    registry: ConnectionRegistry,
    config: RelayConfig,
) -> RelayResult<()> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (sink, mut source) = ws.split();

    let (tx, rx) = mpsc::channel::<Message>(config.outbound_queue.max(1));
    let conn = ConnectionHandle::new(addr, tx);
    let id = conn.id;

    // Queue the handshake before broadcasts can see this connection.
    conn.try_deliver(Message::text(serde_json::to_string(&Envelope::connected())?));
    let writer = tokio::spawn(write_loop(sink, rx, id));
    registry.add(conn.clone());
    info!(
        "Connection({}) from {} registered, {} open",
        *id,
        addr,
        registry.len()
    );

    while let Some(frame) = source.next().await {
        let msg = match frame {
            Ok(msg) => msg,
            Err(e) => {
                debug!("Connection({}) read failed: {}", *id, e);
                break;
            }
        };

        let bytes: &[u8] = match &msg {
            Message::Text(text) => text.as_bytes(),
            Message::Binary(data) => data.as_slice(),
            Message::Close(_) => break,
            // Ping/Pong are answered by tungstenite.
            _ => continue,
        };

        match parse_inbound(bytes, config.max_message_bytes) {
            Ok(value) => {
                let delivered = registry.broadcast(&Message::text(value.to_string()));
                debug!("Connection({}) message fanned out to {}", *id, delivered);
            }
            Err(e) => {
                warn!("Connection({}) closed: {}", *id, e);
                conn.close(close_message(&e));
                break;
            }
        }
    }

    registry.remove(id);
    conn.close(Message::Close(None));
    let age = conn.age();
    drop(conn);

    join_writer(writer, id, WRITER_DRAIN).await;

    info!(
        "Connection({}) from {} removed after {}s, {} open",
        *id,
        addr,
        age.num_seconds(),
        registry.len()
    );

    Ok(())
}

async fn write_loop(
    mut sink: SplitSink<WebSocketStream<TcpStream>, Message>,
    mut rx: mpsc::Receiver<Message>,
    id: ConnectionId,
) {
    while let Some(msg) = rx.recv().await {
        let closing = msg.is_close();

        if let Err(e) = sink.send(msg).await {
            debug!("Connection({}) write failed: {}", *id, e);
            break;
        }

        if closing {
            break;
        }
    }

    let _ = sink.close().await;
}

/// Wait for a writer to flush, aborting it after `grace`.
///
/// Returns `false` when the writer had to be aborted.
async fn join_writer(mut writer: JoinHandle<()>, id: ConnectionId, grace: Duration) -> bool {
    match tokio::time::timeout(grace, &mut writer).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!("Connection({}) writer task failed: {}", *id, e);
            true
        }
        Err(_) => {
            warn!("Connection({}) writer stalled, aborting", *id);
            writer.abort();
            false
        }
    }
}

fn close_message(err: &RelayError) -> Message {
    let (code, reason) = match err {
        RelayError::PayloadTooLarge { .. } => (CloseCode::Size, "message too large"),
        _ => (CloseCode::Protocol, "malformed payload"),
    };

    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}
