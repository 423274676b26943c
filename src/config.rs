//! Relay hub configuration
//!
//! The same struct is used as the `server` subcommand's arguments, so every
//! field can come from a flag, an environment variable or the default.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::Args;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024;
pub const DEFAULT_OUTBOUND_QUEUE: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct RelayConfig {
    /// Address to listen on
    #[arg(long, env = "RELAY_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on, 0 picks a free port
    #[arg(long, env = "RELAY_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Largest inbound message accepted before the sender is closed
    #[arg(long, env = "RELAY_MAX_MESSAGE_BYTES", default_value_t = DEFAULT_MAX_MESSAGE_BYTES)]
    pub max_message_bytes: usize,

    /// Messages buffered per connection before deliveries to it are skipped
    #[arg(long, env = "RELAY_OUTBOUND_QUEUE", default_value_t = DEFAULT_OUTBOUND_QUEUE)]
    pub outbound_queue: usize,
}

impl RelayConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
        }
    }
}
