use std::net::{IpAddr, SocketAddr};

use systemstat::{Platform, System};
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// The filter is taken from `RUST_LOG` and defaults to `info`.
pub fn init_log() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Pick an IPv4 address that remote peers can use to reach this host.
///
/// Iterates over all network interfaces provided by `systemstat`, skipping any
/// loopback, link-local or broadcast addresses. The first routable interface is
/// returned, or `None` when the host exposes no usable IPv4 address.
pub fn select_host_address() -> Option<IpAddr> {
    let system = System::new();
    let networks = system.networks().ok()?;

    for net in networks.values() {
        for n in &net.addrs {
            if let systemstat::IpAddr::V4(v) = n.addr {
                if !v.is_loopback() && !v.is_link_local() && !v.is_broadcast() {
                    return Some(IpAddr::V4(v));
                }
            }
        }
    }

    None
}

/// The `ws://` URL peers should connect to for a hub bound on `bound`.
///
/// A wildcard bind address is replaced by a routable interface address when
/// one can be found.
pub fn advertised_url(bound: SocketAddr) -> String {
    let ip = if bound.ip().is_unspecified() {
        select_host_address().unwrap_or(bound.ip())
    } else {
        bound.ip()
    };

    format!("ws://{}", SocketAddr::new(ip, bound.port()))
}
