//! TCP binding and endpoint advertisement.
//!
//! # Responsibilities
//! - Bind transports to `host:port` (port 0 picks an ephemeral port)
//! - Work out the address other processes should dial
//! - Format discovery endpoints (`http://ip:port`, `grpc://ip:port`)

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use tokio::net::TcpListener;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Bind a TCP listener on `host:port`.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ListenerError::Bind {
            addr: addr.clone(),
            source,
        })?;

    if let Ok(local) = listener.local_addr() {
        tracing::debug!(address = %local, "Listener bound");
    }
    Ok(listener)
}

/// The address to advertise for a listener bound at `bound`.
///
/// An unspecified bind address (`0.0.0.0`, `::`) is replaced with the host's
/// outbound IP, falling back to loopback.
pub fn advertise_addr(bound: SocketAddr) -> SocketAddr {
    if !bound.ip().is_unspecified() {
        return bound;
    }
    let ip = outbound_ip().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
    SocketAddr::new(ip, bound.port())
}

/// Discovery endpoint string for `scheme` at `addr`.
pub fn endpoint(scheme: &str, addr: SocketAddr) -> String {
    format!("{}://{}", scheme, addr)
}

// Connecting a UDP socket sends nothing; it only makes the kernel pick the
// source address for the default route.
fn outbound_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}
