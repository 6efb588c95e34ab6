//! Listener socket creation.
//!
//! SO_REUSEPORT is not set, so binding a port that is already listening fails
//! and surfaces as `PortInUse`.

use crate::error::ServerError;
use socket2::{Domain, Protocol, Socket, Type};
use std::io::ErrorKind;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::warn;

/// Create a non-blocking TCP listener on `addr`.
pub fn create_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    // Rebinding through TIME_WAIT after a restart; does not allow sharing a live listener on Unix
    #[cfg(unix)]
    socket.set_reuse_address(true)?;

    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}

/// Bind `addr`, mapping an occupied port to `PortInUse` unless `dynamic_fallback`
/// is set, in which case an ephemeral port on the same host is used instead.
pub fn bind_endpoint(addr: SocketAddr, dynamic_fallback: bool) -> Result<TcpListener, ServerError> {
    match create_listener(addr) {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == ErrorKind::AddrInUse => {
            if dynamic_fallback {
                warn!(
                    "Port {} is in use, falling back to a dynamic port",
                    addr.port()
                );
                let mut fallback = addr;
                fallback.set_port(0);
                create_listener(fallback).map_err(|source| ServerError::Bind {
                    addr: fallback,
                    source,
                })
            } else {
                Err(ServerError::PortInUse(addr.port()))
            }
        }
        Err(source) => Err(ServerError::Bind { addr, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_port_in_use() {
        let first = create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let taken = first.local_addr().unwrap();

        let err = bind_endpoint(taken, false).unwrap_err();
        assert!(matches!(err, ServerError::PortInUse(p) if p == taken.port()));

        let fallback = bind_endpoint(taken, true).unwrap();
        assert_ne!(fallback.local_addr().unwrap().port(), taken.port());
    }
}
