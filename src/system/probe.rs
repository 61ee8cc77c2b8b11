use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::trace;

/// Check whether something accepts TCP connections on `host:port`
pub fn is_listening(host: &str, port: u16, timeout: Duration) -> bool {
    let addrs: Vec<SocketAddr> = match (host, port).to_socket_addrs() {
        Ok(addrs) => addrs.collect(),
        Err(e) => {
            trace!("could not resolve {}:{}: {}", host, port, e);
            return false;
        }
    };

    addrs.iter().any(|addr| match TcpStream::connect_timeout(addr, timeout) {
        Ok(_) => true,
        Err(e) => {
            trace!("probe {} failed: {}", addr, e);
            false
        }
    })
}
