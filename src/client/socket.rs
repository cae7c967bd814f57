//! TCP dialling with socket options applied before connect.

use std::{io, net::SocketAddr};

use socket2::{SockRef, TcpKeepalive};
use tokio::net::{TcpSocket, TcpStream, lookup_host};

use crate::config::ClientConfig;

/// Resolve `config.address` and connect to the first address that accepts.
pub(super) async fn dial(config: &ClientConfig) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in lookup_host(config.address.as_str()).await? {
        match connect_addr(addr, config).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "address did not resolve to any socket address",
        )
    }))
}

async fn connect_addr(addr: SocketAddr, config: &ClientConfig) -> io::Result<TcpStream> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    apply_keepalive(&socket, config)?;
    socket.set_nodelay(true)?;
    socket.connect(addr).await
}

fn apply_keepalive(socket: &TcpSocket, config: &ClientConfig) -> io::Result<()> {
    socket.set_keepalive(config.keep_alive)?;
    if config.keep_alive {
        let sock_ref = SockRef::from(socket);
        let keepalive = TcpKeepalive::new().with_time(config.keep_alive_period);
        sock_ref.set_tcp_keepalive(&keepalive)?;
    }
    Ok(())
}
