use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::Arc;

use crate::error::Result;
use crate::transport::Transport;

/// Bind an ephemeral UDP socket for outbound RTP to `peer`.
///
/// The socket uses the peer's address family so that `send_to` works for
/// both IPv4 and IPv6 clients.
pub fn bind_for(peer: IpAddr) -> Result<UdpSocket> {
    let local = match peer {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    let socket = UdpSocket::bind(SocketAddr::new(local, 0))?;
    tracing::debug!(local = ?socket.local_addr().ok(), %peer, "bound RTP socket");
    Ok(socket)
}

/// Build a UDP [`Transport`] that sends RTP to `peer:client_rtp_port`.
///
/// Called during SETUP once the client's `client_port` pair is known.
pub fn transport_to(peer: IpAddr, client_rtp_port: u16) -> Result<Transport> {
    let socket = bind_for(peer)?;
    Ok(Transport::udp(
        Arc::new(socket),
        SocketAddr::new(peer, client_rtp_port),
    ))
}
