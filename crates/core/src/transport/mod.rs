//! Network transport layer for RTSP signaling and RTP media delivery.
//!
//! - **TCP** ([`tcp`]): carries RTSP requests and responses, and optionally
//!   RTP interleaved into the same connection with `$` framing
//!   (RFC 2326 §10.12).
//!
//! - **UDP** ([`udp`]): carries RTP as bare datagrams to the client port
//!   negotiated during SETUP.
//!
//! [`Transport`] is the per-stream sink the RTP layer writes to. It is
//! fixed when the stream is set up and never changes afterwards.

pub mod tcp;
pub mod udp;

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

use crate::error::Result;
pub use tcp::ConnectionWriter;

/// Lower transport of one RTP stream.
#[derive(Debug, Clone)]
pub enum Transport {
    /// Interleaved over the RTSP connection on `channel`.
    Tcp {
        channel: u8,
        writer: ConnectionWriter,
    },
    /// Unframed datagrams to `destination`.
    Udp {
        socket: Arc<UdpSocket>,
        destination: SocketAddr,
    },
}

impl Transport {
    pub fn tcp(writer: ConnectionWriter, channel: u8) -> Self {
        Self::Tcp { channel, writer }
    }

    pub fn udp(socket: Arc<UdpSocket>, destination: SocketAddr) -> Self {
        Self::Udp {
            socket,
            destination,
        }
    }

    pub fn is_interleaved(&self) -> bool {
        matches!(self, Self::Tcp { .. })
    }

    /// Deliver one complete RTP packet, applying the framing this
    /// transport needs. Returns the number of bytes put on the wire.
    ///
    /// Failures are returned as-is; nothing is retried here.
    pub fn send(&self, packet: &[u8]) -> Result<usize> {
        match self {
            Self::Tcp { channel, writer } => writer.send_interleaved(*channel, packet),
            Self::Udp {
                socket,
                destination,
            } => Ok(socket.send_to(packet, destination)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CaptureSink;

    #[test]
    fn tcp_prepends_frame_header() {
        let sink = CaptureSink::default();
        let transport = Transport::tcp(ConnectionWriter::new(sink.clone()), 2);
        assert!(transport.is_interleaved());
        assert_eq!(transport.send(&[0xAA, 0xBB, 0xCC]).unwrap(), 7);
        assert_eq!(sink.contents(), [b'$', 2, 0x00, 0x03, 0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn udp_sends_bare_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(std::time::Duration::from_secs(2)))
            .unwrap();
        let sender = Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap());
        let transport = Transport::udp(sender, receiver.local_addr().unwrap());
        assert!(!transport.is_interleaved());

        assert_eq!(transport.send(b"rtp").unwrap(), 3);
        let mut buf = [0u8; 16];
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"rtp");
    }
}
