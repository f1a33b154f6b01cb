use rand::Rng;

use crate::error::Result;
use crate::transport::Transport;

/// Length of the fixed RTP header without CSRCs.
pub const RTP_HEADER_LEN: usize = 12;

/// The only RTP version in use (RFC 3550 §5.1).
pub const RTP_VERSION: u8 = 2;

/// RTP fixed header (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Big-endian throughout. The version is implied and always 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    pub padding: bool,
    pub extension: bool,
    pub csrc_count: u8,
    pub marker: bool,
    /// 7-bit payload type (RFC 3551).
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

impl RtpHeader {
    pub fn encode(&self) -> [u8; RTP_HEADER_LEN] {
        let mut header = [0u8; RTP_HEADER_LEN];
        header[0] = (RTP_VERSION << 6)
            | ((self.padding as u8) << 5)
            | ((self.extension as u8) << 4)
            | (self.csrc_count & 0x0f);
        header[1] = ((self.marker as u8) << 7) | (self.payload_type & 0x7f);
        header[2..4].copy_from_slice(&self.sequence_number.to_be_bytes());
        header[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        header[8..12].copy_from_slice(&self.ssrc.to_be_bytes());
        header
    }

    /// Read the fixed header at the start of `buf`.
    ///
    /// Returns `None` if `buf` is shorter than 12 bytes or the version is not 2.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let b: &[u8; RTP_HEADER_LEN] = buf.get(..RTP_HEADER_LEN)?.try_into().ok()?;
        if b[0] >> 6 != RTP_VERSION {
            return None;
        }
        Some(Self {
            padding: b[0] & 0x20 != 0,
            extension: b[0] & 0x10 != 0,
            csrc_count: b[0] & 0x0f,
            marker: b[1] & 0x80 != 0,
            payload_type: b[1] & 0x7f,
            sequence_number: u16::from_be_bytes([b[2], b[3]]),
            timestamp: u32::from_be_bytes([b[4], b[5], b[6], b[7]]),
            ssrc: u32::from_be_bytes([b[8], b[9], b[10], b[11]]),
        })
    }
}

/// A caller-supplied RTP timestamp.
///
/// There is no implicit clock: every packet carries the timestamp its
/// sender computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtpTimestamp {
    /// Already in clock-rate units.
    Raw(u32),
    /// Microseconds, scaled by the stream's clock rate.
    SysClockUs(u64),
}

impl RtpTimestamp {
    /// Value in units of `clock_rate`, truncated to 32 bits (the RTP
    /// timestamp wraps, RFC 3550 §5.1).
    pub fn to_clock(self, clock_rate: u32) -> u32 {
        match self {
            Self::Raw(ts) => ts,
            Self::SysClockUs(us) => (u128::from(us) * u128::from(clock_rate) / 1_000_000) as u32,
        }
    }
}

/// Per-stream RTP packetizer bound to one [`Transport`].
///
/// Holds the stream's SSRC (fixed for its lifetime) and next sequence
/// number, which advances by exactly one for every packet handed to the
/// transport and wraps at 2^16. A packet the transport fails to send does
/// not use up a sequence number.
#[derive(Debug)]
pub struct RtpTransport {
    transport: Transport,
    payload_type: u8,
    clock_rate: u32,
    ssrc: u32,
    sequence: u16,
}

impl RtpTransport {
    /// Create a stream with a random SSRC (RFC 3550 §8.1) and a random
    /// initial sequence number (RFC 3550 §5.1), both drawn from `rng`.
    pub fn new<R: Rng>(transport: Transport, payload_type: u8, clock_rate: u32, rng: &mut R) -> Self {
        let ssrc = rng.random::<u32>();
        let sequence = rng.random::<u16>();
        Self::with_state(transport, payload_type, clock_rate, ssrc, sequence)
    }

    /// Create a stream with explicit SSRC and initial sequence number.
    ///
    /// # Panics
    ///
    /// If `payload_type` does not fit in 7 bits.
    pub fn with_state(
        transport: Transport,
        payload_type: u8,
        clock_rate: u32,
        ssrc: u32,
        initial_sequence: u16,
    ) -> Self {
        assert!(payload_type <= 0x7f, "RTP payload type is a 7-bit field");
        tracing::debug!(
            payload_type,
            clock_rate,
            ssrc,
            initial_sequence,
            interleaved = transport.is_interleaved(),
            "RTP stream created"
        );
        Self {
            transport,
            payload_type,
            clock_rate,
            ssrc,
            sequence: initial_sequence,
        }
    }

    /// Build one RTP packet and send it.
    ///
    /// The packet is the 12-byte header, then `payload_header` (a
    /// codec-specific prefix such as an FU-A indicator, may be empty),
    /// then `payload`. Returns the bytes put on the wire.
    pub fn send_packet(
        &mut self,
        timestamp: RtpTimestamp,
        marker: bool,
        payload_header: &[u8],
        payload: &[u8],
    ) -> Result<usize> {
        let header = RtpHeader {
            padding: false,
            extension: false,
            csrc_count: 0,
            marker,
            payload_type: self.payload_type,
            sequence_number: self.sequence,
            timestamp: timestamp.to_clock(self.clock_rate),
            ssrc: self.ssrc,
        };

        let mut packet =
            Vec::with_capacity(RTP_HEADER_LEN + payload_header.len() + payload.len());
        packet.extend_from_slice(&header.encode());
        packet.extend_from_slice(payload_header);
        packet.extend_from_slice(payload);

        match self.transport.send(&packet) {
            Ok(sent) => {
                tracing::trace!(
                    seq = header.sequence_number,
                    ts = header.timestamp,
                    marker,
                    len = packet.len(),
                    "RTP packet sent"
                );
                self.sequence = self.sequence.wrapping_add(1);
                Ok(sent)
            }
            Err(e) => {
                tracing::warn!(seq = header.sequence_number, error = %e, "RTP send failed");
                Err(e)
            }
        }
    }

    /// Sequence number the next packet will carry.
    pub fn next_sequence(&self) -> u16 {
        self.sequence
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }

    pub fn clock_rate(&self) -> u32 {
        self.clock_rate
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CaptureSink, frames};
    use crate::transport::ConnectionWriter;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn capture(ssrc: u32, seq: u16) -> (RtpTransport, CaptureSink) {
        let sink = CaptureSink::default();
        let transport = Transport::tcp(ConnectionWriter::new(sink.clone()), 0);
        (RtpTransport::with_state(transport, 96, 90000, ssrc, seq), sink)
    }

    fn sent_headers(sink: &CaptureSink) -> Vec<(RtpHeader, Vec<u8>)> {
        frames(&sink.contents())
            .into_iter()
            .map(|(_, pkt)| (RtpHeader::decode(&pkt).unwrap(), pkt[RTP_HEADER_LEN..].to_vec()))
            .collect()
    }

    #[test]
    fn header_layout() {
        let header = RtpHeader {
            padding: false,
            extension: false,
            csrc_count: 0,
            marker: true,
            payload_type: 96,
            sequence_number: 0x0102,
            timestamp: 0x03040506,
            ssrc: 0xAABBCCDD,
        };
        assert_eq!(
            header.encode(),
            [0x80, 0xE0, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0xAA, 0xBB, 0xCC, 0xDD]
        );
        assert_eq!(RtpHeader::decode(&header.encode()), Some(header));
    }

    #[test]
    fn decode_rejects_short_or_wrong_version() {
        assert!(RtpHeader::decode(&[0x80; 11]).is_none());
        assert!(RtpHeader::decode(&[0x40; 12]).is_none());
    }

    #[test]
    fn packet_carries_payload_header_and_payload() {
        let (mut rtp, sink) = capture(0x11223344, 7);
        rtp.send_packet(RtpTimestamp::Raw(160), false, &[0x7C, 0x85], b"data")
            .unwrap();

        let sent = sent_headers(&sink);
        assert_eq!(sent.len(), 1);
        let (header, body) = &sent[0];
        assert_eq!(header.sequence_number, 7);
        assert_eq!(header.timestamp, 160);
        assert_eq!(header.ssrc, 0x11223344);
        assert_eq!(header.payload_type, 96);
        assert!(!header.marker);
        assert!(!header.extension);
        assert_eq!(body, &[0x7C, 0x85, b'd', b'a', b't', b'a']);
    }

    #[test]
    fn sequence_is_monotonic_and_wraps() {
        let (mut rtp, sink) = capture(1, u16::MAX - 2);
        for _ in 0..5 {
            rtp.send_packet(RtpTimestamp::Raw(0), false, &[], &[0]).unwrap();
        }
        let seqs: Vec<u16> = sent_headers(&sink)
            .iter()
            .map(|(h, _)| h.sequence_number)
            .collect();
        assert_eq!(seqs, [u16::MAX - 2, u16::MAX - 1, u16::MAX, 0, 1]);
        assert_eq!(rtp.next_sequence(), 2);
    }

    #[test]
    fn marker_bit() {
        let (mut rtp, sink) = capture(1, 0);
        rtp.send_packet(RtpTimestamp::Raw(0), true, &[], &[1]).unwrap();
        assert!(sent_headers(&sink)[0].0.marker);
    }

    #[test]
    fn failed_send_keeps_sequence() {
        let (mut rtp, _) = capture(1, 10);
        let oversized = vec![0u8; u16::MAX as usize];
        assert!(rtp.send_packet(RtpTimestamp::Raw(0), false, &[], &oversized).is_err());
        assert_eq!(rtp.next_sequence(), 10);
    }

    #[test]
    fn sys_clock_timestamp_scales_by_clock_rate() {
        assert_eq!(RtpTimestamp::SysClockUs(1_000_000).to_clock(90000), 90000);
        assert_eq!(RtpTimestamp::SysClockUs(20_000).to_clock(8000), 160);
        assert_eq!(RtpTimestamp::Raw(42).to_clock(8000), 42);
    }

    #[test]
    fn random_state_comes_from_supplied_rng() {
        let sink = CaptureSink::default();
        let transport = Transport::tcp(ConnectionWriter::new(sink), 0);
        let a = RtpTransport::new(transport.clone(), 0, 8000, &mut StdRng::seed_from_u64(7));
        let b = RtpTransport::new(transport, 0, 8000, &mut StdRng::seed_from_u64(7));
        assert_eq!(a.ssrc(), b.ssrc());
        assert_eq!(a.next_sequence(), b.next_sequence());
    }
}
