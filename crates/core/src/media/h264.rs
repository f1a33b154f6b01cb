use std::num::NonZeroU32;

use super::nal::{NalHeader, NalUnit, split_nal_units};
use super::rtp::{RtpTimestamp, RtpTransport};
use crate::error::Result;

/// RTP clock rate for H.264 (RFC 6184 §8.1).
pub const H264_CLOCK_RATE: u32 = 90000;

/// First dynamic payload type, conventionally used for H.264.
pub const H264_PAYLOAD_TYPE: u8 = 96;

/// Largest NAL unit sent whole before switching to FU-A.
pub const DEFAULT_MAX_UNIT_SIZE: usize = 1200;

const FU_A_TYPE: u8 = 28;

/// H.264 NAL unit sender (RFC 6184).
///
/// - **Single NAL Unit** (§5.6): units no larger than `max_unit_size` go
///   out as-is in one RTP packet.
///
/// - **FU-A** (§5.8): larger units are split. Each fragment carries a
///   2-byte payload header before a slice of the unit's payload:
///
///   ```text
///   FU indicator:  [F|NRI|Type=28]
///   FU header:     [S|E|R|NAL_Type]
///   ```
///
/// The marker bit goes on the last packet of a coded slice.
#[derive(Debug)]
pub struct NalTransport {
    rtp: RtpTransport,
    max_unit_size: usize,
}

impl NalTransport {
    pub fn new(rtp: RtpTransport) -> Self {
        Self::with_max_unit_size(rtp, DEFAULT_MAX_UNIT_SIZE)
    }

    /// # Panics
    ///
    /// If `max_unit_size` leaves no room for fragment data after the
    /// 2-byte FU-A header.
    pub fn with_max_unit_size(rtp: RtpTransport, max_unit_size: usize) -> Self {
        assert!(max_unit_size > 2, "max_unit_size must exceed the FU-A header");
        Self { rtp, max_unit_size }
    }

    /// Send one NAL unit, fragmenting it if needed.
    ///
    /// Returns the bytes put on the wire across all packets.
    pub fn send_packet(&mut self, timestamp: RtpTimestamp, unit: &NalUnit<'_>) -> Result<usize> {
        let header = unit.header();
        let marker = header.is_coded_slice();

        if unit.as_bytes().len() <= self.max_unit_size {
            return self.rtp.send_packet(timestamp, marker, &[], unit.as_bytes());
        }

        let fu_indicator = (header.to_byte() & 0xE0) | FU_A_TYPE;
        let payload = unit.payload();
        let max_fragment = self.max_unit_size - 2;
        let fragments = payload.len().div_ceil(max_fragment);

        let mut sent = 0;
        for (i, chunk) in payload.chunks(max_fragment).enumerate() {
            let first = i == 0;
            let last = i + 1 == fragments;
            let start_bit = if first { 0x80 } else { 0x00 };
            let end_bit = if last { 0x40 } else { 0x00 };
            let fu_header = start_bit | end_bit | header.unit_type;
            sent += self
                .rtp
                .send_packet(timestamp, marker && last, &[fu_indicator, fu_header], chunk)?;
        }

        tracing::trace!(
            nal_type = header.unit_type,
            nal_size = unit.as_bytes().len(),
            fragments,
            "FU-A fragmented NAL unit"
        );
        Ok(sent)
    }

    pub fn max_unit_size(&self) -> usize {
        self.max_unit_size
    }

    pub fn rtp(&self) -> &RtpTransport {
        &self.rtp
    }
}

/// An H.264 stream paced by access unit delimiters.
///
/// The running timestamp moves forward by `clock_rate / frame_rate` each
/// time an AUD is sent, before the AUD itself goes out. Every other unit
/// carries the current timestamp unchanged, so all units of one picture
/// share a timestamp.
#[derive(Debug)]
pub struct VideoStream {
    nal: NalTransport,
    timestamp: u32,
    frame_step: u32,
}

impl VideoStream {
    pub fn new(nal: NalTransport, frame_rate: NonZeroU32) -> Self {
        let frame_step = nal.rtp().clock_rate() / frame_rate.get();
        tracing::debug!(frame_rate = frame_rate.get(), frame_step, "video stream created");
        Self {
            nal,
            timestamp: 0,
            frame_step,
        }
    }

    pub fn send_unit(&mut self, unit: &NalUnit<'_>) -> Result<usize> {
        if unit.header().is_aud() {
            self.timestamp = self.timestamp.wrapping_add(self.frame_step);
        }
        self.nal.send_packet(RtpTimestamp::Raw(self.timestamp), unit)
    }

    /// Split an Annex B buffer and send every unit in order.
    ///
    /// Stops at the first failed send.
    pub fn send_annex_b(&mut self, data: &[u8]) -> Result<usize> {
        let mut sent = 0;
        for unit in split_nal_units(data) {
            sent += self.send_unit(&unit)?;
        }
        Ok(sent)
    }

    /// Timestamp of the current picture.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn frame_step(&self) -> u32 {
        self.frame_step
    }
}

/// Collect the first SPS and PPS of an Annex B buffer (RFC 6184 §8.1
/// `sprop-parameter-sets`).
pub fn parameter_sets(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let mut sps = None;
    let mut pps = None;
    for unit in split_nal_units(data) {
        match unit.header().unit_type {
            NalHeader::SPS if sps.is_none() => sps = Some(unit.as_bytes()),
            NalHeader::PPS if pps.is_none() => pps = Some(unit.as_bytes()),
            _ => {}
        }
        if let (Some(sps), Some(pps)) = (sps, pps) {
            return Some((sps, pps));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::rtp::{RTP_HEADER_LEN, RtpHeader};
    use crate::testing::{CaptureSink, frames};
    use crate::transport::{ConnectionWriter, Transport};

    fn capture(max_unit_size: usize) -> (NalTransport, CaptureSink) {
        let sink = CaptureSink::default();
        let transport = Transport::tcp(ConnectionWriter::new(sink.clone()), 2);
        let rtp = RtpTransport::with_state(transport, H264_PAYLOAD_TYPE, H264_CLOCK_RATE, 0xAABBCCDD, 100);
        (NalTransport::with_max_unit_size(rtp, max_unit_size), sink)
    }

    fn packets(sink: &CaptureSink) -> Vec<(RtpHeader, Vec<u8>)> {
        frames(&sink.contents())
            .into_iter()
            .map(|(channel, pkt)| {
                assert_eq!(channel, 2);
                (RtpHeader::decode(&pkt).unwrap(), pkt[RTP_HEADER_LEN..].to_vec())
            })
            .collect()
    }

    fn fps(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn small_unit_single_packet() {
        let (mut nal, sink) = capture(DEFAULT_MAX_UNIT_SIZE);
        let data = [0x65, 0xAA, 0xBB, 0xCC];
        nal.send_packet(RtpTimestamp::Raw(3000), &NalUnit::new(&data).unwrap())
            .unwrap();

        let sent = packets(&sink);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].0.marker);
        assert_eq!(sent[0].0.timestamp, 3000);
        assert_eq!(sent[0].1, data);
    }

    #[test]
    fn parameter_set_has_no_marker() {
        let (mut nal, sink) = capture(DEFAULT_MAX_UNIT_SIZE);
        nal.send_packet(RtpTimestamp::Raw(0), &NalUnit::new(&[0x67, 0x42]).unwrap())
            .unwrap();
        assert!(!packets(&sink)[0].0.marker);
    }

    #[test]
    fn large_unit_fragmented() {
        let (mut nal, sink) = capture(10);
        let mut data = vec![0x65];
        data.extend((0..20).map(|i| i as u8));
        nal.send_packet(RtpTimestamp::Raw(0), &NalUnit::new(&data).unwrap())
            .unwrap();

        let sent = packets(&sink);
        assert_eq!(sent.len(), 3);

        let headers: Vec<[u8; 2]> = sent.iter().map(|(_, p)| [p[0], p[1]]).collect();
        assert_eq!(headers, [[0x7C, 0x85], [0x7C, 0x05], [0x7C, 0x45]]);

        let markers: Vec<bool> = sent.iter().map(|(h, _)| h.marker).collect();
        assert_eq!(markers, [false, false, true]);

        let seqs: Vec<u16> = sent.iter().map(|(h, _)| h.sequence_number).collect();
        assert_eq!(seqs, [100, 101, 102]);

        let reassembled: Vec<u8> = sent.iter().flat_map(|(_, p)| p[2..].to_vec()).collect();
        assert_eq!(reassembled, data[1..]);
    }

    #[test]
    fn aud_steps_timestamp() {
        let (nal, sink) = capture(DEFAULT_MAX_UNIT_SIZE);
        let mut video = VideoStream::new(nal, fps(25));
        assert_eq!(video.frame_step(), 3600);

        let units: [&[u8]; 7] = [
            &[0x09, 0xF0],
            &[0x67, 0x42],
            &[0x65, 0x88],
            &[0x09, 0xF0],
            &[0x41, 0x9A],
            &[0x09, 0xF0],
            &[0x41, 0x9B],
        ];
        let mut stream = Vec::new();
        for unit in units {
            stream.extend_from_slice(&[0, 0, 0, 1]);
            stream.extend_from_slice(unit);
        }
        video.send_annex_b(&stream).unwrap();

        let timestamps: Vec<u32> = packets(&sink).iter().map(|(h, _)| h.timestamp).collect();
        assert_eq!(timestamps, [3600, 3600, 3600, 7200, 7200, 10800, 10800]);
        assert_eq!(video.timestamp(), 10800);
    }

    #[test]
    fn no_aud_no_step() {
        let (nal, sink) = capture(DEFAULT_MAX_UNIT_SIZE);
        let mut video = VideoStream::new(nal, fps(30));
        video.send_annex_b(&[0, 0, 1, 0x65, 1, 0, 0, 1, 0x41, 2]).unwrap();

        assert!(packets(&sink).iter().all(|(h, _)| h.timestamp == 0));
    }

    #[test]
    fn finds_parameter_sets() {
        let data = [0, 0, 0, 1, 0x09, 0xF0, 0, 0, 0, 1, 0x67, 0x42, 0, 0, 0, 1, 0x68, 0xCE];
        assert_eq!(parameter_sets(&data), Some((&[0x67, 0x42][..], &[0x68, 0xCE][..])));
        assert_eq!(parameter_sets(&[0, 0, 1, 0x67, 0x42]), None);
    }
}
