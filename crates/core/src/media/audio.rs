use std::num::NonZeroUsize;

use super::rtp::{RtpTimestamp, RtpTransport};
use crate::error::Result;

/// Static payload type of G.711 µ-law (RFC 3551 §6).
pub const PCMU_PAYLOAD_TYPE: u8 = 0;

/// G.711 sample rate, also its RTP clock rate.
pub const PCMU_CLOCK_RATE: u32 = 8000;

/// 20ms of G.711 audio.
pub const DEFAULT_SAMPLES_PER_PACKET: usize = 160;

/// Fixed-rate audio with one byte per sample (G.711).
///
/// Each packet's timestamp is the index of its first sample, so the
/// timestamp advances by the sample count of every packet sent.
#[derive(Debug)]
pub struct AudioStream {
    rtp: RtpTransport,
    samples_per_packet: NonZeroUsize,
    next_sample: u32,
}

impl AudioStream {
    pub fn new(rtp: RtpTransport, samples_per_packet: NonZeroUsize) -> Self {
        Self {
            rtp,
            samples_per_packet,
            next_sample: 0,
        }
    }

    /// Packetize and send `samples`. The final packet may be short.
    ///
    /// Stops at the first failed send; samples already sent stay counted.
    pub fn send_samples(&mut self, samples: &[u8]) -> Result<usize> {
        let mut sent = 0;
        for chunk in samples.chunks(self.samples_per_packet.get()) {
            sent += self
                .rtp
                .send_packet(RtpTimestamp::Raw(self.next_sample), false, &[], chunk)?;
            self.next_sample = self.next_sample.wrapping_add(chunk.len() as u32);
        }
        Ok(sent)
    }

    /// Timestamp the next packet will carry.
    pub fn timestamp(&self) -> u32 {
        self.next_sample
    }

    pub fn samples_per_packet(&self) -> NonZeroUsize {
        self.samples_per_packet
    }
}
