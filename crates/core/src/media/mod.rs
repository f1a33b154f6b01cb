//! RTP packetization of media streams.
//!
//! ## RTP overview (RFC 3550)
//!
//! Every RTP packet carries a 12-byte fixed header ([`rtp::RtpHeader`])
//! containing:
//!
//! - **Sequence number** (16-bit, wrapping): one per packet, for reordering and loss detection.
//! - **Timestamp** (32-bit): media clock supplied by the caller.
//! - **SSRC** (32-bit): randomly chosen to identify the sender.
//! - **Marker bit**: codec-defined, for H.264 the end of a picture.
//!
//! [`RtpTransport`] owns the per-stream header state and hands finished
//! packets to a [`crate::Transport`]. Codec streams build on it:
//!
//! | Stream | Module | Payload | Timestamp advances |
//! |--------|--------|---------|--------------------|
//! | [`AudioStream`] | [`audio`] | G.711, RFC 3551 | by samples per packet |
//! | [`VideoStream`] | [`h264`] | H.264, RFC 6184 | by `clock_rate / fps` at each AUD |

pub mod audio;
pub mod h264;
pub mod nal;
pub mod rtp;

pub use audio::AudioStream;
pub use h264::{NalTransport, VideoStream};
pub use nal::{NalHeader, NalUnit, NalUnits, StartCode, split_nal_units};
pub use rtp::{RtpHeader, RtpTimestamp, RtpTransport};
