//! SDP body for DESCRIBE (RFC 8866).
//!
//! ```text
//! v=0
//! o=- <sess-id> <sess-ver> IN IP4 0.0.0.0
//! s=rtsp-wire
//! c=IN IP4 0.0.0.0
//! t=0 0
//! a=tool:rtsp-wire
//! m=audio 0 RTP/AVP 0                       ← when audio is served
//! a=control:audio
//! m=video 0 RTP/AVP 96                      ← when video is served
//! a=control:video
//! a=rtpmap:96 H264/90000
//! a=fmtp:96 packetization-mode=1[;sprop-parameter-sets=<sps>,<pps>]
//! a=framerate:<fps>
//! ```

use base64::prelude::{BASE64_STANDARD, Engine as _};
use rtsp::media::audio::PCMU_PAYLOAD_TYPE;
use rtsp::media::h264::{self, H264_CLOCK_RATE, H264_PAYLOAD_TYPE};

use crate::client::Media;

pub fn describe(media: &Media, session_id: u64) -> String {
    let mut sdp = vec![
        "v=0".to_string(),
        format!("o=- {session_id} 1 IN IP4 0.0.0.0"),
        "s=rtsp-wire".to_string(),
        "c=IN IP4 0.0.0.0".to_string(),
        "t=0 0".to_string(),
        "a=tool:rtsp-wire".to_string(),
    ];

    if media.audio.is_some() {
        sdp.push(format!("m=audio 0 RTP/AVP {PCMU_PAYLOAD_TYPE}"));
        sdp.push("a=control:audio".to_string());
    }

    if let Some(video) = &media.video {
        let mut fmtp = format!("a=fmtp:{H264_PAYLOAD_TYPE} packetization-mode=1");
        if let Some((sps, pps)) = h264::parameter_sets(video) {
            fmtp.push_str(&format!(
                ";sprop-parameter-sets={},{}",
                BASE64_STANDARD.encode(sps),
                BASE64_STANDARD.encode(pps)
            ));
        }

        sdp.push(format!("m=video 0 RTP/AVP {H264_PAYLOAD_TYPE}"));
        sdp.push("a=control:video".to_string());
        // rtpmap must precede the fmtp that refers to it.
        sdp.push(format!("a=rtpmap:{H264_PAYLOAD_TYPE} H264/{H264_CLOCK_RATE}"));
        sdp.push(fmtp);
        sdp.push(format!("a=framerate:{}", media.fps));
    }

    tracing::debug!("SDP: {}", sdp.join("\r\n"));
    format!("{}\r\n", sdp.join("\r\n"))
}

#[cfg(test)]
mod tests {
    use std::num::{NonZeroU32, NonZeroUsize};

    use super::*;

    fn media(audio: bool, video: Option<Vec<u8>>) -> Media {
        Media {
            audio: audio.then(|| vec![0xFF; 320]),
            video,
            fps: NonZeroU32::new(25).unwrap(),
            samples_per_packet: NonZeroUsize::new(160).unwrap(),
        }
    }

    #[test]
    fn audio_and_video() {
        let sdp = describe(&media(true, Some(vec![0, 0, 0, 1, 0x65, 0x88])), 42);

        assert!(sdp.starts_with("v=0\r\no=- 42 1 IN IP4 0.0.0.0\r\n"));
        assert!(sdp.contains("m=audio 0 RTP/AVP 0\r\na=control:audio\r\n"));
        assert!(sdp.contains("m=video 0 RTP/AVP 96\r\na=control:video\r\n"));
        assert!(sdp.contains("a=fmtp:96 packetization-mode=1\r\n"));
        assert!(sdp.contains("a=framerate:25\r\n"));

        let rtpmap = sdp.find("a=rtpmap:96 H264/90000").unwrap();
        let fmtp = sdp.find("a=fmtp:96").unwrap();
        assert!(rtpmap < fmtp);
        assert!(sdp.ends_with("\r\n"));
    }

    #[test]
    fn audio_only() {
        let sdp = describe(&media(true, None), 1);
        assert!(sdp.contains("m=audio"));
        assert!(!sdp.contains("m=video"));
    }

    #[test]
    fn parameter_sets_from_stream() {
        let video = vec![0, 0, 0, 1, 0x67, 0x42, 0x00, 0x1F, 0, 0, 0, 1, 0x68, 0xCE, 0x3C, 0x80];
        let sdp = describe(&media(false, Some(video)), 1);
        assert!(sdp.contains("a=fmtp:96 packetization-mode=1;sprop-parameter-sets=Z0IAHw==,aM48gA==\r\n"));
    }
}
