use std::net::SocketAddr;
use std::num::{NonZeroU32, NonZeroUsize, ParseIntError};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use rand::Rng;
use rand::rngs::StdRng;
use rtsp::media::audio::{PCMU_CLOCK_RATE, PCMU_PAYLOAD_TYPE};
use rtsp::media::h264::{H264_CLOCK_RATE, H264_PAYLOAD_TYPE};
use rtsp::media::{AudioStream, NalTransport, RtpTransport, VideoStream, split_nal_units};
use rtsp::protocol::{Context, Controller, LowerTransport, Request, TransportConfig};
use rtsp::transport::udp;
use rtsp::{Result, Transport};

/// Media files served to every client, loaded once at startup.
#[derive(Debug)]
pub struct Media {
    /// G.711 µ-law, 8 kHz mono.
    pub audio: Option<Vec<u8>>,
    /// H.264 Annex B with one AUD per picture.
    pub video: Option<Vec<u8>>,
    pub fps: NonZeroU32,
    pub samples_per_packet: NonZeroUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    Audio,
    Video,
}

impl StreamKind {
    fn from_uri(uri: &str) -> Self {
        if uri.trim_end_matches('/').ends_with("/audio") {
            Self::Audio
        } else {
            Self::Video
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Audio => 0,
            Self::Video => 1,
        }
    }
}

/// A stream that has been set up but not started.
struct PendingStream {
    kind: StreamKind,
    session_id: u64,
    rtp: RtpTransport,
}

/// Per-connection controller: one audio and one video stream, each
/// started by PLAY on a thread of its own.
pub struct Client {
    peer_addr: SocketAddr,
    media: Arc<Media>,
    sdp: Arc<str>,
    rng: StdRng,
    streams: [Option<PendingStream>; 2],
    stop: Arc<AtomicBool>,
}

impl Client {
    pub fn new(peer_addr: SocketAddr, media: Arc<Media>, sdp: Arc<str>, rng: StdRng) -> Self {
        Self {
            peer_addr,
            media,
            sdp,
            rng,
            streams: [None, None],
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Resolve the `Transport` header into a sink, staging the reply header.
    /// Responds and returns `None` on failure.
    fn transport(&self, ctx: &mut Context, req: &Request) -> Option<Transport> {
        let Some(value) = req.header("Transport") else {
            let _ = ctx.respond(400, "`Transport' not present");
            return None;
        };
        let Some(config) = TransportConfig::parse(value) else {
            let _ = ctx.respond(400, "Malformed `Transport'");
            return None;
        };

        match config.lower {
            LowerTransport::Tcp => {
                let Some(channels) = config.interleaved else {
                    let _ = ctx.respond(400, "`interleaved' not found");
                    return None;
                };
                ctx.header(
                    "Transport",
                    format!(
                        "RTP/AVP/TCP;unicast;interleaved={}-{}",
                        channels.rtp_channel, channels.rtcp_channel
                    ),
                );
                Some(Transport::tcp(ctx.writer().clone(), channels.rtp_channel))
            }
            LowerTransport::Udp => {
                let Some(ports) = config.client_port else {
                    let _ = ctx.respond(400, "`client_port' not found");
                    return None;
                };
                match udp::transport_to(self.peer_addr.ip(), ports.rtp_port) {
                    Ok(transport) => {
                        ctx.header(
                            "Transport",
                            format!(
                                "RTP/AVP/UDP;unicast;client_port={}-{}",
                                ports.rtp_port, ports.rtcp_port
                            ),
                        );
                        Some(transport)
                    }
                    Err(e) => {
                        tracing::warn!(peer = %self.peer_addr, error = %e, "UDP setup failed");
                        let _ = ctx.respond_internal_error();
                        None
                    }
                }
            }
        }
    }

    fn start(&self, stream: PendingStream) {
        let media = self.media.clone();
        let stop = self.stop.clone();
        let peer = self.peer_addr;

        thread::spawn(move || {
            let result = match stream.kind {
                StreamKind::Audio => stream_audio(stream.rtp, &media, &stop),
                StreamKind::Video => stream_video(stream.rtp, &media, &stop),
            };
            match result {
                Ok(()) => tracing::info!(%peer, kind = ?stream.kind, "stream finished"),
                Err(e) => tracing::warn!(%peer, kind = ?stream.kind, error = %e, "stream aborted"),
            }
        });
    }
}

/// `Session` header value. Parameters such as `;timeout=60` are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SessionId(u64);

impl FromStr for SessionId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let id = s.split_once(';').map_or(s, |(id, _)| id);
        id.trim().parse().map(Self)
    }
}

fn session_id(req: &Request) -> Option<std::result::Result<u64, ParseIntError>> {
    req.header_map
        .get_parsed::<SessionId>("Session")
        .map(|id| id.map(|SessionId(id)| id))
}

/// Send the whole audio file, one packet per packet interval.
fn stream_audio(rtp: RtpTransport, media: &Media, stop: &AtomicBool) -> Result<()> {
    let samples = media.audio.as_deref().unwrap_or_default();
    let spp = media.samples_per_packet;
    let interval = Duration::from_micros(spp.get() as u64 * 1_000_000 / u64::from(PCMU_CLOCK_RATE));
    let mut audio = AudioStream::new(rtp, spp);

    for packet in samples.chunks(spp.get()) {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        audio.send_samples(packet)?;
        thread::sleep(interval);
    }
    Ok(())
}

/// Send the whole video file, one picture per frame interval.
fn stream_video(rtp: RtpTransport, media: &Media, stop: &AtomicBool) -> Result<()> {
    let data = media.video.as_deref().unwrap_or_default();
    let interval = Duration::from_secs(1) / media.fps.get();
    let mut video = VideoStream::new(NalTransport::new(rtp), media.fps);

    for (i, unit) in split_nal_units(data).enumerate() {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        if unit.header().is_aud() && i > 0 {
            thread::sleep(interval);
        }
        video.send_unit(&unit)?;
    }
    Ok(())
}

impl Controller for Client {
    fn options(&mut self, ctx: &mut Context, _req: &Request) {
        ctx.header("Public", "DESCRIBE, SETUP, TEARDOWN, PLAY");
        let _ = ctx.respond_ok();
    }

    fn describe(&mut self, ctx: &mut Context, _req: &Request) {
        ctx.header("Content-Type", "application/sdp")
            .body(self.sdp.as_bytes());
        let _ = ctx.respond_ok();
    }

    fn setup(&mut self, ctx: &mut Context, req: &Request) {
        let kind = StreamKind::from_uri(req.uri.as_str());
        let available = match kind {
            StreamKind::Audio => self.media.audio.is_some(),
            StreamKind::Video => self.media.video.is_some(),
        };
        if !available {
            let _ = ctx.respond(404, "Stream Not Found");
            return;
        }

        // Aggregate control: a second SETUP joins the existing session.
        let session_id = match session_id(req) {
            Some(Ok(id)) => id,
            Some(Err(_)) => {
                let _ = ctx.respond(400, "Malformed `Session'");
                return;
            }
            None => self.rng.random(),
        };

        let Some(transport) = self.transport(ctx, req) else {
            return;
        };

        let rtp = match kind {
            StreamKind::Audio => {
                RtpTransport::new(transport, PCMU_PAYLOAD_TYPE, PCMU_CLOCK_RATE, &mut self.rng)
            }
            StreamKind::Video => {
                RtpTransport::new(transport, H264_PAYLOAD_TYPE, H264_CLOCK_RATE, &mut self.rng)
            }
        };
        self.streams[kind.index()] = Some(PendingStream {
            kind,
            session_id,
            rtp,
        });

        ctx.header("Session", session_id);
        let _ = ctx.respond_ok();
    }

    fn play(&mut self, ctx: &mut Context, req: &Request) {
        let Some(Ok(session_id)) = session_id(req) else {
            let _ = ctx.respond(400, "Malformed `Session'");
            return;
        };

        let ready: Vec<PendingStream> = self
            .streams
            .iter_mut()
            .filter(|s| s.as_ref().is_some_and(|s| s.session_id == session_id))
            .filter_map(Option::take)
            .collect();

        if ready.is_empty() {
            let _ = ctx.respond(454, "Invalid Session ID");
            return;
        }

        ctx.header("Range", "npt=now-");
        // Media must not reach an interleaved client before the 200.
        if ctx.respond_ok().is_ok() {
            for stream in ready {
                self.start(stream);
            }
        }
    }

    fn teardown(&mut self, ctx: &mut Context, _req: &Request) {
        self.stop.store(true, Ordering::Relaxed);
        self.stop = Arc::new(AtomicBool::new(false));
        self.streams = [None, None];
        let _ = ctx.respond_ok();
    }

    fn unknown(&mut self, ctx: &mut Context, _req: &Request) {
        let _ = ctx.respond(405, "Unknown method");
    }

    fn before(&mut self, _ctx: &mut Context, req: &Request) {
        tracing::info!(method = %req.method, uri = %req.uri, cseq = req.cseq, "request");
    }

    fn after(&mut self, outcome: &Result<usize>, _ctx: &Context, req: &Request) {
        if let Err(e) = outcome {
            tracing::error!(method = %req.method, error = %e, "failed to respond");
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
