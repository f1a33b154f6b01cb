mod client;
mod sdp;

use std::io;
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rtsp::Server;

use client::{Client, Media};

#[derive(Parser)]
#[command(
    name = "rtsp-server",
    about = "Demo RTSP server streaming G.711 audio and H.264 video files"
)]
struct Args {
    /// Bind address (host:port)
    #[arg(long, short, default_value = "0.0.0.0:8554")]
    bind: String,

    /// G.711 µ-law file, 8 kHz mono
    #[arg(long)]
    audio: Option<PathBuf>,

    /// H.264 Annex B file with access unit delimiters
    #[arg(long)]
    video: Option<PathBuf>,

    /// Video frame rate
    #[arg(long, default_value = "25")]
    fps: NonZeroU32,

    /// Audio samples per RTP packet
    #[arg(long, default_value = "160")]
    samples_per_packet: NonZeroUsize,
}

fn load(path: Option<&PathBuf>) -> io::Result<Option<Vec<u8>>> {
    path.map(std::fs::read).transpose()
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let media = match (load(args.audio.as_ref()), load(args.video.as_ref())) {
        (Ok(audio), Ok(video)) => Media {
            audio,
            video,
            fps: args.fps,
            samples_per_packet: args.samples_per_packet,
        },
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Failed to read media: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if media.audio.is_none() && media.video.is_none() {
        eprintln!("Nothing to serve: pass --audio and/or --video");
        return ExitCode::FAILURE;
    }

    let sdp: Arc<str> = Arc::from(sdp::describe(&media, rand::rng().random()));
    let media = Arc::new(media);

    let mut server = Server::new(&args.bind);
    let started = server.start(move |peer| {
        Box::new(Client::new(
            peer,
            media.clone(),
            sdp.clone(),
            StdRng::from_os_rng(),
        ))
    });
    if let Err(e) = started {
        eprintln!("Failed to start server: {}", e);
        return ExitCode::FAILURE;
    }

    println!("RTSP server on {}, press Enter to stop", args.bind);
    let mut input = String::new();
    let _ = io::stdin().read_line(&mut input);

    server.stop();
    ExitCode::SUCCESS
}
