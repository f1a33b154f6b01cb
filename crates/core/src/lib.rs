pub mod error;
pub mod media;
pub mod protocol;
pub mod server;
pub mod transport;

pub use error::{ParseError, ParseType, Result, RtspError};
pub use media::{AudioStream, NalTransport, RtpTimestamp, RtpTransport, VideoStream};
pub use protocol::{Request, RequestParser};
pub use server::{Server, ServerConfig};
pub use transport::{ConnectionWriter, Transport};

#[cfg(test)]
pub(crate) mod testing {
    use std::io::{self, Write};
    use std::sync::Arc;

    use parking_lot::Mutex;

    /// In-memory connection that keeps everything written to it.
    #[derive(Clone, Default)]
    pub struct CaptureSink(Arc<Mutex<Vec<u8>>>);

    impl CaptureSink {
        pub fn contents(&self) -> Vec<u8> {
            self.0.lock().clone()
        }
    }

    impl Write for CaptureSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Split a capture of interleaved frames into `(channel, payload)` pairs.
    pub fn frames(mut bytes: &[u8]) -> Vec<(u8, Vec<u8>)> {
        let mut out = Vec::new();
        while let Some((channel, len)) = crate::transport::tcp::parse_frame_header(bytes) {
            out.push((channel, bytes[4..4 + len].to_vec()));
            bytes = &bytes[4 + len..];
        }
        out
    }
}
