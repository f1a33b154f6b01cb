use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{ParseError, ParseType, Result, RtspError};
use crate::protocol::controller::{self, Context, Controller};
use crate::protocol::{Request, RequestParser, Response};
use crate::server::{ControllerFactory, ServerConfig};

/// First byte of every interleaved frame (RFC 2326 §10.12).
pub const INTERLEAVED_MARKER: u8 = b'$';

/// Marker, channel id and 16-bit length.
pub const FRAME_HEADER_LEN: usize = 4;

const READ_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Build the 4-byte header of an interleaved frame carrying `len` bytes.
///
/// ```text
/// +------+---------+----------------+
/// | '$'  | channel | length (BE16)  |
/// +------+---------+----------------+
/// ```
pub fn frame_header(channel: u8, len: usize) -> Result<[u8; FRAME_HEADER_LEN]> {
    let len16 = u16::try_from(len).map_err(|_| RtspError::FrameTooLarge { len })?;
    let [hi, lo] = len16.to_be_bytes();
    Ok([INTERLEAVED_MARKER, channel, hi, lo])
}

/// Read an interleaved frame header at the start of `buf`.
///
/// Returns `(channel, payload_len)`, or `None` if `buf` does not start
/// with a complete frame header.
pub fn parse_frame_header(buf: &[u8]) -> Option<(u8, usize)> {
    match buf {
        [INTERLEAVED_MARKER, channel, hi, lo, ..] => {
            Some((*channel, u16::from_be_bytes([*hi, *lo]) as usize))
        }
        _ => None,
    }
}

/// Write half of an RTSP connection, shared by the response path and
/// every interleaved stream on that connection.
///
/// Each call writes one whole message under the lock, so frames from
/// different streams never interleave mid-frame.
#[derive(Clone)]
pub struct ConnectionWriter {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl ConnectionWriter {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Write raw bytes (an RTSP response) and flush.
    pub fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        let mut w = self.inner.lock();
        w.write_all(bytes)?;
        w.flush()
    }

    /// Frame `payload` for `channel` and write it as one unit.
    ///
    /// Returns the number of bytes written, frame header included.
    pub fn send_interleaved(&self, channel: u8, payload: &[u8]) -> Result<usize> {
        let header = frame_header(channel, payload.len())?;
        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        frame.extend_from_slice(&header);
        frame.extend_from_slice(payload);

        self.write_all(&frame)?;
        tracing::trace!(channel, len = payload.len(), "interleaved frame sent");
        Ok(frame.len())
    }
}

impl fmt::Debug for ConnectionWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionWriter").finish_non_exhaustive()
    }
}

/// Non-blocking TCP accept loop.
///
/// Checks the `running` flag between accepts with a 50ms poll interval
/// so that [`crate::server::Server::stop`] can terminate it promptly.
pub fn accept_loop(
    listener: TcpListener,
    factory: Arc<ControllerFactory>,
    config: Arc<ServerConfig>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                let f = factory.clone();
                let c = config.clone();
                let r = running.clone();
                thread::spawn(move || {
                    Connection::handle(stream, f, c, r);
                });
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            }
        }
    }
    tracing::debug!("accept loop exited");
}

/// A single RTSP client connection with its own lifecycle.
struct Connection {
    reader: TcpStream,
    writer: ConnectionWriter,
    controller: Box<dyn Controller>,
    parser: RequestParser,
    request: Request,
    buf: Vec<u8>,
    peer_addr: SocketAddr,
    config: Arc<ServerConfig>,
}

impl Connection {
    /// Entry point: set up a connection and run its request loop.
    fn handle(
        stream: TcpStream,
        factory: Arc<ControllerFactory>,
        config: Arc<ServerConfig>,
        running: Arc<AtomicBool>,
    ) {
        let peer_addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(_) => return,
        };

        tracing::info!(%peer_addr, "client connected");

        let writer_stream = match stream.try_clone() {
            Ok(s) => s,
            Err(_) => return,
        };
        if stream.set_read_timeout(Some(READ_POLL_INTERVAL)).is_err() {
            return;
        }

        let mut conn = Connection {
            reader: stream,
            writer: ConnectionWriter::new(writer_stream),
            controller: (*factory)(peer_addr),
            parser: RequestParser::with_limits(config.limits.clone()),
            request: Request::with_header_capacity(config.header_capacity),
            buf: Vec::new(),
            peer_addr,
            config,
        };

        let reason = conn.run(&running);
        // Media streams may still hold the writer; closing the socket stops them.
        let _ = conn.reader.shutdown(Shutdown::Both);
        tracing::info!(%peer_addr, reason, "client disconnected");
    }

    /// Read/parse/dispatch loop. Returns the reason for exiting.
    fn run(&mut self, running: &AtomicBool) -> &'static str {
        let mut chunk = vec![0u8; self.config.read_buffer_size.max(1)];

        while running.load(Ordering::SeqCst) {
            match self.reader.read(&mut chunk) {
                Ok(0) => return "connection closed by client",
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(ref e)
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    continue;
                }
                Err(_) => return "read error",
            }

            if let Err(reason) = self.process_buffer() {
                return reason;
            }
        }

        "server shutting down"
    }

    /// Handle every complete message currently buffered.
    fn process_buffer(&mut self) -> std::result::Result<(), &'static str> {
        loop {
            if self.parser.offset() == 0 && self.buf.first() == Some(&INTERLEAVED_MARKER) {
                // Client-to-server interleaved data (RTCP receiver reports) is not processed.
                let Some((channel, len)) = parse_frame_header(&self.buf) else {
                    return Ok(());
                };
                if self.buf.len() < FRAME_HEADER_LEN + len {
                    return Ok(());
                }
                tracing::trace!(peer = %self.peer_addr, channel, len, "skipping interleaved frame");
                self.buf.drain(..FRAME_HEADER_LEN + len);
                continue;
            }

            match self.parser.parse(&mut self.request, &self.buf) {
                Ok(status) if status.is_complete => {
                    let mut ctx = Context::new(self.peer_addr, self.writer.clone(), self.request.cseq);
                    let outcome = controller::dispatch(&mut *self.controller, &mut ctx, &self.request);
                    self.buf.drain(..status.offset);
                    self.parser.reset();
                    if outcome.is_err() {
                        return Err("write error");
                    }
                }
                Ok(_) => return Ok(()),
                Err(e) => {
                    tracing::warn!(peer = %self.peer_addr, error = %e, "parse error");
                    self.reject(&e);
                    return Err("malformed request");
                }
            }
        }
    }

    /// Answer a request that failed to parse. The byte stream cannot be
    /// resynchronized afterwards, so the caller closes the connection.
    fn reject(&self, error: &ParseError) {
        let response = match error {
            ParseError::TokenTooLong {
                kind: ParseType::RequestUri,
                ..
            } => Response::new(414, "Request-URI Too Large"),
            e if e.is_capacity() => Response::new(413, "Request Entity Too Large"),
            _ => Response::bad_request(),
        };
        let response = match self.request.header("CSeq") {
            Some(cseq) => response.add_header("CSeq", cseq),
            None => response,
        };
        let _ = self.writer.write_all(&response.serialize());
    }
}
