use std::fmt::Display;
use std::io;
use std::net::SocketAddr;

use crate::error::{Result, RtspError};
use crate::protocol::request::{Method, Request};
use crate::protocol::response::Response;
use crate::transport::ConnectionWriter;

/// Per-connection request handler.
///
/// One value is created per RTSP connection by the server's factory and
/// receives every request parsed on that connection. Each method handler
/// answers through the [`Context`]; a handler that returns without
/// responding gets a `500` on its behalf.
///
/// Methods without a dedicated hook (PAUSE, GET_PARAMETER, extensions,
/// ...) go to [`unknown`](Self::unknown).
pub trait Controller: Send {
    fn options(&mut self, ctx: &mut Context, req: &Request);
    fn describe(&mut self, ctx: &mut Context, req: &Request);
    fn setup(&mut self, ctx: &mut Context, req: &Request);
    fn play(&mut self, ctx: &mut Context, req: &Request);
    fn teardown(&mut self, ctx: &mut Context, req: &Request);

    fn unknown(&mut self, ctx: &mut Context, req: &Request) {
        tracing::warn!(method = %req.method, cseq = req.cseq, "unsupported RTSP method");
        let _ = ctx.respond(501, "Not Implemented");
    }

    /// Called before the method handler.
    fn before(&mut self, _ctx: &mut Context, _req: &Request) {}

    /// Called after the method handler with the outcome of writing the response.
    fn after(&mut self, _outcome: &Result<usize>, _ctx: &Context, _req: &Request) {}
}

/// Response under construction for one request, plus what a handler needs
/// to set up media for the connection.
pub struct Context {
    peer_addr: SocketAddr,
    writer: ConnectionWriter,
    cseq: u32,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    outcome: Option<std::result::Result<usize, io::ErrorKind>>,
}

impl Context {
    pub fn new(peer_addr: SocketAddr, writer: ConnectionWriter, cseq: u32) -> Self {
        Self {
            peer_addr,
            writer,
            cseq,
            headers: Vec::new(),
            body: None,
            outcome: None,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// The connection's writer, shared with interleaved media streams.
    pub fn writer(&self) -> &ConnectionWriter {
        &self.writer
    }

    pub fn cseq(&self) -> u32 {
        self.cseq
    }

    /// Stage a header for the next response.
    pub fn header(&mut self, name: &str, value: impl Display) -> &mut Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Stage a body for the next response.
    pub fn body(&mut self, body: impl Into<Vec<u8>>) -> &mut Self {
        self.body = Some(body.into());
        self
    }

    pub fn has_responded(&self) -> bool {
        self.outcome.is_some()
    }

    /// Write the response with the staged headers and body.
    ///
    /// `CSeq` is echoed automatically (RFC 2326 §12.17).
    pub fn respond(&mut self, status_code: u16, reason: &str) -> Result<usize> {
        let mut response = Response::new(status_code, reason).add_header("CSeq", &self.cseq.to_string());
        response.headers.append(&mut self.headers);
        response.body = self.body.take();

        let bytes = response.serialize();
        let result = self.writer.write_all(&bytes).map(|()| bytes.len());
        self.outcome = Some(result.as_ref().copied().map_err(io::Error::kind));

        tracing::debug!(peer = %self.peer_addr, status = status_code, cseq = self.cseq, "response");
        result.map_err(RtspError::from)
    }

    pub fn respond_ok(&mut self) -> Result<usize> {
        self.respond(200, "OK")
    }

    pub fn respond_internal_error(&mut self) -> Result<usize> {
        self.respond(500, "Internal Server Error")
    }

    fn take_outcome(&mut self) -> Result<usize> {
        match self.outcome.take() {
            Some(Ok(n)) => Ok(n),
            Some(Err(kind)) => Err(RtspError::Io(kind.into())),
            None => Ok(0),
        }
    }
}

/// Route a parsed request to its handler, surrounded by the
/// [`before`](Controller::before) and [`after`](Controller::after) hooks.
///
/// Returns the outcome of writing the response.
pub fn dispatch(controller: &mut dyn Controller, ctx: &mut Context, req: &Request) -> Result<usize> {
    tracing::debug!(
        peer = %ctx.peer_addr,
        method = %req.method,
        uri = %req.uri,
        cseq = req.cseq,
        "request"
    );

    controller.before(ctx, req);

    match req.method {
        Method::Options => controller.options(ctx, req),
        Method::Describe => controller.describe(ctx, req),
        Method::Setup => controller.setup(ctx, req),
        Method::Play => controller.play(ctx, req),
        Method::Teardown => controller.teardown(ctx, req),
        _ => controller.unknown(ctx, req),
    }

    if !ctx.has_responded() {
        tracing::warn!(method = %req.method, cseq = req.cseq, "controller did not respond");
        let _ = ctx.respond_internal_error();
    }

    let outcome = ctx.take_outcome();
    controller.after(&outcome, ctx, req);
    outcome
}
