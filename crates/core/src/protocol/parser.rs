use crate::error::{ParseError, ParseType};
use crate::protocol::deserialize::{self, Deserialize, Progress};
use crate::protocol::request::Request;

/// Size bounds enforced while parsing, so a peer cannot make the parser
/// wait forever on a token that never ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserLimits {
    pub max_method_len: usize,
    pub max_uri_len: usize,
    pub max_header_line_len: usize,
    pub max_body_len: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_method_len: 32,
            max_uri_len: 512,
            max_header_line_len: 1024,
            max_body_len: 64 * 1024,
        }
    }
}

/// Parser stage. Each non-terminal stage names what has been parsed so
/// far; the next deserializer fills the following field of [`Request`].
///
/// ```text
/// NothingParsed -> MethodParsed -> RequestUriParsed -> RtspVersionParsed
///     -> (one header line per step) -> HeaderMapParsed -> (body) -> Ok
/// ```
///
/// `Ok` and `Err` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    NothingParsed,
    MethodParsed,
    RequestUriParsed,
    RtspVersionParsed,
    HeaderMapParsed,
    Ok,
    Err,
}

impl ParseState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ok | Self::Err)
    }
}

/// Bytes consumed so far and whether the request is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseStatus {
    pub offset: usize,
    pub is_complete: bool,
}

impl ParseStatus {
    pub fn partial(offset: usize) -> Self {
        Self {
            offset,
            is_complete: false,
        }
    }

    pub fn complete(offset: usize) -> Self {
        Self {
            offset,
            is_complete: true,
        }
    }
}

pub type ParseResult = Result<ParseStatus, ParseError>;

/// Resumable RTSP request parser.
///
/// Feed it the bytes received so far for the current request, from the
/// first byte of the request on every call. The parser remembers only an
/// integer cursor, never the buffer itself, so the caller may grow or
/// reallocate the buffer between calls. Splitting the input differently
/// never changes the parsed [`Request`].
///
/// ```
/// use rtsp::protocol::{Method, Request, RequestParser};
///
/// let mut parser = RequestParser::new();
/// let mut request = Request::new();
/// let mut buf = b"OPTIONS rtsp://x RTSP/1.0\r\nCSe".to_vec();
///
/// let status = parser.parse(&mut request, &buf).unwrap();
/// assert!(!status.is_complete);
///
/// buf.extend_from_slice(b"q: 1\r\n\r\n");
/// let status = parser.parse(&mut request, &buf).unwrap();
/// assert!(status.is_complete);
/// assert_eq!(status.offset, buf.len());
/// assert_eq!(request.method, Method::Options);
/// assert_eq!(request.cseq, 1);
/// ```
#[derive(Debug, Clone)]
pub struct RequestParser {
    stage: Stage,
    cursor: usize,
    body_len: usize,
    limits: ParserLimits,
}

/// [`ParseState`] with the error carried by the failed stage, so the
/// sticky `Err` result always has one to return.
#[derive(Debug, Clone)]
enum Stage {
    NothingParsed,
    MethodParsed,
    RequestUriParsed,
    RtspVersionParsed,
    HeaderMapParsed,
    Ok,
    Err(ParseError),
}

impl RequestParser {
    pub fn new() -> Self {
        Self::with_limits(ParserLimits::default())
    }

    pub fn with_limits(limits: ParserLimits) -> Self {
        Self {
            stage: Stage::NothingParsed,
            cursor: 0,
            body_len: 0,
            limits,
        }
    }

    pub fn state(&self) -> ParseState {
        match self.stage {
            Stage::NothingParsed => ParseState::NothingParsed,
            Stage::MethodParsed => ParseState::MethodParsed,
            Stage::RequestUriParsed => ParseState::RequestUriParsed,
            Stage::RtspVersionParsed => ParseState::RtspVersionParsed,
            Stage::HeaderMapParsed => ParseState::HeaderMapParsed,
            Stage::Ok => ParseState::Ok,
            Stage::Err(_) => ParseState::Err,
        }
    }

    /// Bytes of the current request consumed so far.
    pub fn offset(&self) -> usize {
        self.cursor
    }

    pub fn limits(&self) -> &ParserLimits {
        &self.limits
    }

    /// Forget the current request and start over at `NothingParsed`.
    pub fn reset(&mut self) {
        self.stage = Stage::NothingParsed;
        self.cursor = 0;
        self.body_len = 0;
    }

    /// Advance as far as `input` allows.
    ///
    /// Returns `Ok` with `is_complete == false` when more bytes are needed,
    /// `Ok` with `is_complete == true` once the whole request (including
    /// its body) is parsed, or the error that stopped parsing. Once
    /// complete or failed, every further call returns the same result
    /// without looking at `input`.
    pub fn parse(&mut self, request: &mut Request, input: &[u8]) -> ParseResult {
        loop {
            let window = input.get(self.cursor..).unwrap_or_default();

            let step = match self.stage {
                Stage::Ok => return Ok(ParseStatus::complete(self.cursor)),
                Stage::Err(ref e) => return Err(e.clone()),
                Stage::NothingParsed => {
                    if self.cursor == 0 {
                        request.clear();
                    }
                    request.method.deserialize(window, &self.limits)
                }
                Stage::MethodParsed => request.uri.deserialize(window, &self.limits),
                Stage::RequestUriParsed => request.version.deserialize(window, &self.limits),
                Stage::RtspVersionParsed => {
                    match request.header_map.deserialize(window, &self.limits) {
                        Ok(Progress::Complete(n)) => {
                            self.end_of_headers(request).map(|()| Progress::Complete(n))
                        }
                        other => other,
                    }
                }
                Stage::HeaderMapParsed => Ok(self.body(request, window)),
            };

            match step {
                Ok(Progress::NeedMore) => return Ok(ParseStatus::partial(self.cursor)),
                Ok(Progress::Partial(n)) => self.cursor += n,
                Ok(Progress::Complete(n)) => {
                    self.cursor += n;
                    self.advance();
                    tracing::trace!(state = ?self.state(), offset = self.cursor, "parser advanced");
                    if let Stage::Ok = self.stage {
                        tracing::debug!(
                            method = %request.method,
                            uri = %request.uri,
                            cseq = request.cseq,
                            "request parsed"
                        );
                    }
                }
                Err(e) => {
                    tracing::debug!(state = ?self.state(), offset = self.cursor, error = %e, "parse failed");
                    self.stage = Stage::Err(e.clone());
                    return Err(e);
                }
            }
        }
    }

    fn advance(&mut self) {
        self.stage = match self.stage {
            Stage::NothingParsed => Stage::MethodParsed,
            Stage::MethodParsed => Stage::RequestUriParsed,
            Stage::RequestUriParsed => Stage::RtspVersionParsed,
            Stage::RtspVersionParsed => Stage::HeaderMapParsed,
            Stage::HeaderMapParsed | Stage::Ok => Stage::Ok,
            Stage::Err(_) => return,
        };
    }

    /// Pull `CSeq` and `Content-Length` out of the finished header block.
    fn end_of_headers(&mut self, request: &mut Request) -> Result<(), ParseError> {
        let cseq = request.header_map.get("CSeq").ok_or(ParseError::MissingCSeq)?;
        request.cseq = cseq
            .parse()
            .map_err(|_| ParseError::type_mismatch(ParseType::Int, cseq.as_bytes()))?;

        self.body_len = match request.header_map.get("Content-Length") {
            Some(value) => deserialize::content_length(value, &self.limits)?,
            None => 0,
        };
        Ok(())
    }

    fn body(&self, request: &mut Request, window: &[u8]) -> Progress {
        if window.len() < self.body_len {
            return Progress::NeedMore;
        }
        request.body.clear();
        request.body.extend_from_slice(&window[..self.body_len]);
        Progress::Complete(self.body_len)
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::request::{Method, Version};

    const SETUP: &[u8] = b"SETUP rtsp://x/audio RTSP/1.0\r\nCSeq: 1\r\nTransport: RTP/AVP/TCP;unicast;interleaved=0-1\r\n\r\n";

    fn parse_all(input: &[u8]) -> (RequestParser, Request, ParseResult) {
        let mut parser = RequestParser::new();
        let mut request = Request::new();
        let result = parser.parse(&mut request, input);
        (parser, request, result)
    }

    fn assert_setup(request: &Request) {
        assert_eq!(request.method, Method::Setup);
        assert_eq!(request.uri.as_str(), "rtsp://x/audio");
        assert_eq!(request.version, Version::Rtsp10);
        assert_eq!(request.header("CSeq"), Some("1"));
        assert_eq!(
            request.header("Transport"),
            Some("RTP/AVP/TCP;unicast;interleaved=0-1")
        );
        assert_eq!(request.cseq, 1);
    }

    #[test]
    fn whole_request_in_one_call() {
        let (parser, request, result) = parse_all(SETUP);
        assert_eq!(result, Ok(ParseStatus::complete(SETUP.len())));
        assert_eq!(parser.state(), ParseState::Ok);
        assert_setup(&request);
    }

    #[test]
    fn split_mid_header() {
        let split = SETUP.len() - 20;
        let mut parser = RequestParser::new();
        let mut request = Request::new();

        let first = parser.parse(&mut request, &SETUP[..split]).unwrap();
        assert!(!first.is_complete);
        assert_eq!(parser.state(), ParseState::RtspVersionParsed);

        let second = parser.parse(&mut request, SETUP).unwrap();
        assert_eq!(second, ParseStatus::complete(SETUP.len()));
        assert_setup(&request);
    }

    #[test]
    fn every_two_way_split() {
        for split in 0..=SETUP.len() {
            let mut parser = RequestParser::new();
            let mut request = Request::new();
            let first = parser.parse(&mut request, &SETUP[..split]).unwrap();
            let second = parser.parse(&mut request, SETUP).unwrap();
            assert!(first.offset <= second.offset, "split at {split}");
            assert!(second.is_complete, "split at {split}");
            assert_setup(&request);
        }
    }

    #[test]
    fn byte_at_a_time() {
        let mut parser = RequestParser::new();
        let mut request = Request::new();
        let mut last_offset = 0;
        for end in 0..SETUP.len() {
            let status = parser.parse(&mut request, &SETUP[..end]).unwrap();
            assert!(!status.is_complete);
            assert!(status.offset >= last_offset);
            last_offset = status.offset;
        }
        assert!(parser.parse(&mut request, SETUP).unwrap().is_complete);
        assert_setup(&request);
    }

    #[test]
    fn ok_is_sticky() {
        let (mut parser, mut request, result) = parse_all(SETUP);
        let done = result.unwrap();
        assert_eq!(parser.parse(&mut request, b""), Ok(done));
        assert_eq!(parser.parse(&mut request, b"garbage"), Ok(done));
        assert_setup(&request);
    }

    #[test]
    fn malformed_method_is_sticky_and_consumes_nothing() {
        let input = b"SET_UP rtsp://x RTSP/1.0\r\nCSeq: 1\r\n\r\n";
        let (mut parser, mut request, result) = parse_all(input);
        let expected = ParseError::TypeMismatch {
            kind: ParseType::Ident,
            actual: "SET_UP".into(),
        };
        assert_eq!(result, Err(expected.clone()));
        assert_eq!(parser.state(), ParseState::Err);
        assert_eq!(parser.offset(), 0);
        assert_eq!(parser.parse(&mut request, b""), Err(expected.clone()));
        assert_eq!(parser.parse(&mut request, SETUP), Err(expected));
    }

    #[test]
    fn header_overflow() {
        let mut input = b"OPTIONS * RTSP/1.0\r\nCSeq: 1\r\n".to_vec();
        for i in 0..4 {
            input.extend_from_slice(format!("X-H{i}: v\r\n").as_bytes());
        }
        input.extend_from_slice(b"\r\n");

        let mut parser = RequestParser::new();
        let mut request = Request::with_header_capacity(3);
        assert_eq!(
            parser.parse(&mut request, &input),
            Err(ParseError::HeaderMapOverflow)
        );
        assert_eq!(request.header_map.len(), 3);
        assert!(request.header("X-H2").is_none());
    }

    #[test]
    fn version_mismatch() {
        let (_, _, result) = parse_all(b"OPTIONS * HTTP/1.1\r\n");
        assert!(matches!(result, Err(ParseError::StrMismatch { .. })));
    }

    #[test]
    fn missing_cseq() {
        let (_, _, result) = parse_all(b"OPTIONS * RTSP/1.0\r\nAccept: x\r\n\r\n");
        assert_eq!(result, Err(ParseError::MissingCSeq));
    }

    #[test]
    fn non_numeric_cseq() {
        let (_, _, result) = parse_all(b"OPTIONS * RTSP/1.0\r\nCSeq: one\r\n\r\n");
        assert_eq!(
            result,
            Err(ParseError::TypeMismatch {
                kind: ParseType::Int,
                actual: "one".into()
            })
        );
    }

    #[test]
    fn body_waits_for_content_length() {
        let input = b"ANNOUNCE rtsp://x RTSP/1.0\r\nCSeq: 2\r\nContent-Length: 5\r\n\r\nv=0\r\n";
        let mut parser = RequestParser::new();
        let mut request = Request::new();

        let partial = parser.parse(&mut request, &input[..input.len() - 2]).unwrap();
        assert_eq!(parser.state(), ParseState::HeaderMapParsed);
        assert!(!partial.is_complete);
        assert!(request.body.is_empty());

        let done = parser.parse(&mut request, input).unwrap();
        assert_eq!(done, ParseStatus::complete(input.len()));
        assert_eq!(request.body, b"v=0\r\n");
    }

    #[test]
    fn pipelined_requests_leave_trailing_bytes() {
        let mut input = SETUP.to_vec();
        input.extend_from_slice(b"PLAY rtsp://x RTSP/1.0\r\n");
        let (_, request, result) = parse_all(&input);
        assert_eq!(result, Ok(ParseStatus::complete(SETUP.len())));
        assert_setup(&request);
    }

    #[test]
    fn invalid_content_length() {
        let (_, _, result) =
            parse_all(b"ANNOUNCE rtsp://x RTSP/1.0\r\nCSeq: 2\r\nContent-Length: lots\r\n\r\n");
        assert_eq!(result, Err(ParseError::ContentLength("lots".into())));
    }

    #[test]
    fn reset_reuses_storage() {
        let (mut parser, mut request, _) = parse_all(SETUP);
        parser.reset();
        let options = b"OPTIONS rtsp://x RTSP/1.0\r\nCSeq: 9\r\n\r\n";
        assert!(parser.parse(&mut request, options).unwrap().is_complete);
        assert_eq!(request.method, Method::Options);
        assert_eq!(request.cseq, 9);
        assert!(request.header("Transport").is_none());
    }

    #[test]
    fn uri_limit() {
        let mut parser = RequestParser::with_limits(ParserLimits {
            max_uri_len: 8,
            ..ParserLimits::default()
        });
        let mut request = Request::new();
        assert_eq!(
            parser.parse(&mut request, b"PLAY rtsp://very/long/uri"),
            Err(ParseError::TokenTooLong {
                kind: ParseType::RequestUri,
                limit: 8
            })
        );
    }

    fn too_long(kind: ParseType, limit: usize) -> ParseResult {
        Err(ParseError::TokenTooLong { kind, limit })
    }

    #[test]
    fn endless_keepalive_newlines() {
        let input = vec![b'\n'; 4096];
        let (parser, _, result) = parse_all(&input);
        assert_eq!(result, too_long(ParseType::Ident, 32));
        assert_eq!(parser.state(), ParseState::Err);
    }

    #[test]
    fn endless_spaces_before_uri() {
        let mut input = b"OPTIONS".to_vec();
        input.resize(4096, b' ');
        let (_, _, result) = parse_all(&input);
        assert_eq!(result, too_long(ParseType::RequestUri, 512));
    }

    #[test]
    fn endless_spaces_before_version() {
        let mut input = b"OPTIONS rtsp://x".to_vec();
        input.resize(4096, b' ');
        let (_, _, result) = parse_all(&input);
        assert_eq!(result, too_long(ParseType::Text, 32));
    }

    #[test]
    fn version_line_too_long() {
        let long = format!("OPTIONS * RTSP/1.0{}", "x".repeat(40));
        let (_, _, result) = parse_all(long.as_bytes());
        assert_eq!(result, too_long(ParseType::Text, 32));

        let (_, _, result) = parse_all(format!("{long}\r\nCSeq: 1\r\n\r\n").as_bytes());
        assert_eq!(result, too_long(ParseType::Text, 32));
    }

    #[test]
    fn header_line_too_long() {
        let limits = ParserLimits {
            max_header_line_len: 16,
            ..ParserLimits::default()
        };
        let unterminated = b"OPTIONS * RTSP/1.0\r\nCSeq: 1\r\nX-Long: aaaaaaaaaaaaaaaa";
        let mut parser = RequestParser::with_limits(limits.clone());
        let mut request = Request::new();
        assert_eq!(
            parser.parse(&mut request, unterminated),
            too_long(ParseType::Text, 16)
        );

        let terminated = b"OPTIONS * RTSP/1.0\r\nCSeq: 1\r\nX-Long: aaaaaaaaaaaaaaaa\r\n\r\n";
        let mut parser = RequestParser::with_limits(limits);
        assert_eq!(
            parser.parse(&mut request, terminated),
            too_long(ParseType::Text, 16)
        );
        assert_eq!(request.header("CSeq"), Some("1"));
    }

    #[test]
    fn header_value_not_utf8() {
        let (mut parser, mut request, result) =
            parse_all(b"OPTIONS * RTSP/1.0\r\nCSeq: 1\r\nX: \xff\r\n\r\n");
        let expected = ParseError::TypeMismatch {
            kind: ParseType::Text,
            actual: "\u{FFFD}".into(),
        };
        assert_eq!(result, Err(expected.clone()));
        assert_eq!(parser.parse(&mut request, b""), Err(expected));
    }

    #[test]
    fn reset_clears_failure() {
        let (mut parser, mut request, result) = parse_all(b"SET_UP * RTSP/1.0\r\n");
        assert!(result.is_err());
        parser.reset();
        assert_eq!(parser.state(), ParseState::NothingParsed);
        assert!(parser.parse(&mut request, SETUP).unwrap().is_complete);
        assert_setup(&request);
    }
}
