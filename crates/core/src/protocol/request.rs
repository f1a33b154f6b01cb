use std::fmt;

use crate::error::{ParseError, ParseType};
use crate::protocol::header_map::HeaderMap;

/// RTSP request method (RFC 2326 §10).
///
/// Methods outside the registered set are kept as [`Extension`](Self::Extension)
/// so a controller can still answer them (usually with 501).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Options,
    Describe,
    Announce,
    Setup,
    Play,
    Pause,
    Record,
    Teardown,
    GetParameter,
    SetParameter,
    Redirect,
    Extension(String),
}

impl Method {
    /// Classify a method token.
    ///
    /// Registered methods are matched exactly (they are case-sensitive,
    /// RFC 2326 §6.1). Any other token must be alphanumeric, otherwise
    /// [`ParseError::TypeMismatch`] with [`ParseType::Ident`] is returned.
    pub fn from_token(token: &[u8]) -> Result<Self, ParseError> {
        let method = match token {
            b"OPTIONS" => Self::Options,
            b"DESCRIBE" => Self::Describe,
            b"ANNOUNCE" => Self::Announce,
            b"SETUP" => Self::Setup,
            b"PLAY" => Self::Play,
            b"PAUSE" => Self::Pause,
            b"RECORD" => Self::Record,
            b"TEARDOWN" => Self::Teardown,
            b"GET_PARAMETER" => Self::GetParameter,
            b"SET_PARAMETER" => Self::SetParameter,
            b"REDIRECT" => Self::Redirect,
            other if !other.is_empty() && other.iter().all(u8::is_ascii_alphanumeric) => {
                // Alphanumeric ASCII is valid UTF-8.
                Self::Extension(String::from_utf8_lossy(other).into_owned())
            }
            other => return Err(ParseError::type_mismatch(ParseType::Ident, other)),
        };
        Ok(method)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Options => "OPTIONS",
            Self::Describe => "DESCRIBE",
            Self::Announce => "ANNOUNCE",
            Self::Setup => "SETUP",
            Self::Play => "PLAY",
            Self::Pause => "PAUSE",
            Self::Record => "RECORD",
            Self::Teardown => "TEARDOWN",
            Self::GetParameter => "GET_PARAMETER",
            Self::SetParameter => "SET_PARAMETER",
            Self::Redirect => "REDIRECT",
            Self::Extension(name) => name,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-URI (e.g. `rtsp://host:8554/stream/audio`), bounded by
/// [`ParserLimits::max_uri_len`](crate::protocol::ParserLimits::max_uri_len).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestUri(pub(crate) String);

impl RequestUri {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Protocol version. Only RTSP/1.0 is accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Version {
    #[default]
    Rtsp10,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rtsp10 => f.write_str("RTSP/1.0"),
        }
    }
}

/// A parsed RTSP request (RFC 2326 §6).
///
/// ```text
/// Method SP Request-URI SP RTSP-Version CRLF
/// *(Header: Value CRLF)
/// CRLF
/// [body]
/// ```
///
/// The caller owns this value and hands it to
/// [`RequestParser::parse`](crate::protocol::RequestParser::parse), which
/// fills it in stage by stage. Reuse it across requests; the parser clears
/// it when a new request starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub uri: RequestUri,
    pub version: Version,
    pub header_map: HeaderMap,
    /// Value of the mandatory `CSeq` header (RFC 2326 §12.17).
    pub cseq: u32,
    /// `Content-Length` bytes following the header block.
    pub body: Vec<u8>,
}

impl Request {
    pub fn new() -> Self {
        Self::with_header_capacity(crate::protocol::header_map::DEFAULT_HEADER_CAPACITY)
    }

    /// Storage whose header map holds at most `capacity` distinct headers.
    pub fn with_header_capacity(capacity: usize) -> Self {
        Self {
            method: Method::Extension(String::new()),
            uri: RequestUri::default(),
            version: Version::default(),
            header_map: HeaderMap::with_capacity(capacity),
            cseq: 0,
            body: Vec::new(),
        }
    }

    /// Look up a header value by name (case-insensitive, per RFC 2326 §4.2).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_map.get(name)
    }

    /// Reset every field, keeping the header map's capacity.
    pub fn clear(&mut self) {
        self.method = Method::Extension(String::new());
        self.uri.0.clear();
        self.version = Version::default();
        self.header_map.clear();
        self.cseq = 0;
        self.body.clear();
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_methods() {
        assert_eq!(Method::from_token(b"SETUP"), Ok(Method::Setup));
        assert_eq!(Method::from_token(b"GET_PARAMETER"), Ok(Method::GetParameter));
        assert_eq!(Method::GetParameter.to_string(), "GET_PARAMETER");
    }

    #[test]
    fn extension_method_must_be_identifier() {
        assert_eq!(
            Method::from_token(b"FLUSH2"),
            Ok(Method::Extension("FLUSH2".into()))
        );
        assert_eq!(
            Method::from_token(b"SET_UP"),
            Err(ParseError::TypeMismatch {
                kind: ParseType::Ident,
                actual: "SET_UP".into()
            })
        );
        assert!(Method::from_token(b"~29838").is_err());
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut req = Request::with_header_capacity(4);
        req.header_map.insert("CSeq", "1").unwrap();
        req.cseq = 1;
        req.body.extend_from_slice(b"x");
        req.clear();
        assert!(req.header_map.is_empty());
        assert_eq!(req.header_map.capacity(), 4);
        assert_eq!(req.cseq, 0);
        assert!(req.body.is_empty());
    }
}
