//! Error types for the RTSP wire engine.

use std::fmt;

/// Errors that can occur in the RTSP wire engine.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Protocol**: [`Parse`](Self::Parse): malformed or oversized RTSP requests.
/// - **Transport**: [`Io`](Self::Io), [`FrameTooLarge`](Self::FrameTooLarge):
///   socket failures and packets that cannot be interleaved.
/// - **Server**: [`NotStarted`](Self::NotStarted),
///   [`AlreadyRunning`](Self::AlreadyRunning).
#[derive(Debug, thiserror::Error)]
pub enum RtspError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse an RTSP request message (RFC 2326 §6).
    #[error("RTSP parse error: {0}")]
    Parse(#[from] ParseError),

    /// Interleaved frames carry a 16-bit length (RFC 2326 §10.12).
    #[error("packet of {len} bytes does not fit an interleaved frame")]
    FrameTooLarge { len: usize },

    /// [`Server::stop`](crate::Server::stop) was called, or the server never started.
    #[error("server not started")]
    NotStarted,

    /// [`Server::start`](crate::Server::start) was called while already running.
    #[error("server already running")]
    AlreadyRunning,
}

/// The lexical kind a deserializer expected when it met an offending token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseType {
    /// Unsigned decimal integer (`CSeq`, `Content-Length`).
    Int,
    /// Method identifier.
    Ident,
    /// Header field name (RFC 2616 token characters).
    HeaderName,
    /// Request-URI (visible ASCII, no whitespace).
    RequestUri,
    /// Header value or other free text (must be UTF-8).
    Text,
}

impl fmt::Display for ParseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "Integer"),
            Self::Ident => write!(f, "Identifier"),
            Self::HeaderName => write!(f, "Header name"),
            Self::RequestUri => write!(f, "Request-URI"),
            Self::Text => write!(f, "Text"),
        }
    }
}

/// Specific kind of RTSP parse failure.
///
/// Each variant owns the offending text, so a diagnostic can be rendered
/// after the input buffer is gone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// `Content-Length` is not an integer or exceeds the body limit.
    #[error("Invalid Content-Length `{0}`.")]
    ContentLength(String),

    /// A fixed literal (e.g. `RTSP/1.0`, the `:` of a header) was not found.
    #[error("String mismatch: expected `{expected}`, found `{actual}`.")]
    StrMismatch { expected: String, actual: String },

    /// A token contained characters not allowed for its kind.
    #[error("Type mismatch: expected {kind}, found `{actual}`.")]
    TypeMismatch { kind: ParseType, actual: String },

    /// More distinct headers than the map can hold.
    #[error("Not enough space left in the header map.")]
    HeaderMapOverflow,

    /// A token or line ran past its configured bound without a delimiter.
    #[error("{kind} exceeds the {limit}-byte limit.")]
    TokenTooLong { kind: ParseType, limit: usize },

    /// Every request must carry `CSeq` (RFC 2326 §12.17).
    #[error("Missing mandatory `CSeq` header.")]
    MissingCSeq,
}

impl ParseError {
    pub(crate) fn str_mismatch(expected: &str, actual: &[u8]) -> Self {
        Self::StrMismatch {
            expected: expected.to_string(),
            actual: String::from_utf8_lossy(actual).into_owned(),
        }
    }

    pub(crate) fn type_mismatch(kind: ParseType, actual: &[u8]) -> Self {
        Self::TypeMismatch {
            kind,
            actual: String::from_utf8_lossy(actual).into_owned(),
        }
    }

    /// Whether the failure is a size limit rather than malformed syntax.
    ///
    /// Callers use this to answer with a size-specific status instead of
    /// a generic `400 Bad Request`.
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::HeaderMapOverflow | Self::TokenTooLong { .. })
    }
}

/// Convenience alias for `Result<T, RtspError>`.
pub type Result<T> = std::result::Result<T, RtspError>;
