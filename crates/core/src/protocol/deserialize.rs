//! Primitive deserializers for the RTSP request line and header block.
//!
//! Each deserializer looks at a byte window starting at the parser's
//! cursor and either completes its token, asks for more input, or fails.
//! [`Progress::NeedMore`] never consumes anything: the caller re-presents
//! the same bytes (plus whatever arrived since) on the next call, so no
//! partial token is ever carried inside a deserializer.

use crate::error::{ParseError, ParseType};
use crate::protocol::header_map::HeaderMap;
use crate::protocol::parser::ParserLimits;
use crate::protocol::request::{Method, RequestUri, Version};

const RTSP_VERSION: &[u8] = b"RTSP/1.0";

/// Longest version line we wait for before giving up.
const MAX_VERSION_LINE_LEN: usize = 32;

/// Outcome of one deserialization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The target is fully parsed; `n` bytes were consumed.
    Complete(usize),
    /// `n` bytes were consumed but the target wants more calls
    /// (one header line of a header block).
    Partial(usize),
    /// The window ends mid-token. Nothing was consumed.
    NeedMore,
}

/// A parse target that fills itself from a byte window.
pub trait Deserialize {
    fn deserialize(&mut self, input: &[u8], limits: &ParserLimits) -> Result<Progress, ParseError>;
}

fn is_space(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

fn is_line_break(b: u8) -> bool {
    b == b'\r' || b == b'\n'
}

/// RFC 2616 §2.2 `token` characters, used for header names.
fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

fn skip_spaces(input: &[u8]) -> usize {
    input.iter().take_while(|&&b| is_space(b)).count()
}

/// Split the token starting at `start`, ended by whitespace or a line break.
///
/// Returns the token and the offset just past it (the delimiter is left
/// in place), or `None` if no delimiter has arrived yet. The `start` bytes
/// skipped before the token count against `limit` too.
fn next_token(
    input: &[u8],
    start: usize,
    limit: usize,
    kind: ParseType,
) -> Result<Option<(&[u8], usize)>, ParseError> {
    let rest = &input[start..];
    match rest.iter().position(|&b| is_space(b) || is_line_break(b)) {
        Some(len) if start + len > limit => Err(ParseError::TokenTooLong { kind, limit }),
        Some(len) => Ok(Some((&rest[..len], start + len))),
        None if input.len() > limit => Err(ParseError::TokenTooLong { kind, limit }),
        None => Ok(None),
    }
}

/// Split one line off `input`. Accepts `\r\n` and bare `\n`.
///
/// Returns the line without its terminator and the number of bytes
/// including the terminator.
fn next_line(
    input: &[u8],
    limit: usize,
    kind: ParseType,
) -> Result<Option<(&[u8], usize)>, ParseError> {
    match input.iter().position(|&b| b == b'\n') {
        Some(nl) => {
            let line = &input[..nl];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.len() > limit {
                return Err(ParseError::TokenTooLong { kind, limit });
            }
            Ok(Some((line, nl + 1)))
        }
        // +1 leaves room for a trailing '\r' still waiting on its '\n'.
        None if input.len() > limit + 1 => Err(ParseError::TokenTooLong { kind, limit }),
        None => Ok(None),
    }
}

impl Deserialize for Method {
    /// Leading whitespace and blank lines (keep-alive CRLFs) are skipped,
    /// within `max_method_len`.
    fn deserialize(&mut self, input: &[u8], limits: &ParserLimits) -> Result<Progress, ParseError> {
        let skip = input
            .iter()
            .take_while(|&&b| is_space(b) || is_line_break(b))
            .count();
        let Some((token, end)) = next_token(input, skip, limits.max_method_len, ParseType::Ident)?
        else {
            return Ok(Progress::NeedMore);
        };

        *self = Method::from_token(token)?;
        Ok(Progress::Complete(end))
    }
}

impl Deserialize for RequestUri {
    fn deserialize(&mut self, input: &[u8], limits: &ParserLimits) -> Result<Progress, ParseError> {
        let skip = skip_spaces(input);
        let Some((token, end)) = next_token(input, skip, limits.max_uri_len, ParseType::RequestUri)?
        else {
            return Ok(Progress::NeedMore);
        };

        if token.is_empty() || !token.iter().all(u8::is_ascii_graphic) {
            return Err(ParseError::type_mismatch(ParseType::RequestUri, token));
        }

        self.0.clear();
        // Graphic ASCII is valid UTF-8.
        self.0.push_str(&String::from_utf8_lossy(token));
        Ok(Progress::Complete(end))
    }
}

impl Deserialize for Version {
    /// Consumes the rest of the request line, including its line break.
    fn deserialize(&mut self, input: &[u8], _limits: &ParserLimits) -> Result<Progress, ParseError> {
        let skip = skip_spaces(input);
        if skip > MAX_VERSION_LINE_LEN {
            return Err(ParseError::TokenTooLong {
                kind: ParseType::Text,
                limit: MAX_VERSION_LINE_LEN,
            });
        }
        let Some((line, len)) = next_line(&input[skip..], MAX_VERSION_LINE_LEN, ParseType::Text)?
        else {
            return Ok(Progress::NeedMore);
        };

        let version = line.trim_ascii_end();
        if version != RTSP_VERSION {
            return Err(ParseError::str_mismatch("RTSP/1.0", version));
        }

        *self = Version::Rtsp10;
        Ok(Progress::Complete(skip + len))
    }
}

impl Deserialize for HeaderMap {
    /// Consumes exactly one header line per call.
    ///
    /// Returns [`Progress::Partial`] after storing a header and
    /// [`Progress::Complete`] on the blank line that ends the block.
    fn deserialize(&mut self, input: &[u8], limits: &ParserLimits) -> Result<Progress, ParseError> {
        let Some((line, len)) = next_line(input, limits.max_header_line_len, ParseType::Text)?
        else {
            return Ok(Progress::NeedMore);
        };

        if line.is_empty() {
            return Ok(Progress::Complete(len));
        }

        let Some(colon) = line.iter().position(|&b| b == b':') else {
            return Err(ParseError::str_mismatch(":", line));
        };

        let name = line[..colon].trim_ascii_end();
        if name.is_empty() || !name.iter().all(|&b| is_tchar(b)) {
            return Err(ParseError::type_mismatch(ParseType::HeaderName, name));
        }

        let raw_value = line[colon + 1..].trim_ascii();
        let value = std::str::from_utf8(raw_value)
            .map_err(|_| ParseError::type_mismatch(ParseType::Text, raw_value))?;

        // Header names are tchar-only, hence ASCII.
        let name = String::from_utf8_lossy(name);
        self.insert(&name, value)?;
        Ok(Progress::Partial(len))
    }
}

/// Parse a `Content-Length` value against the body limit.
pub fn content_length(value: &str, limits: &ParserLimits) -> Result<usize, ParseError> {
    match value.parse::<usize>() {
        Ok(len) if len <= limits.max_body_len => Ok(len),
        _ => Err(ParseError::ContentLength(value.to_string())),
    }
}
