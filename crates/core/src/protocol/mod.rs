//! RTSP protocol implementation (RFC 2326).
//!
//! This module turns a byte stream into structured requests and builds
//! responses for them.
//!
//! ## Request parsing
//!
//! [`RequestParser`] is a resumable state machine driving the primitive
//! [`deserialize`] targets in order:
//!
//! | Stage | Target | Consumes |
//! |-------|--------|----------|
//! | `NothingParsed` | [`Method`] | method token |
//! | `MethodParsed` | [`RequestUri`] | Request-URI token |
//! | `RequestUriParsed` | [`Version`] | `RTSP/1.0` and the line break |
//! | `RtspVersionParsed` | [`HeaderMap`] | one header line per step |
//! | `HeaderMapParsed` | body | `Content-Length` bytes |
//!
//! A request split across any number of socket reads parses to the same
//! [`Request`] as one delivered whole.
//!
//! ## Dispatch
//!
//! [`controller::dispatch`] routes a parsed request to a [`Controller`]
//! implementation, which answers through a [`Context`].

pub mod controller;
pub mod deserialize;
pub mod header_map;
pub mod parser;
pub mod request;
pub mod response;
pub mod transport_header;

pub use controller::{Context, Controller};
pub use header_map::HeaderMap;
pub use parser::{ParseResult, ParseState, ParseStatus, ParserLimits, RequestParser};
pub use request::{Method, Request, RequestUri, Version};
pub use response::Response;
pub use transport_header::{ChannelPair, LowerTransport, PortPair, TransportConfig};
