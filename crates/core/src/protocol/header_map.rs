use std::str::FromStr;

use crate::error::ParseError;

/// Default number of distinct headers a [`HeaderMap`] accepts.
pub const DEFAULT_HEADER_CAPACITY: usize = 32;

/// A single `Name: value` header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Bounded, insertion-ordered RTSP header map.
///
/// Lookups are case-insensitive per RFC 2326 §4.2. Names are stored
/// as received.
///
/// Inserting a name that is already present overwrites its value in
/// place and keeps the original position; RTSP has no singleton header
/// that may legitimately repeat in one request. Inserting a new name
/// into a full map fails with [`ParseError::HeaderMapOverflow`] and
/// leaves the map untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<Header>,
    capacity: usize,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HEADER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Insert or overwrite a header. Returns the previous value on overwrite.
    pub fn insert(&mut self, name: &str, value: &str) -> Result<Option<String>, ParseError> {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|h| h.name.eq_ignore_ascii_case(name))
        {
            tracing::trace!(name, "overwriting duplicate header");
            return Ok(Some(std::mem::replace(
                &mut existing.value,
                value.to_string(),
            )));
        }

        if self.is_full() {
            return Err(ParseError::HeaderMapOverflow);
        }

        self.entries.push(Header {
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(None)
    }

    /// Look up a header value by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Look up a header and parse its value, e.g. a numeric `Session` id.
    ///
    /// Returns `None` when the header is absent, `Some(Err(_))` when it
    /// does not parse.
    pub fn get_parsed<T: FromStr>(&self, name: &str) -> Option<Result<T, T::Err>> {
        self.get(name).map(str::parse)
    }

    /// Headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|h| (h.name.as_str(), h.value.as_str()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for HeaderMap {
    fn default() -> Self {
        Self::new()
    }
}
