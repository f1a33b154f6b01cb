//! H.264 Annex B splitting (ITU-T H.264 Annex B, RFC 6184 §1.3).
//!
//! An Annex B stream separates NAL units with start codes, either
//! `00 00 01` or `00 00 00 01`. The width is taken from the first start
//! code in the stream and used for the rest of it.

use std::iter::FusedIterator;

/// Width of the start codes in one Annex B stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartCode {
    /// `00 00 01`
    Three,
    /// `00 00 00 01`
    Four,
}

impl StartCode {
    /// Width of the first start code in `data`, if it has one.
    pub fn detect(data: &[u8]) -> Option<Self> {
        let pos = find(data, 0, &[0, 0, 1])?;
        if pos > 0 && data[pos - 1] == 0 {
            Some(Self::Four)
        } else {
            Some(Self::Three)
        }
    }

    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Three => &[0, 0, 1],
            Self::Four => &[0, 0, 0, 1],
        }
    }

    pub fn len(self) -> usize {
        self.as_bytes().len()
    }
}

/// One-byte H.264 NAL unit header (ITU-T H.264 §7.3.1).
///
/// ```text
/// +---------------+
/// |0|1|2|3|4|5|6|7|
/// +-+-+-+-+-+-+-+-+
/// |F|NRI|  Type   |
/// +---------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalHeader {
    pub forbidden_zero_bit: bool,
    pub ref_idc: u8,
    pub unit_type: u8,
}

impl NalHeader {
    pub const NON_IDR_SLICE: u8 = 1;
    pub const IDR_SLICE: u8 = 5;
    pub const SEI: u8 = 6;
    pub const SPS: u8 = 7;
    pub const PPS: u8 = 8;
    pub const AUD: u8 = 9;

    pub fn parse(byte: u8) -> Self {
        Self {
            forbidden_zero_bit: byte & 0x80 != 0,
            ref_idc: (byte >> 5) & 0x03,
            unit_type: byte & 0x1f,
        }
    }

    pub fn to_byte(self) -> u8 {
        ((self.forbidden_zero_bit as u8) << 7) | ((self.ref_idc & 0x03) << 5) | (self.unit_type & 0x1f)
    }

    /// Access unit delimiter, one per picture.
    pub fn is_aud(self) -> bool {
        self.unit_type == Self::AUD
    }

    /// Slice data (types 1 to 5): the units that carry a picture.
    pub fn is_coded_slice(self) -> bool {
        (Self::NON_IDR_SLICE..=Self::IDR_SLICE).contains(&self.unit_type)
    }
}

/// A NAL unit borrowed from an Annex B buffer, start code removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalUnit<'a> {
    header: NalHeader,
    data: &'a [u8],
}

impl<'a> NalUnit<'a> {
    /// Wrap raw NAL unit bytes (header byte first).
    ///
    /// Returns `None` for an empty slice.
    pub fn new(data: &'a [u8]) -> Option<Self> {
        let &first = data.first()?;
        Some(Self {
            header: NalHeader::parse(first),
            data,
        })
    }

    pub fn header(&self) -> NalHeader {
        self.header
    }

    /// Bytes after the header byte.
    pub fn payload(&self) -> &'a [u8] {
        &self.data[1..]
    }

    /// The whole unit, header byte included.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }
}

/// Iterator over the NAL units of an Annex B buffer.
///
/// Bytes before the first start code are ignored, as are empty units
/// between back-to-back start codes. The last unit runs to the end of
/// the buffer.
#[derive(Debug, Clone)]
pub struct NalUnits<'a> {
    data: &'a [u8],
    start_code: &'static [u8],
    /// First byte of the next unit; `data.len()` once exhausted.
    pos: usize,
}

impl<'a> NalUnits<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let Some(width) = StartCode::detect(data) else {
            return Self {
                data,
                start_code: StartCode::Three.as_bytes(),
                pos: data.len(),
            };
        };
        let start_code = width.as_bytes();
        let pos = find(data, 0, start_code).map_or(data.len(), |p| p + start_code.len());
        tracing::trace!(?width, first_unit = pos, "Annex B start code detected");
        Self {
            data,
            start_code,
            pos,
        }
    }
}

impl<'a> Iterator for NalUnits<'a> {
    type Item = NalUnit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.data.len() {
            let next = find(self.data, self.pos, self.start_code);
            let end = next.unwrap_or(self.data.len());
            let unit = NalUnit::new(&self.data[self.pos..end]);
            self.pos = next.map_or(self.data.len(), |n| n + self.start_code.len());
            if unit.is_some() {
                return unit;
            }
        }
        None
    }
}

impl FusedIterator for NalUnits<'_> {}

/// Split an Annex B buffer into its NAL units.
pub fn split_nal_units(data: &[u8]) -> NalUnits<'_> {
    NalUnits::new(data)
}

fn find(data: &[u8], from: usize, pattern: &[u8]) -> Option<usize> {
    data.get(from..)?
        .windows(pattern.len())
        .position(|w| w == pattern)
        .map(|p| p + from)
}
