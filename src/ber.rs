//! Minimal BER tag-length-value reader for SV PDUs.
//!
//! SV only uses single-octet tags and definite lengths, so the reader rejects
//! the multi-octet tag form and the indefinite length form. Every length is
//! checked against the bytes that remain before a value slice is handed out.

use crate::error::DecodeError;

/// Long-form lengths with more octets than this are rejected.
const MAX_LENGTH_OCTETS: usize = 4;

/// One decoded element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    /// Tag octet
    pub tag: u8,
    /// Offset of the tag octet
    pub offset: usize,
    /// Offset of the first value octet
    pub value_offset: usize,
    /// Value octets
    pub value: &'a [u8],
}

impl<'a> Tlv<'a> {
    /// Constructed (contains nested elements).
    #[inline]
    pub const fn is_constructed(&self) -> bool {
        (self.tag & 0x20) != 0
    }

    /// Reader over the nested elements.
    #[inline]
    pub fn children(&self) -> TlvReader<'a> {
        TlvReader::with_base(self.value, self.value_offset)
    }
}

/// Sequential reader over concatenated TLV elements.
#[derive(Debug, Clone)]
pub struct TlvReader<'a> {
    buf: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> TlvReader<'a> {
    /// Create a reader; offsets are reported relative to `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self::with_base(buf, 0)
    }

    /// Create a reader whose first byte sits at `base` in the enclosing buffer.
    pub fn with_base(buf: &'a [u8], base: usize) -> Self {
        Self { buf, pos: 0, base }
    }

    /// No elements left.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Bytes not yet consumed.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Read the next element, or `None` at the end of the buffer.
    pub fn read(&mut self) -> Result<Option<Tlv<'a>>, DecodeError> {
        if self.is_empty() {
            return Ok(None);
        }

        let start = self.pos;
        let tag = self.buf[start];
        if (tag & 0x1F) == 0x1F {
            return Err(DecodeError::InvalidTag {
                offset: self.base + start,
                found: tag,
            });
        }

        let (length, length_octets) = decode_length(self.buf, start + 1, self.base)?;
        let value_start = start + 1 + length_octets;
        let available = self.buf.len() - value_start;
        if length > available {
            return Err(DecodeError::LengthOverrun {
                offset: self.base + start + 1,
                declared: length,
                available,
            });
        }

        self.pos = value_start + length;
        Ok(Some(Tlv {
            tag,
            offset: self.base + start,
            value_offset: self.base + value_start,
            value: &self.buf[value_start..value_start + length],
        }))
    }

    /// Read the next element and require its tag.
    pub fn expect(&mut self, tag: u8) -> Result<Tlv<'a>, DecodeError> {
        let offset = self.base + self.pos;
        match self.read()? {
            Some(tlv) if tlv.tag == tag => Ok(tlv),
            Some(tlv) => Err(DecodeError::UnexpectedTag {
                offset,
                expected: tag,
                found: tlv.tag,
            }),
            None => Err(DecodeError::TruncatedLength { offset }),
        }
    }
}

/// Decode a definite length at `pos`. Returns the length and the number of
/// length octets consumed.
fn decode_length(buf: &[u8], pos: usize, base: usize) -> Result<(usize, usize), DecodeError> {
    let first = *buf
        .get(pos)
        .ok_or(DecodeError::TruncatedLength { offset: base + pos })?;

    if first < 0x80 {
        return Ok((first as usize, 1));
    }

    let octets = (first & 0x7F) as usize;
    if octets == 0 || octets > MAX_LENGTH_OCTETS {
        return Err(DecodeError::InvalidLength { offset: base + pos });
    }

    let bytes = buf
        .get(pos + 1..pos + 1 + octets)
        .ok_or(DecodeError::TruncatedLength { offset: base + pos })?;
    let length = bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);

    Ok((length, 1 + octets))
}

/// Decode a big-endian unsigned integer value of up to 8 octets.
///
/// SV encodes counters as fixed-width unsigned octets, so a set high bit is
/// not a sign. A 9th leading zero octet (BER form of a large unsigned) is
/// tolerated.
pub fn decode_unsigned(tlv: &Tlv<'_>, field: &'static str) -> Result<u64, DecodeError> {
    let mut value = tlv.value;
    if value.len() == 9 && value[0] == 0 {
        value = &value[1..];
    }
    if value.is_empty() || value.len() > 8 {
        return Err(DecodeError::InvalidValue {
            field,
            offset: tlv.value_offset,
        });
    }
    Ok(value.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
}

/// Decode an unsigned value that must fit `T`.
pub fn decode_uint<T: TryFrom<u64>>(tlv: &Tlv<'_>, field: &'static str) -> Result<T, DecodeError> {
    let raw = decode_unsigned(tlv, field)?;
    T::try_from(raw).map_err(|_| DecodeError::InvalidValue {
        field,
        offset: tlv.value_offset,
    })
}

/// Decode a VisibleString value.
pub fn decode_visible_string<'a>(tlv: &Tlv<'a>, field: &'static str) -> Result<&'a str, DecodeError> {
    std::str::from_utf8(tlv.value).map_err(|_| DecodeError::InvalidValue {
        field,
        offset: tlv.value_offset,
    })
}
