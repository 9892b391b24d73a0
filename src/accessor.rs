//! Positional access to an ASDU data block.
//!
//! The SV data block (`seqData`) carries no type information. Interpreting it
//! requires knowing the data set layout out of band, e.g. that a 9-2LE
//! measurement data set is eight `INT32` values each followed by a 32-bit
//! quality. The readers here only convert from network byte order and check
//! bounds against the declared data length; they never look past the block.
//!
//! # Example
//!
//! ```rust,ignore
//! let data = asdu.data();
//! if data.len() >= 8 {
//!     let ia = data.read_i32(0)?;
//!     let ia_quality = data.read_quality(4)?;
//! }
//! ```

use crate::error::RangeError;
use crate::types::{Quality, UtcTime, UTC_TIME_LENGTH};

/// Bounds-checked reader over one ASDU data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataAccessor<'a> {
    data: &'a [u8],
}

impl<'a> DataAccessor<'a> {
    /// Wrap a data block.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Declared data block length in bytes.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw data block.
    #[inline]
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Copy `N` bytes at `offset`, failing if they leave the block.
    #[inline]
    fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N], RangeError> {
        let out_of_range = RangeError {
            offset,
            width: N,
            length: self.data.len(),
        };
        let end = offset.checked_add(N).ok_or(out_of_range)?;
        let bytes = self.data.get(offset..end).ok_or(out_of_range)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// INT8
    #[inline]
    pub fn read_i8(&self, offset: usize) -> Result<i8, RangeError> {
        self.array::<1>(offset).map(i8::from_be_bytes)
    }

    /// INT8U
    #[inline]
    pub fn read_u8(&self, offset: usize) -> Result<u8, RangeError> {
        self.array::<1>(offset).map(u8::from_be_bytes)
    }

    /// INT16
    #[inline]
    pub fn read_i16(&self, offset: usize) -> Result<i16, RangeError> {
        self.array::<2>(offset).map(i16::from_be_bytes)
    }

    /// INT16U
    #[inline]
    pub fn read_u16(&self, offset: usize) -> Result<u16, RangeError> {
        self.array::<2>(offset).map(u16::from_be_bytes)
    }

    /// 24-bit signed integer, sign-extended.
    #[inline]
    pub fn read_i24(&self, offset: usize) -> Result<i32, RangeError> {
        let [a, b, c] = self.array::<3>(offset)?;
        Ok(i32::from_be_bytes([a, b, c, 0]) >> 8)
    }

    /// 24-bit unsigned integer.
    #[inline]
    pub fn read_u24(&self, offset: usize) -> Result<u32, RangeError> {
        let [a, b, c] = self.array::<3>(offset)?;
        Ok(u32::from_be_bytes([0, a, b, c]))
    }

    /// INT32
    #[inline]
    pub fn read_i32(&self, offset: usize) -> Result<i32, RangeError> {
        self.array::<4>(offset).map(i32::from_be_bytes)
    }

    /// INT32U
    #[inline]
    pub fn read_u32(&self, offset: usize) -> Result<u32, RangeError> {
        self.array::<4>(offset).map(u32::from_be_bytes)
    }

    /// INT64
    #[inline]
    pub fn read_i64(&self, offset: usize) -> Result<i64, RangeError> {
        self.array::<8>(offset).map(i64::from_be_bytes)
    }

    /// INT64U
    #[inline]
    pub fn read_u64(&self, offset: usize) -> Result<u64, RangeError> {
        self.array::<8>(offset).map(u64::from_be_bytes)
    }

    /// FLOAT32 (IEEE 754 single)
    #[inline]
    pub fn read_f32(&self, offset: usize) -> Result<f32, RangeError> {
        self.array::<4>(offset).map(f32::from_be_bytes)
    }

    /// FLOAT64 (IEEE 754 double)
    #[inline]
    pub fn read_f64(&self, offset: usize) -> Result<f64, RangeError> {
        self.array::<8>(offset).map(f64::from_be_bytes)
    }

    /// 8-byte UtcTime.
    #[inline]
    pub fn read_timestamp(&self, offset: usize) -> Result<UtcTime, RangeError> {
        self.array::<UTC_TIME_LENGTH>(offset).map(UtcTime::from_bytes)
    }

    /// 32-bit quality.
    #[inline]
    pub fn read_quality(&self, offset: usize) -> Result<Quality, RangeError> {
        self.array::<4>(offset)
            .map(|b| Quality::from_u32(u32::from_be_bytes(b)))
    }
}
