//! IEC 61850 quality descriptor.
//!
//! In a 9-2 data set every value is usually followed by a 32-bit quality
//! field. Only the low 14 bits are defined:
//!
//! ```text
//!  13   12   11   10    9    8    7    6    5    4    3    2   1..0
//! DER  OPB  TST  SRC  INA  INC  OLD  FLR  OSC  BRF  OOR  OVF  validity
//! ```

use std::fmt;

/// Validity part of a quality descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// Good
    Good,
    /// Invalid
    Invalid,
    /// Reserved encoding
    Reserved,
    /// Questionable
    Questionable,
}

impl Validity {
    /// Decode from the two validity bits.
    #[inline]
    pub const fn from_bits(bits: u16) -> Self {
        match bits & 0x03 {
            0 => Self::Good,
            1 => Self::Reserved,
            2 => Self::Invalid,
            _ => Self::Questionable,
        }
    }
}

/// Quality flags of one sampled value.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Quality(u16);

impl Quality {
    const VALIDITY_MASK: u16 = 0x0003;
    const OVERFLOW: u16 = 1 << 2;
    const OUT_OF_RANGE: u16 = 1 << 3;
    const BAD_REFERENCE: u16 = 1 << 4;
    const OSCILLATORY: u16 = 1 << 5;
    const FAILURE: u16 = 1 << 6;
    const OLD_DATA: u16 = 1 << 7;
    const INCONSISTENT: u16 = 1 << 8;
    const INACCURATE: u16 = 1 << 9;
    const SUBSTITUTED: u16 = 1 << 10;
    const TEST: u16 = 1 << 11;
    const OPERATOR_BLOCKED: u16 = 1 << 12;
    const DERIVED: u16 = 1 << 13;
    const DEFINED_MASK: u16 = 0x3FFF;

    /// Good quality (all flags clear).
    #[allow(non_upper_case_globals)]
    pub const Good: Self = Self(0);

    /// Create from the 32-bit wire value. Undefined bits are discarded.
    #[inline]
    pub const fn from_u32(raw: u32) -> Self {
        Self((raw as u16) & Self::DEFINED_MASK)
    }

    /// Raw packed value.
    #[inline]
    pub const fn as_raw(&self) -> u16 {
        self.0
    }

    /// Validity.
    #[inline]
    pub const fn validity(&self) -> Validity {
        Validity::from_bits(self.0 & Self::VALIDITY_MASK)
    }

    /// Good validity and no detail flags.
    #[inline]
    pub const fn is_good(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn overflow(&self) -> bool {
        (self.0 & Self::OVERFLOW) != 0
    }

    #[inline]
    pub const fn out_of_range(&self) -> bool {
        (self.0 & Self::OUT_OF_RANGE) != 0
    }

    #[inline]
    pub const fn bad_reference(&self) -> bool {
        (self.0 & Self::BAD_REFERENCE) != 0
    }

    #[inline]
    pub const fn oscillatory(&self) -> bool {
        (self.0 & Self::OSCILLATORY) != 0
    }

    #[inline]
    pub const fn failure(&self) -> bool {
        (self.0 & Self::FAILURE) != 0
    }

    #[inline]
    pub const fn old_data(&self) -> bool {
        (self.0 & Self::OLD_DATA) != 0
    }

    #[inline]
    pub const fn inconsistent(&self) -> bool {
        (self.0 & Self::INCONSISTENT) != 0
    }

    #[inline]
    pub const fn inaccurate(&self) -> bool {
        (self.0 & Self::INACCURATE) != 0
    }

    /// Source is substituted rather than process.
    #[inline]
    pub const fn substituted(&self) -> bool {
        (self.0 & Self::SUBSTITUTED) != 0
    }

    #[inline]
    pub const fn test(&self) -> bool {
        (self.0 & Self::TEST) != 0
    }

    #[inline]
    pub const fn operator_blocked(&self) -> bool {
        (self.0 & Self::OPERATOR_BLOCKED) != 0
    }

    #[inline]
    pub const fn derived(&self) -> bool {
        (self.0 & Self::DERIVED) != 0
    }
}

impl fmt::Debug for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Quality")
            .field("validity", &self.validity())
            .field("detail", &format_args!("0x{:04X}", self.0 & !Self::VALIDITY_MASK))
            .finish()
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_good() {
            return write!(f, "Good");
        }
        write!(f, "{:?}", self.validity())?;
        let flags = [
            (self.overflow(), "OV"),
            (self.out_of_range(), "OOR"),
            (self.bad_reference(), "BR"),
            (self.oscillatory(), "OSC"),
            (self.failure(), "FAIL"),
            (self.old_data(), "OLD"),
            (self.inconsistent(), "INC"),
            (self.inaccurate(), "INA"),
            (self.substituted(), "SUB"),
            (self.test(), "TEST"),
            (self.operator_blocked(), "OPB"),
            (self.derived(), "DER"),
        ];
        for (set, name) in flags {
            if set {
                write!(f, " {}", name)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_good() {
        let q = Quality::from_u32(0);
        assert!(q.is_good());
        assert_eq!(q.validity(), Validity::Good);
        assert_eq!(q.to_string(), "Good");
    }

    #[test]
    fn test_quality_flags() {
        // questionable + overflow + test
        let q = Quality::from_u32(0x0000_0807);
        assert_eq!(q.validity(), Validity::Questionable);
        assert!(q.overflow());
        assert!(q.test());
        assert!(!q.failure());
        assert!(!q.is_good());
        assert_eq!(q.to_string(), "Questionable OV TEST");
    }

    #[test]
    fn test_quality_undefined_bits_dropped() {
        let q = Quality::from_u32(0xFFFF_C002);
        assert_eq!(q.as_raw(), 0x0002);
        assert_eq!(q.validity(), Validity::Invalid);
    }
}
