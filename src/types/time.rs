//! IEC 61850 UtcTime.
//!
//! ```text
//! +----------------------+-------------------+--------------+
//! | SecondSinceEpoch (4) | FractionOfSec (3) | TimeQuality  |
//! +----------------------+-------------------+--------------+
//! ```
//!
//! Used for the ASDU refresh time and for timestamps inside data sets.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Encoded length of a UtcTime.
pub const UTC_TIME_LENGTH: usize = 8;

/// IEC 61850 UtcTime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UtcTime {
    /// Seconds since 1970-01-01 00:00:00 UTC
    pub seconds: u32,
    /// Fraction of the second in units of 2^-24 s
    pub fraction: u32,
    /// Time quality octet
    pub quality: u8,
}

impl UtcTime {
    const LEAP_SECOND_KNOWN: u8 = 0x80;
    const CLOCK_FAILURE: u8 = 0x40;
    const CLOCK_NOT_SYNCHRONIZED: u8 = 0x20;
    const ACCURACY_MASK: u8 = 0x1F;

    /// Parse from 8 bytes (big-endian).
    #[inline]
    pub const fn from_bytes(bytes: [u8; UTC_TIME_LENGTH]) -> Self {
        Self {
            seconds: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            fraction: u32::from_be_bytes([0, bytes[4], bytes[5], bytes[6]]),
            quality: bytes[7],
        }
    }

    /// Encode to 8 bytes.
    #[inline]
    pub const fn to_bytes(&self) -> [u8; UTC_TIME_LENGTH] {
        let s = self.seconds.to_be_bytes();
        let f = self.fraction.to_be_bytes();
        [s[0], s[1], s[2], s[3], f[1], f[2], f[3], self.quality]
    }

    /// Nanoseconds within the second.
    #[inline]
    pub const fn subsec_nanos(&self) -> u32 {
        (((self.fraction & 0x00FF_FFFF) as u64 * 1_000_000_000) >> 24) as u32
    }

    /// Milliseconds since the epoch.
    #[inline]
    pub const fn as_millis(&self) -> u64 {
        self.seconds as u64 * 1000 + (self.subsec_nanos() / 1_000_000) as u64
    }

    /// Nanoseconds since the epoch.
    #[inline]
    pub const fn as_nanos(&self) -> u64 {
        self.seconds as u64 * 1_000_000_000 + self.subsec_nanos() as u64
    }

    /// Convert to `SystemTime`.
    pub fn to_system_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::new(self.seconds as u64, self.subsec_nanos())
    }

    #[inline]
    pub const fn leap_second_known(&self) -> bool {
        (self.quality & Self::LEAP_SECOND_KNOWN) != 0
    }

    #[inline]
    pub const fn clock_failure(&self) -> bool {
        (self.quality & Self::CLOCK_FAILURE) != 0
    }

    #[inline]
    pub const fn clock_not_synchronized(&self) -> bool {
        (self.quality & Self::CLOCK_NOT_SYNCHRONIZED) != 0
    }

    /// Number of significant fraction bits (31 means unspecified).
    #[inline]
    pub const fn accuracy_bits(&self) -> u8 {
        self.quality & Self::ACCURACY_MASK
    }
}
