//! Ethernet framing for Sampled Values.
//!
//! SV frames are sent directly on the link layer:
//!
//! ```text
//! +---------+---------+-----------------+--------+-------+--------+-----------+-----------+--------
//! | Dst MAC | Src MAC | 802.1Q (opt, 4) | 0x88BA | APPID | Length | Reserved1 | Reserved2 | APDU...
//! |    6    |    6    |                 |   2    |   2   |   2    |     2     |     2     |
//! +---------+---------+-----------------+--------+-------+--------+-----------+-----------+--------
//! ```
//!
//! `Length` counts the octets from APPID to the end of the APDU, so any
//! Ethernet padding after it is not part of the PDU.

use std::fmt;
use std::str::FromStr;

use crate::error::{DecodeError, SvError};

/// EtherType assigned to IEC 61850-9-2 Sampled Values.
pub const SV_ETHER_TYPE: u16 = 0x88BA;

/// EtherType of an IEEE 802.1Q VLAN tag.
pub const VLAN_ETHER_TYPE: u16 = 0x8100;

/// Length of the SV header (APPID, Length, Reserved1, Reserved2).
pub const SV_HEADER_LENGTH: usize = 8;

/// Simulation flag in Reserved1 (IEC 61850-9-2 Ed.2).
pub const SIMULATION_BIT: u16 = 0x8000;

const MAC_HEADER_LENGTH: usize = 12;

/// 48-bit IEEE MAC address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Create from raw octets.
    #[inline]
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Read from the first six bytes of a slice.
    #[inline]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let octets: [u8; 6] = bytes.get(..6)?.try_into().ok()?;
        Some(Self(octets))
    }

    /// Raw octets.
    #[inline]
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Group (multicast) address bit.
    #[inline]
    pub const fn is_multicast(&self) -> bool {
        (self.0[0] & 0x01) != 0
    }

    /// Inside the multicast range reserved for Sampled Values
    /// (01-0C-CD-04-00-00 to 01-0C-CD-04-01-FF).
    #[inline]
    pub const fn is_sv_multicast(&self) -> bool {
        self.0[0] == 0x01
            && self.0[1] == 0x0C
            && self.0[2] == 0xCD
            && self.0[3] == 0x04
            && self.0[4] <= 0x01
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({})", self)
    }
}

impl FromStr for MacAddress {
    type Err = SvError;

    /// Accepts `01:0C:CD:04:00:01` and `01-0C-CD-04-00-01`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SvError::Configuration(format!("invalid MAC address: {s}"));

        let mut octets = [0u8; 6];
        let mut parts = s.split(|c| c == ':' || c == '-');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(octets))
    }
}

/// IEEE 802.1Q tag control information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlanTag {
    /// Priority code point (0-7)
    pub priority: u8,
    /// Drop eligible indicator
    pub drop_eligible: bool,
    /// VLAN identifier (12 bits)
    pub vlan_id: u16,
}

impl VlanTag {
    /// Parse from the 16-bit TCI.
    #[inline]
    pub const fn from_tci(tci: u16) -> Self {
        Self {
            priority: (tci >> 13) as u8,
            drop_eligible: (tci & 0x1000) != 0,
            vlan_id: tci & 0x0FFF,
        }
    }

    /// Encode to the 16-bit TCI.
    #[inline]
    pub const fn as_tci(&self) -> u16 {
        ((self.priority as u16 & 0x07) << 13)
            | if self.drop_eligible { 0x1000 } else { 0 }
            | (self.vlan_id & 0x0FFF)
    }
}

/// Link-layer and SV header of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvHeader {
    /// Destination MAC address
    pub destination: MacAddress,
    /// Source MAC address
    pub source: MacAddress,
    /// VLAN tag (if present)
    pub vlan: Option<VlanTag>,
    /// Application identifier
    pub app_id: u16,
    /// Declared length from APPID to end of APDU
    pub length: u16,
    /// Reserved1 field (bit 15 carries the simulation flag)
    pub reserved1: u16,
    /// Reserved2 field
    pub reserved2: u16,
}

impl SvHeader {
    /// Parse the header of a raw Ethernet frame.
    ///
    /// Returns the header and the APDU bytes it delimits. The declared
    /// length is checked against the frame; trailing padding is dropped.
    pub fn parse(frame: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        if frame.len() < MAC_HEADER_LENGTH + 2 {
            return Err(DecodeError::FrameTooShort {
                length: frame.len(),
                required: MAC_HEADER_LENGTH + 2 + SV_HEADER_LENGTH,
            });
        }

        let destination = MacAddress::new([frame[0], frame[1], frame[2], frame[3], frame[4], frame[5]]);
        let source = MacAddress::new([frame[6], frame[7], frame[8], frame[9], frame[10], frame[11]]);

        let mut pos = MAC_HEADER_LENGTH;
        let mut ether_type = read_u16(frame, pos);
        let mut vlan = None;

        if ether_type == VLAN_ETHER_TYPE {
            if frame.len() < pos + 6 {
                return Err(DecodeError::FrameTooShort {
                    length: frame.len(),
                    required: pos + 6 + SV_HEADER_LENGTH,
                });
            }
            vlan = Some(VlanTag::from_tci(read_u16(frame, pos + 2)));
            pos += 4;
            ether_type = read_u16(frame, pos);
        }

        if ether_type != SV_ETHER_TYPE {
            return Err(DecodeError::NotSampledValues { ether_type });
        }
        pos += 2;

        if frame.len() < pos + SV_HEADER_LENGTH {
            return Err(DecodeError::FrameTooShort {
                length: frame.len(),
                required: pos + SV_HEADER_LENGTH,
            });
        }

        let app_id = read_u16(frame, pos);
        let length = read_u16(frame, pos + 2);
        let reserved1 = read_u16(frame, pos + 4);
        let reserved2 = read_u16(frame, pos + 6);

        let declared = length as usize;
        if declared < SV_HEADER_LENGTH {
            return Err(DecodeError::InvalidLength { offset: pos + 2 });
        }
        let available = frame.len() - pos;
        if declared > available {
            return Err(DecodeError::LengthOverrun {
                offset: pos + 2,
                declared,
                available,
            });
        }

        let apdu = &frame[pos + SV_HEADER_LENGTH..pos + declared];

        Ok((
            Self {
                destination,
                source,
                vlan,
                app_id,
                length,
                reserved1,
                reserved2,
            },
            apdu,
        ))
    }

    /// Simulation flag (test traffic).
    #[inline]
    pub const fn simulated(&self) -> bool {
        (self.reserved1 & SIMULATION_BIT) != 0
    }
}

#[inline(always)]
fn read_u16(bytes: &[u8], pos: usize) -> u16 {
    u16::from_be_bytes([bytes[pos], bytes[pos + 1]])
}
