//! SV PDU: one decoded frame.

use super::{Asdu, SvHeader};

/// Decoded content of one SV frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvPdu<'a> {
    /// Link-layer and SV header
    pub header: SvHeader,
    /// Number of ASDUs announced by `noASDU`
    pub no_asdu: u32,
    /// Opaque security element (if present)
    pub security: Option<&'a [u8]>,
    /// ASDUs in encoded order
    pub asdus: Vec<Asdu<'a>>,
}

impl<'a> SvPdu<'a> {
    /// Application identifier.
    #[inline]
    pub fn app_id(&self) -> u16 {
        self.header.app_id
    }

    /// Number of decoded ASDUs.
    #[inline]
    pub fn len(&self) -> usize {
        self.asdus.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.asdus.is_empty()
    }
}
