//! SV ASDU (Application Service Data Unit).
//!
//! One ASDU is one snapshot of a published data set:
//!
//! ```text
//! ASDU ::= SEQUENCE {
//!     svID        [0] VisibleString,
//!     datSet      [1] VisibleString OPTIONAL,
//!     smpCnt      [2] INT16U,
//!     confRev     [3] INT32U,
//!     refrTm      [4] UtcTime OPTIONAL,
//!     smpSynch    [5] INT8U,
//!     smpRate     [6] INT16U OPTIONAL,
//!     seqData     [7] Data,
//!     smpMod      [8] INT16U OPTIONAL,
//!     gmIdentity  [9] OCTET STRING (8) OPTIONAL
//! }
//! ```

use bytes::Bytes;

use crate::accessor::DataAccessor;
use crate::types::UtcTime;

/// Sample synchronization state (`smpSynch`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmpSynch {
    /// Not synchronized
    None,
    /// Synchronized to a local clock
    Local,
    /// Synchronized to a global area clock
    Global,
    /// Synchronized to the time source with this identifier (5-254)
    Other(u8),
}

impl SmpSynch {
    /// Parse from the wire value.
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Local,
            2 => Self::Global,
            v => Self::Other(v),
        }
    }

    /// Wire value.
    #[inline]
    pub const fn as_u8(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Local => 1,
            Self::Global => 2,
            Self::Other(v) => *v,
        }
    }

    /// Any synchronization.
    #[inline]
    pub const fn is_synchronized(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Unit of the sample rate (`smpMod`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmpMod {
    /// Samples per nominal period
    SamplesPerPeriod,
    /// Samples per second
    SamplesPerSecond,
    /// Seconds per sample
    SecondsPerSample,
    /// Value outside the defined range
    Unknown(u16),
}

impl SmpMod {
    /// Parse from the wire value.
    #[inline]
    pub const fn from_u16(value: u16) -> Self {
        match value {
            0 => Self::SamplesPerPeriod,
            1 => Self::SamplesPerSecond,
            2 => Self::SecondsPerSample,
            v => Self::Unknown(v),
        }
    }

    /// Wire value.
    #[inline]
    pub const fn as_u16(&self) -> u16 {
        match self {
            Self::SamplesPerPeriod => 0,
            Self::SamplesPerSecond => 1,
            Self::SecondsPerSample => 2,
            Self::Unknown(v) => *v,
        }
    }
}

/// Decoded ASDU borrowing from the captured frame.
///
/// Only valid for the duration of the listener call it is handed to. Use
/// [`Asdu::to_owned_asdu`] to keep it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Asdu<'a> {
    /// Sampled value control block identifier
    pub sv_id: Option<&'a str>,
    /// Data set reference
    pub dat_set: Option<&'a str>,
    /// Sample counter
    pub smp_cnt: u16,
    /// Configuration revision
    pub conf_rev: u32,
    /// Refresh time
    pub refr_tm: Option<UtcTime>,
    /// Sample synchronization
    pub smp_synch: Option<SmpSynch>,
    /// Sample rate
    pub smp_rate: Option<u16>,
    /// Raw data set values
    pub data: &'a [u8],
    /// Sample mode
    pub smp_mod: Option<SmpMod>,
    /// Grandmaster clock identity
    pub gm_identity: Option<[u8; 8]>,
}

impl<'a> Asdu<'a> {
    /// Typed reader over the data block.
    #[inline]
    pub fn data(&self) -> DataAccessor<'a> {
        DataAccessor::new(self.data)
    }

    /// Data block length in bytes.
    #[inline]
    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    /// Deep copy that outlives the capture buffer.
    pub fn to_owned_asdu(&self) -> OwnedAsdu {
        OwnedAsdu {
            sv_id: self.sv_id.map(str::to_owned),
            dat_set: self.dat_set.map(str::to_owned),
            smp_cnt: self.smp_cnt,
            conf_rev: self.conf_rev,
            refr_tm: self.refr_tm,
            smp_synch: self.smp_synch,
            smp_rate: self.smp_rate,
            data: Bytes::copy_from_slice(self.data),
            smp_mod: self.smp_mod,
            gm_identity: self.gm_identity,
        }
    }
}

/// Owned copy of an [`Asdu`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OwnedAsdu {
    /// Sampled value control block identifier
    pub sv_id: Option<String>,
    /// Data set reference
    pub dat_set: Option<String>,
    /// Sample counter
    pub smp_cnt: u16,
    /// Configuration revision
    pub conf_rev: u32,
    /// Refresh time
    pub refr_tm: Option<UtcTime>,
    /// Sample synchronization
    pub smp_synch: Option<SmpSynch>,
    /// Sample rate
    pub smp_rate: Option<u16>,
    /// Raw data set values
    pub data: Bytes,
    /// Sample mode
    pub smp_mod: Option<SmpMod>,
    /// Grandmaster clock identity
    pub gm_identity: Option<[u8; 8]>,
}

impl OwnedAsdu {
    /// Typed reader over the data block.
    #[inline]
    pub fn data(&self) -> DataAccessor<'_> {
        DataAccessor::new(&self.data)
    }

    /// Borrowed view with the same contents.
    pub fn as_asdu(&self) -> Asdu<'_> {
        Asdu {
            sv_id: self.sv_id.as_deref(),
            dat_set: self.dat_set.as_deref(),
            smp_cnt: self.smp_cnt,
            conf_rev: self.conf_rev,
            refr_tm: self.refr_tm,
            smp_synch: self.smp_synch,
            smp_rate: self.smp_rate,
            data: &self.data,
            smp_mod: self.smp_mod,
            gm_identity: self.gm_identity,
        }
    }
}
