//! Sampled Values type definitions.
//!
//! This module contains the wire-level types of the SV protocol:
//!
//! - `SvHeader` - Ethernet, VLAN and SV header of a frame
//! - `MacAddress` / `VlanTag` - link-layer addressing
//! - `SvPdu` - one decoded frame
//! - `Asdu` / `OwnedAsdu` - one data set snapshot
//! - `Quality` - IEC 61850 quality descriptor
//! - `UtcTime` - IEC 61850 timestamp

mod asdu;
mod ethernet;
mod pdu;
mod quality;
mod time;

pub use asdu::*;
pub use ethernet::*;
pub use pdu::*;
pub use quality::*;
pub use time::*;
