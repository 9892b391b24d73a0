//! # voltage_sv
//!
//! IEC 61850-9-2 Sampled Values subscriber for Rust.
//!
//! This crate captures SV frames from a network interface, decodes their
//! ASDUs and hands every ASDU to the listener subscribed to its APPID.
//!
//! ## Features
//!
//! - **Threaded capture**: one capture thread per receiver, stoppable at any time
//! - **Zero-copy decode**: ASDUs borrow the captured frame
//! - **Bounds-checked access**: typed big-endian readers over the data block
//! - **Async hand-off**: forward owned samples into a tokio channel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use voltage_sv::{Receiver, ReceiverConfig, Subscriber};
//!
//! fn main() -> voltage_sv::Result<()> {
//!     let mut receiver = Receiver::with_config(ReceiverConfig::new("eth0"));
//!
//!     receiver.add_subscriber(Subscriber::from_fn(0x4000, |_subscriber, _header, asdu| {
//!         let current = asdu.data().read_i32(0).unwrap_or_default();
//!         println!("{:?} smpCnt={} Ia={}", asdu.sv_id, asdu.smp_cnt, current);
//!     }));
//!
//!     receiver.start()?;
//!     std::thread::sleep(std::time::Duration::from_secs(10));
//!     receiver.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## Protocol Overview
//!
//! SV frames are sent on EtherType `0x88BA`, usually to a multicast address
//! in `01-0C-CD-04-00-00` .. `01-0C-CD-04-01-FF`:
//!
//! ```text
//! +----------+----------+------------+--------+-------+--------+--------+-------+
//! | Dst MAC  | Src MAC  | [802.1Q]   | 0x88BA | APPID | Length | Rsv1/2 | APDU  |
//! | 6 bytes  | 6 bytes  | 4 bytes    | 2      | 2     | 2      | 4      | BER   |
//! +----------+----------+------------+--------+-------+--------+--------+-------+
//! ```
//!
//! The APDU is a BER `savPdu` holding `noASDU`, an optional security element
//! and the sequence of ASDUs. The values of an ASDU are an opaque data block;
//! its layout is defined by the data set the publisher was configured with.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod accessor;
pub mod ber;
pub mod decoder;
pub mod error;
pub mod listener;
pub mod receiver;
pub mod registry;
pub mod source;
pub mod types;

#[cfg(test)]
mod test_utils;

// Re-export main types
pub use accessor::DataAccessor;
pub use decoder::{decode_frame, decode_pdu};
pub use error::{DecodeError, RangeError, Result, SvError};
pub use listener::{forwarding_channel, ForwardingListener, SampledValue, SvListener};
pub use receiver::{Receiver, ReceiverConfig, ReceiverState, ReceiverStats};
pub use registry::{AddressFilter, Subscriber, SubscriptionRegistry};
pub use source::{FrameFilter, FrameSource, SourceOpener, SourceOptions};
pub use types::*;
