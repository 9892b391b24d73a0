//! Frame sources.
//!
//! A frame source yields raw Ethernet frames from one interface. The
//! receiver only depends on the [`FrameSource`] and [`SourceOpener`] traits,
//! so capture backends can be swapped:
//!
//! - [`PnetSource`] - raw link-layer capture through `pnet`
//! - [`ChannelSource`] - frames injected through a channel (replay, tests)
//!
//! Sources drop everything that does not pass their [`FrameFilter`] before
//! the frame reaches the decoder.

mod channel;
mod pnet_capture;

pub use self::channel::{frame_channel, ChannelOpener, ChannelSource, FrameSender};
pub use self::pnet_capture::{PnetOpener, PnetSource};

use std::io;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{Result, SvError};
use crate::types::{MacAddress, SV_ETHER_TYPE, VLAN_ETHER_TYPE};

/// Link-layer filter applied by a frame source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFilter {
    /// Accepted EtherType (after an optional VLAN tag)
    pub ether_type: u16,
    /// Accepted destination address (any if `None`)
    pub destination: Option<MacAddress>,
}

impl FrameFilter {
    /// Accept all Sampled Values frames.
    pub const fn sampled_values() -> Self {
        Self {
            ether_type: SV_ETHER_TYPE,
            destination: None,
        }
    }

    /// Only accept frames sent to `mac`.
    pub const fn destination(mut self, mac: MacAddress) -> Self {
        self.destination = Some(mac);
        self
    }

    /// Check a raw frame.
    pub fn matches(&self, frame: &[u8]) -> bool {
        if frame.len() < 14 {
            return false;
        }
        if let Some(destination) = &self.destination {
            if frame[..6] != destination.0 {
                return false;
            }
        }

        let mut pos = 12;
        let mut ether_type = u16::from_be_bytes([frame[pos], frame[pos + 1]]);
        if ether_type == VLAN_ETHER_TYPE {
            pos += 4;
            if frame.len() < pos + 2 {
                return false;
            }
            ether_type = u16::from_be_bytes([frame[pos], frame[pos + 1]]);
        }
        ether_type == self.ether_type
    }
}

impl Default for FrameFilter {
    fn default() -> Self {
        Self::sampled_values()
    }
}

/// Options handed to a source when it is opened.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// Link-layer filter
    pub filter: FrameFilter,
    /// Upper bound of one blocking read inside the backend
    pub read_timeout: Duration,
}

/// Source of raw Ethernet frames.
pub trait FrameSource: Send {
    /// Wait up to `timeout` for the next frame that passes the filter.
    ///
    /// Returns `Ok(None)` on timeout or when `cancel` fires. The returned
    /// slice is only valid until the next call.
    fn receive_next(&mut self, timeout: Duration, cancel: &CancellationToken)
        -> Result<Option<&[u8]>>;

    /// Release OS resources. Calling it again has no effect.
    fn close(&mut self);

    /// Name of the interface this source reads from.
    fn interface_name(&self) -> &str;
}

/// Opens frame sources by interface name.
pub trait SourceOpener: Send + Sync {
    /// Open `interface`.
    ///
    /// Fails with a configuration error when the interface does not exist
    /// or the process lacks capture privileges.
    fn open(&self, interface: &str, options: &SourceOptions) -> Result<Box<dyn FrameSource>>;
}

/// OS errors after which reading may simply be retried.
#[cfg(target_os = "linux")]
const TRANSIENT_OS_ERRORS: &[i32] = &[
    100, // ENETDOWN
    105, // ENOBUFS
];

#[cfg(not(target_os = "linux"))]
const TRANSIENT_OS_ERRORS: &[i32] = &[];

/// Read timed out without data.
pub(crate) fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

/// Map a read error of an open capture to a transient or fatal error.
pub(crate) fn classify_read_error(interface: &str, err: &io::Error) -> SvError {
    let transient = err.kind() == io::ErrorKind::Interrupted
        || err
            .raw_os_error()
            .is_some_and(|code| TRANSIENT_OS_ERRORS.contains(&code));

    let message = format!("{interface}: {err}");
    if transient {
        SvError::transient(message)
    } else {
        SvError::fatal(message)
    }
}

/// Map an error from opening a capture to a configuration error.
pub(crate) fn classify_open_error(interface: &str, err: &io::Error) -> SvError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => SvError::PermissionDenied(interface.to_owned()),
        io::ErrorKind::NotFound => SvError::InterfaceNotFound(interface.to_owned()),
        _ => SvError::Configuration(format!("{interface}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::reference_frame;

    #[test]
    fn test_filter_ether_type() {
        let filter = FrameFilter::sampled_values();
        let frame = reference_frame(0x4000);
        assert!(filter.matches(&frame));

        let mut goose = frame.to_vec();
        goose[13] = 0xB8;
        assert!(!filter.matches(&goose));
        assert!(!filter.matches(&frame[..10]));
    }

    #[test]
    fn test_filter_vlan() {
        use crate::test_utils::FrameBuilder;

        let frame = FrameBuilder::new(0x4000).vlan(0x8001).build();
        assert!(FrameFilter::sampled_values().matches(&frame));
        assert!(!FrameFilter::sampled_values().matches(&frame[..16]));
    }

    #[test]
    fn test_filter_destination() {
        let frame = reference_frame(0x4000);
        let ours = MacAddress::new([0x01, 0x0C, 0xCD, 0x04, 0x00, 0x01]);
        let other = MacAddress::new([0x01, 0x0C, 0xCD, 0x04, 0x00, 0x02]);

        assert!(FrameFilter::sampled_values().destination(ours).matches(&frame));
        assert!(!FrameFilter::sampled_values().destination(other).matches(&frame));
    }

    #[test]
    fn test_classify_errors() {
        let err = io::Error::from(io::ErrorKind::Interrupted);
        assert!(classify_read_error("eth0", &err).is_retryable());

        let err = io::Error::new(io::ErrorKind::Other, "device removed");
        let classified = classify_read_error("eth0", &err);
        assert!(classified.is_fatal());
        assert_eq!(
            classified.to_string(),
            "Capture error: eth0: device removed"
        );

        let err = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(
            classify_open_error("eth0", &err),
            SvError::PermissionDenied("eth0".into())
        );

        assert!(is_timeout(&io::Error::from(io::ErrorKind::TimedOut)));
        assert!(!is_timeout(&io::Error::from(io::ErrorKind::Interrupted)));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_classify_enobufs_transient() {
        let err = io::Error::from_raw_os_error(105);
        assert!(classify_read_error("eth0", &err).is_retryable());
    }
}
