//! In-process frame source fed through a channel.
//!
//! Used to replay recorded traffic and to drive the receiver in tests
//! without capture privileges.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{FrameFilter, FrameSource, SourceOpener, SourceOptions};
use crate::error::{Result, SvError};

/// Sending half handed out by [`frame_channel`].
pub type FrameSender = Sender<Bytes>;

/// Longest single wait before the cancellation token is checked again.
const POLL_SLICE: Duration = Duration::from_millis(10);

/// Create a connected frame sender and source opener.
///
/// Every source opened from the returned opener reads from the same
/// channel, so a receiver can be stopped and started again without losing
/// the sender. Dropping all senders makes the open source fail fatally.
pub fn frame_channel() -> (FrameSender, ChannelOpener) {
    let (tx, rx) = mpsc::channel();
    let opener = ChannelOpener {
        rx: Arc::new(Mutex::new(rx)),
        interface: None,
    };
    (tx, opener)
}

/// Opens [`ChannelSource`]s.
#[derive(Clone)]
pub struct ChannelOpener {
    rx: Arc<Mutex<Receiver<Bytes>>>,
    interface: Option<String>,
}

impl ChannelOpener {
    /// Only accept `interface` when opening; any other name is reported
    /// as not found.
    pub fn restrict_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }
}

impl std::fmt::Debug for ChannelOpener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelOpener")
            .field("interface", &self.interface)
            .finish_non_exhaustive()
    }
}

impl SourceOpener for ChannelOpener {
    fn open(&self, interface: &str, options: &SourceOptions) -> Result<Box<dyn FrameSource>> {
        if let Some(expected) = &self.interface {
            if expected != interface {
                return Err(SvError::InterfaceNotFound(interface.to_owned()));
            }
        }
        debug!(interface, "channel source opened");

        Ok(Box::new(ChannelSource {
            interface: interface.to_owned(),
            rx: Some(Arc::clone(&self.rx)),
            filter: options.filter,
            current: Bytes::new(),
        }))
    }
}

/// Frame source reading from an in-process channel.
pub struct ChannelSource {
    interface: String,
    rx: Option<Arc<Mutex<Receiver<Bytes>>>>,
    filter: FrameFilter,
    current: Bytes,
}

impl FrameSource for ChannelSource {
    fn receive_next(
        &mut self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<&[u8]>> {
        let rx = self
            .rx
            .as_ref()
            .ok_or_else(|| SvError::fatal(format!("{}: source closed", self.interface)))?;
        let deadline = Instant::now() + timeout;
        let rx = rx.lock();

        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            match rx.recv_timeout(POLL_SLICE.min(deadline - now)) {
                Ok(frame) if self.filter.matches(&frame) => {
                    self.current = frame;
                    break;
                }
                Ok(_) => {}
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(SvError::fatal(format!(
                        "{}: frame channel disconnected",
                        self.interface
                    )));
                }
            }
        }

        drop(rx);
        Ok(Some(&self.current[..]))
    }

    fn close(&mut self) {
        if self.rx.take().is_some() {
            debug!(interface = %self.interface, "channel source closed");
        }
    }

    fn interface_name(&self) -> &str {
        &self.interface
    }
}
