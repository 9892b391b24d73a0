//! Raw link-layer capture through `pnet`.

use std::time::{Duration, Instant};

use bytes::BytesMut;
use pnet::datalink::{self, Channel, Config, DataLinkReceiver};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    classify_open_error, classify_read_error, is_timeout, FrameFilter, FrameSource, SourceOpener,
    SourceOptions,
};
use crate::error::{Result, SvError};

/// Opens [`PnetSource`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct PnetOpener;

impl SourceOpener for PnetOpener {
    fn open(&self, interface: &str, options: &SourceOptions) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(PnetSource::open(interface, options)?))
    }
}

/// Captures frames from a network interface.
///
/// Needs `CAP_NET_RAW` (or root) on Linux.
pub struct PnetSource {
    interface: String,
    rx: Option<Box<dyn DataLinkReceiver>>,
    filter: FrameFilter,
    buffer: BytesMut,
}

impl PnetSource {
    /// Open a capture on `interface`.
    pub fn open(interface: &str, options: &SourceOptions) -> Result<Self> {
        let iface = datalink::interfaces()
            .into_iter()
            .find(|i| i.name == interface)
            .ok_or_else(|| SvError::InterfaceNotFound(interface.to_owned()))?;

        let config = Config {
            read_timeout: Some(options.read_timeout),
            ..Default::default()
        };

        let rx = match datalink::channel(&iface, config) {
            Ok(Channel::Ethernet(_tx, rx)) => rx,
            #[allow(unreachable_patterns)]
            Ok(_) => {
                return Err(SvError::Configuration(format!(
                    "{interface}: not an Ethernet channel"
                )))
            }
            Err(e) => return Err(classify_open_error(interface, &e)),
        };

        debug!(interface, filter = ?options.filter, "capture opened");

        Ok(Self {
            interface: interface.to_owned(),
            rx: Some(rx),
            filter: options.filter,
            buffer: BytesMut::with_capacity(1536),
        })
    }
}

impl FrameSource for PnetSource {
    fn receive_next(
        &mut self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<&[u8]>> {
        let deadline = Instant::now() + timeout;
        let rx = self
            .rx
            .as_mut()
            .ok_or_else(|| SvError::fatal(format!("{}: capture closed", self.interface)))?;

        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }

            match rx.next() {
                Ok(frame) => {
                    if self.filter.matches(frame) {
                        self.buffer.clear();
                        self.buffer.extend_from_slice(frame);
                        break;
                    }
                }
                Err(e) if is_timeout(&e) => {}
                Err(e) => return Err(classify_read_error(&self.interface, &e)),
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
        }

        Ok(Some(&self.buffer[..]))
    }

    fn close(&mut self) {
        if self.rx.take().is_some() {
            debug!(interface = %self.interface, "capture closed");
        }
    }

    fn interface_name(&self) -> &str {
        &self.interface
    }
}

impl Drop for PnetSource {
    fn drop(&mut self) {
        self.close();
    }
}
