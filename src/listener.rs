//! Sample listeners.
//!
//! A listener is invoked on the capture thread once per ASDU of every
//! accepted frame. The [`Asdu`] it receives borrows the capture buffer and
//! cannot escape the call; listeners that need the sample later copy it
//! with [`Asdu::to_owned_asdu`].
//!
//! [`ForwardingListener`] does exactly that and hands the copies to async
//! code through a bounded tokio channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::registry::Subscriber;
use crate::types::{Asdu, OwnedAsdu, SvHeader};

/// Default capacity of [`forwarding_channel`].
pub const DEFAULT_FORWARD_CAPACITY: usize = 100;

/// Callback for decoded ASDUs.
///
/// Runs on the capture thread: a slow listener delays all following
/// frames. Implemented for every `Fn(&Subscriber, &SvHeader, &Asdu<'_>)`
/// closure; state the listener needs travels in the closure captures.
pub trait SvListener: Send + Sync {
    /// Handle one ASDU of a frame accepted by `subscriber`.
    fn on_asdu(&self, subscriber: &Subscriber, header: &SvHeader, asdu: &Asdu<'_>);
}

impl<F> SvListener for F
where
    F: Fn(&Subscriber, &SvHeader, &Asdu<'_>) + Send + Sync,
{
    fn on_asdu(&self, subscriber: &Subscriber, header: &SvHeader, asdu: &Asdu<'_>) {
        self(subscriber, header, asdu)
    }
}

/// One received sample, detached from the capture buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledValue {
    /// Header of the frame the ASDU arrived in
    pub header: SvHeader,
    /// The ASDU itself
    pub asdu: OwnedAsdu,
}

/// Listener that forwards owned copies into a tokio channel.
///
/// Never blocks the capture thread: when the channel is full the sample is
/// dropped and counted.
#[derive(Debug, Clone)]
pub struct ForwardingListener {
    tx: mpsc::Sender<SampledValue>,
    dropped: Arc<AtomicU64>,
}

impl ForwardingListener {
    /// Forward into `tx`.
    pub fn new(tx: mpsc::Sender<SampledValue>) -> Self {
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Samples dropped because the channel was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl SvListener for ForwardingListener {
    fn on_asdu(&self, _subscriber: &Subscriber, header: &SvHeader, asdu: &Asdu<'_>) {
        let sample = SampledValue {
            header: *header,
            asdu: asdu.to_owned_asdu(),
        };

        match self.tx.try_send(sample) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped % 1000 == 0 {
                    warn!(app_id = header.app_id, dropped, "Sample channel full, dropping");
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(app_id = header.app_id, "Sample channel closed");
            }
        }
    }
}

/// Create a forwarding listener and the receiving end of its channel.
pub fn forwarding_channel(capacity: usize) -> (ForwardingListener, mpsc::Receiver<SampledValue>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ForwardingListener::new(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode_frame;
    use crate::test_utils::reference_frame;
    use std::sync::Mutex;

    #[test]
    fn test_closure_listener() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in = Arc::clone(&seen);
        let subscriber = Subscriber::from_fn(0x4000, move |subscriber, header, asdu| {
            seen_in
                .lock()
                .unwrap()
                .push((subscriber.app_id(), header.app_id, asdu.smp_cnt));
        });

        let frame = reference_frame(0x4000);
        let pdu = decode_frame(&frame).unwrap();
        subscriber.deliver(&pdu.header, &pdu.asdus[0]);

        assert_eq!(*seen.lock().unwrap(), vec![(0x4000, 0x4000, 100)]);
    }

    #[test]
    fn test_forwarding_listener() {
        let (listener, mut rx) = forwarding_channel(4);
        let subscriber = Subscriber::new(0x4000, listener);

        let frame = reference_frame(0x4000);
        let pdu = decode_frame(&frame).unwrap();
        subscriber.deliver(&pdu.header, &pdu.asdus[0]);
        drop(pdu);
        drop(frame);

        let sample = tokio_test::block_on(rx.recv()).unwrap();
        assert_eq!(sample.header.app_id, 0x4000);
        assert_eq!(sample.asdu.sv_id.as_deref(), Some("SMP1"));
        assert_eq!(sample.asdu.data().read_i32(0).unwrap(), 42);
    }

    #[test]
    fn test_forwarding_drops_when_full() {
        let (listener, mut rx) = forwarding_channel(1);
        let subscriber = Subscriber::new(0x4000, listener.clone());

        let frame = reference_frame(0x4000);
        let pdu = decode_frame(&frame).unwrap();
        for _ in 0..3 {
            subscriber.deliver(&pdu.header, &pdu.asdus[0]);
        }

        assert_eq!(listener.dropped(), 2);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_forwarding_after_close() {
        let (listener, rx) = forwarding_channel(1);
        let subscriber = Subscriber::new(0x4000, listener.clone());
        drop(rx);

        let frame = reference_frame(0x4000);
        let pdu = decode_frame(&frame).unwrap();
        subscriber.deliver(&pdu.header, &pdu.asdus[0]);
        assert_eq!(listener.dropped(), 0);
    }
}
