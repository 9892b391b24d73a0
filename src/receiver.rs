//! SV receiver.
//!
//! The receiver owns the subscription registry and one capture thread.
//! Lifecycle:
//!
//! ```text
//! Created --set_interface--> Configured --start--> Running --stop--> Stopped
//!                                 ^                                    |
//!                                 +------------set_interface-----------+
//! ```
//!
//! Opening the frame source is deferred to [`Receiver::start`], so bad
//! interfaces and missing privileges are reported there. A fatal capture
//! error ends the capture thread; the receiver then reports
//! [`ReceiverState::Stopped`] and keeps the error in
//! [`Receiver::last_error`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::decoder::decode_pdu;
use crate::error::{Result, SvError};
use crate::registry::{Subscriber, SubscriptionRegistry};
use crate::source::{FrameFilter, FrameSource, PnetOpener, SourceOpener, SourceOptions};
use crate::types::{MacAddress, SvHeader};

/// Interface used when the application does not name one.
pub const DEFAULT_INTERFACE: &str = "eth0";

/// Default upper bound of one receive call.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(100);

/// Default time transient capture errors may persist before capture is
/// abandoned.
pub const DEFAULT_MAX_ERROR_DURATION: Duration = Duration::from_secs(5);

/// First pause after a transient capture error; doubles up to the receive
/// timeout while errors continue.
const RETRY_BACKOFF: Duration = Duration::from_millis(5);

/// Longest sleep before the cancellation token is checked again.
const CANCEL_POLL: Duration = Duration::from_millis(10);

/// Receiver configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverConfig {
    /// Network interface to capture on
    pub interface: String,
    /// Longest wait for one frame; also bounds how long `stop()` takes
    pub receive_timeout: Duration,
    /// Only capture frames sent to this multicast address
    pub destination: Option<MacAddress>,
    /// How long transient capture errors may go on without a successful
    /// receive before capture is abandoned
    pub max_error_duration: Duration,
}

impl ReceiverConfig {
    /// Create a new configuration for `interface`.
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            destination: None,
            max_error_duration: DEFAULT_MAX_ERROR_DURATION,
        }
    }

    /// Set receive timeout.
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Set multicast destination filter.
    pub fn destination(mut self, mac: MacAddress) -> Self {
        self.destination = Some(mac);
        self
    }

    /// Set how long transient capture errors are tolerated.
    pub fn max_error_duration(mut self, duration: Duration) -> Self {
        self.max_error_duration = duration;
        self
    }

    /// Options handed to the frame source.
    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            filter: FrameFilter {
                destination: self.destination,
                ..FrameFilter::sampled_values()
            },
            read_timeout: self.receive_timeout,
        }
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INTERFACE)
    }
}

/// Receiver lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// No interface bound
    Created,
    /// Interface selected, nothing opened
    Configured,
    /// Capture thread active
    Running,
    /// Capture thread ended
    Stopped,
}

/// Snapshot of receiver counters.
///
/// Counters accumulate over the lifetime of the receiver, across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceiverStats {
    /// Frames returned by the frame source
    pub frames_received: u64,
    /// Frames dropped because they failed to decode
    pub decode_errors: u64,
    /// Frames for APPIDs without subscriber
    pub frames_unsubscribed: u64,
    /// Frames rejected by a subscriber's address filter
    pub frames_filtered: u64,
    /// ASDUs handed to listeners
    pub asdus_dispatched: u64,
    /// Listener calls that panicked
    pub listener_panics: u64,
    /// Transient capture errors
    pub transient_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    frames_received: AtomicU64,
    decode_errors: AtomicU64,
    frames_unsubscribed: AtomicU64,
    frames_filtered: AtomicU64,
    asdus_dispatched: AtomicU64,
    listener_panics: AtomicU64,
    transient_errors: AtomicU64,
}

impl Counters {
    #[inline]
    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ReceiverStats {
        ReceiverStats {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            frames_unsubscribed: self.frames_unsubscribed.load(Ordering::Relaxed),
            frames_filtered: self.frames_filtered.load(Ordering::Relaxed),
            asdus_dispatched: self.asdus_dispatched.load(Ordering::Relaxed),
            listener_panics: self.listener_panics.load(Ordering::Relaxed),
            transient_errors: self.transient_errors.load(Ordering::Relaxed),
        }
    }
}

/// State shared with the capture thread.
#[derive(Debug, Default)]
struct Shared {
    running: AtomicBool,
    last_error: Mutex<Option<SvError>>,
    counters: Counters,
}

impl Shared {
    fn record_error(&self, err: SvError) {
        *self.last_error.lock() = Some(err);
    }
}

/// Clears the running flag when the capture thread exits, even by panic.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// IEC 61850-9-2 Sampled Values receiver.
pub struct Receiver {
    config: Option<ReceiverConfig>,
    state: ReceiverState,
    opener: Arc<dyn SourceOpener>,
    registry: Arc<SubscriptionRegistry>,
    shared: Arc<Shared>,
    worker: Option<Worker>,
}

impl Receiver {
    /// Create a receiver capturing through `pnet`.
    pub fn new() -> Self {
        Self::with_opener(PnetOpener)
    }

    /// Create a configured receiver capturing through `pnet`.
    pub fn with_config(config: ReceiverConfig) -> Self {
        let mut receiver = Self::new();
        receiver.config = Some(config);
        receiver.state = ReceiverState::Configured;
        receiver
    }

    /// Create a receiver reading from a custom frame source.
    pub fn with_opener(opener: impl SourceOpener + 'static) -> Self {
        Self {
            config: None,
            state: ReceiverState::Created,
            opener: Arc::new(opener),
            registry: Arc::new(SubscriptionRegistry::new()),
            shared: Arc::new(Shared::default()),
            worker: None,
        }
    }

    /// Select the capture interface, keeping other settings.
    ///
    /// Nothing is opened until [`Receiver::start`].
    pub fn set_interface(&mut self, interface: impl Into<String>) -> Result<()> {
        let interface = interface.into();
        let config = match &self.config {
            Some(config) => ReceiverConfig {
                interface,
                ..config.clone()
            },
            None => ReceiverConfig::new(interface),
        };
        self.set_config(config)
    }

    /// Replace the whole configuration.
    pub fn set_config(&mut self, config: ReceiverConfig) -> Result<()> {
        if self.state() == ReceiverState::Running {
            return Err(SvError::InvalidState("cannot reconfigure a running receiver"));
        }
        self.reap();
        self.config = Some(config);
        self.state = ReceiverState::Configured;
        Ok(())
    }

    /// Current configuration.
    pub fn config(&self) -> Option<&ReceiverConfig> {
        self.config.as_ref()
    }

    /// Open the frame source and spawn the capture thread.
    ///
    /// On failure the receiver stays `Configured` and the error is returned
    /// (and kept in [`Receiver::last_error`]).
    pub fn start(&mut self) -> Result<()> {
        match self.state() {
            ReceiverState::Created => return Err(SvError::NotConfigured),
            ReceiverState::Running => {
                return Err(SvError::InvalidState("receiver already running"))
            }
            ReceiverState::Configured | ReceiverState::Stopped => {}
        }
        self.reap();

        let config = self.config.clone().ok_or(SvError::NotConfigured)?;
        let source = match self.opener.open(&config.interface, &config.source_options()) {
            Ok(source) => source,
            Err(e) => {
                warn!(interface = %config.interface, error = %e, "Failed to open frame source");
                self.shared.record_error(e.clone());
                self.state = ReceiverState::Configured;
                return Err(e);
            }
        };

        *self.shared.last_error.lock() = None;
        self.shared.running.store(true, Ordering::Release);

        let cancel = CancellationToken::new();
        let capture = CaptureLoop {
            source,
            registry: Arc::clone(&self.registry),
            shared: Arc::clone(&self.shared),
            cancel: cancel.clone(),
            timeout: config.receive_timeout,
            max_error_duration: config.max_error_duration,
        };

        let handle = thread::Builder::new()
            .name(format!("sv-capture-{}", config.interface))
            .spawn(move || capture.run())
            .map_err(|e| {
                self.shared.running.store(false, Ordering::Release);
                SvError::Internal(format!("failed to spawn capture thread: {e}"))
            })?;

        self.worker = Some(Worker { cancel, handle });
        self.state = ReceiverState::Running;
        info!(interface = %config.interface, "SV receiver started");
        Ok(())
    }

    /// Stop capturing and wait for the capture thread to exit.
    ///
    /// Does nothing when the receiver is not running. After this returns no
    /// listener is invoked any more.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        worker.cancel.cancel();
        if worker.handle.join().is_err() {
            error!("SV capture thread panicked");
        }
        self.state = ReceiverState::Stopped;
        info!(
            interface = self.config.as_ref().map(|c| c.interface.as_str()),
            "SV receiver stopped"
        );
    }

    /// Join a capture thread that already ended on its own.
    fn reap(&mut self) {
        if self.worker.is_some() && !self.shared.running.load(Ordering::Acquire) {
            self.stop();
        }
    }

    /// Whether the capture thread is active.
    pub fn is_running(&self) -> bool {
        self.state() == ReceiverState::Running
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ReceiverState {
        if self.state == ReceiverState::Running && !self.shared.running.load(Ordering::Acquire) {
            ReceiverState::Stopped
        } else {
            self.state
        }
    }

    /// Error that ended the last capture or failed the last start.
    pub fn last_error(&self) -> Option<SvError> {
        self.shared.last_error.lock().clone()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> ReceiverStats {
        self.shared.counters.snapshot()
    }

    /// Register a subscriber, replacing any on the same APPID.
    ///
    /// Allowed while running; takes effect from the next frame.
    pub fn add_subscriber(&self, subscriber: Subscriber) -> Option<Arc<Subscriber>> {
        let app_id = subscriber.app_id();
        let replaced = self.registry.register(subscriber);
        debug!(app_id, replaced = replaced.is_some(), "Subscriber added");
        replaced
    }

    /// Remove the subscriber of `app_id`.
    pub fn remove_subscriber(&self, app_id: u16) -> Option<Arc<Subscriber>> {
        let removed = self.registry.unregister(app_id);
        debug!(app_id, removed = removed.is_some(), "Subscriber removed");
        removed
    }

    /// The subscription registry.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }
}

impl Default for Receiver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if self.shared.running.load(Ordering::Acquire) {
                error!(
                    interface = self.config.as_ref().map(|c| c.interface.as_str()),
                    "SV receiver dropped while running, stopping capture thread"
                );
            }
            self.stop();
        }
    }
}

/// Body of the capture thread.
struct CaptureLoop {
    source: Box<dyn FrameSource>,
    registry: Arc<SubscriptionRegistry>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    timeout: Duration,
    max_error_duration: Duration,
}

impl CaptureLoop {
    fn run(mut self) {
        let shared = Arc::clone(&self.shared);
        let _running = RunningGuard(&shared.running);
        let interface = self.source.interface_name().to_owned();
        debug!(interface = %interface, "Capture loop started");

        // Start of the current run of transient errors
        let mut failing_since: Option<Instant> = None;
        let mut backoff = RETRY_BACKOFF;
        while !self.cancel.is_cancelled() {
            match self.source.receive_next(self.timeout, &self.cancel) {
                Ok(frame) => {
                    if let Some(since) = failing_since.take() {
                        info!(interface = %interface, failed_for = ?since.elapsed(), "Capture recovered");
                        backoff = RETRY_BACKOFF;
                    }
                    if let Some(frame) = frame {
                        dispatch(frame, &self.registry, &shared.counters);
                    }
                }
                Err(e) if e.is_retryable() => {
                    Counters::incr(&shared.counters.transient_errors);
                    if failing_since.is_none() {
                        warn!(interface = %interface, error = %e, "Transient capture error");
                    }
                    let since = *failing_since.get_or_insert_with(Instant::now);

                    let failed_for = since.elapsed();
                    if failed_for > self.max_error_duration {
                        error!(
                            interface = %interface,
                            error = %e,
                            failed_for = ?failed_for,
                            "Transient capture errors persisted, giving up"
                        );
                        shared.record_error(SvError::fatal(format!(
                            "transient capture errors for {failed_for:?}, last: {e}"
                        )));
                        break;
                    }

                    debug!(interface = %interface, error = %e, backoff = ?backoff, "Retrying capture");
                    pause(backoff.min(self.timeout), &self.cancel);
                    backoff = (backoff * 2).min(self.timeout);
                }
                Err(e) => {
                    error!(interface = %interface, error = %e, "Capture failed");
                    shared.record_error(e);
                    break;
                }
            }
        }

        self.source.close();
        debug!(interface = %interface, "Capture loop exited");
    }
}

/// Sleep for `duration`, returning early once `cancel` fires.
fn pause(duration: Duration, cancel: &CancellationToken) {
    let deadline = Instant::now() + duration;
    while !cancel.is_cancelled() {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(CANCEL_POLL.min(deadline - now));
    }
}

/// Route one captured frame to its subscriber.
///
/// The header is parsed first so that traffic for unsubscribed APPIDs is
/// never decoded further. The PDU is decoded completely before the first
/// listener call; a malformed frame produces no callback at all.
fn dispatch(frame: &[u8], registry: &SubscriptionRegistry, counters: &Counters) {
    Counters::incr(&counters.frames_received);

    let (header, apdu) = match SvHeader::parse(frame) {
        Ok(parsed) => parsed,
        Err(e) => {
            Counters::incr(&counters.decode_errors);
            debug!(error = %e, "Dropping malformed frame");
            return;
        }
    };

    let Some(subscriber) = registry.lookup(header.app_id) else {
        Counters::incr(&counters.frames_unsubscribed);
        return;
    };
    if !subscriber.accepts(&header) {
        Counters::incr(&counters.frames_filtered);
        return;
    }

    let pdu = match decode_pdu(header, apdu) {
        Ok(pdu) => pdu,
        Err(e) => {
            Counters::incr(&counters.decode_errors);
            debug!(app_id = header.app_id, error = %e, "Dropping malformed frame");
            return;
        }
    };

    for asdu in &pdu.asdus {
        let call = panic::catch_unwind(AssertUnwindSafe(|| {
            subscriber.deliver(&pdu.header, asdu)
        }));
        match call {
            Ok(()) => Counters::incr(&counters.asdus_dispatched),
            Err(payload) => {
                Counters::incr(&counters.listener_panics);
                error!(
                    app_id = header.app_id,
                    smp_cnt = asdu.smp_cnt,
                    panic = panic_message(&*payload),
                    "Listener panicked"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
