//! Subscription registry.
//!
//! Maps APPIDs to subscribers. At most one subscriber exists per APPID;
//! registering a second one replaces the first. The registry is shared
//! between the application and the capture thread, which looks up every
//! received frame.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::listener::SvListener;
use crate::types::{Asdu, MacAddress, SvHeader};

/// Optional link-layer address restriction of a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFilter {
    /// Only frames sent by this publisher
    Source(MacAddress),
    /// Only frames sent to this (multicast) address
    Destination(MacAddress),
}

impl AddressFilter {
    /// Check a frame header.
    pub fn matches(&self, header: &SvHeader) -> bool {
        match self {
            Self::Source(mac) => header.source == *mac,
            Self::Destination(mac) => header.destination == *mac,
        }
    }
}

/// Interest in one APPID together with its listener.
pub struct Subscriber {
    app_id: u16,
    filter: Option<AddressFilter>,
    listener: Box<dyn SvListener>,
}

impl Subscriber {
    /// Subscribe to `app_id`.
    pub fn new(app_id: u16, listener: impl SvListener + 'static) -> Self {
        Self {
            app_id,
            filter: None,
            listener: Box::new(listener),
        }
    }

    /// Subscribe to `app_id` with a closure.
    ///
    /// Same as [`Subscriber::new`], but lets the compiler infer the closure
    /// argument types.
    pub fn from_fn<F>(app_id: u16, f: F) -> Self
    where
        F: Fn(&Subscriber, &SvHeader, &Asdu<'_>) + Send + Sync + 'static,
    {
        Self::new(app_id, f)
    }

    /// Restrict the subscription to one link-layer address.
    pub fn with_filter(mut self, filter: AddressFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Subscribed APPID.
    #[inline]
    pub fn app_id(&self) -> u16 {
        self.app_id
    }

    /// Address restriction, if any.
    #[inline]
    pub fn filter(&self) -> Option<AddressFilter> {
        self.filter
    }

    /// Whether a frame with `header` is for this subscriber.
    pub fn accepts(&self, header: &SvHeader) -> bool {
        header.app_id == self.app_id && self.filter.map_or(true, |f| f.matches(header))
    }

    /// The listener.
    #[inline]
    pub fn listener(&self) -> &dyn SvListener {
        self.listener.as_ref()
    }

    /// Hand one ASDU to the listener, together with this subscriber.
    pub fn deliver(&self, header: &SvHeader, asdu: &Asdu<'_>) {
        self.listener.on_asdu(self, header, asdu)
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("app_id", &format_args!("0x{:04X}", self.app_id))
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

/// Thread-safe APPID to subscriber map.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    subscribers: RwLock<HashMap<u16, Arc<Subscriber>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber, returning the one it replaced.
    pub fn register(&self, subscriber: Subscriber) -> Option<Arc<Subscriber>> {
        self.subscribers
            .write()
            .insert(subscriber.app_id, Arc::new(subscriber))
    }

    /// Remove the subscriber for `app_id`.
    pub fn unregister(&self, app_id: u16) -> Option<Arc<Subscriber>> {
        self.subscribers.write().remove(&app_id)
    }

    /// Subscriber for `app_id`.
    ///
    /// The returned handle stays usable after the subscriber is removed or
    /// replaced; a listener call in progress always completes.
    pub fn lookup(&self, app_id: u16) -> Option<Arc<Subscriber>> {
        self.subscribers.read().get(&app_id).cloned()
    }

    pub fn contains(&self, app_id: u16) -> bool {
        self.subscribers.read().contains_key(&app_id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Registered APPIDs in ascending order.
    pub fn app_ids(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.subscribers.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Remove all subscribers.
    pub fn clear(&self) {
        self.subscribers.write().clear();
    }
}
