//! Device configuration.

use crate::reactor::Reactor;
use bytes::Bytes;
use std::time::Duration;
use zmreactor_core::options::SocketOptions;

/// High water mark applied to both device sockets by default.
pub const DEFAULT_DEVICE_HWM: i32 = 1;

/// Configuration shared by [`Forwarder`](super::Forwarder) and
/// [`Queue`](super::Queue).
///
/// # Examples
///
/// ```no_run
/// use zmreactor::prelude::*;
///
/// let reactor = Reactor::new(ReactorConfig::new("bus"));
/// let config = DeviceConfig::new(reactor, "tcp://*:5555", "tcp://*:5556")
///     .with_topic("quotes.")
///     .with_verbose(true);
/// assert_eq!(config.hwm, 1);
/// ```
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Reactor that owns the device's sockets
    pub reactor: Reactor,

    /// Address the incoming socket binds to
    pub incoming_endpoint: String,

    /// Address the outgoing socket binds to
    pub outgoing_endpoint: String,

    /// Subscription filter for the forwarder's incoming side. Empty accepts
    /// everything. Ignored by the queue.
    pub topic: Bytes,

    /// Send and receive high water mark (default 1)
    pub hwm: i32,

    /// Linger for both sockets (default zero: discard on close)
    pub linger: Duration,

    /// Log every forwarded frame at `info`
    pub verbose: bool,
}

impl DeviceConfig {
    /// Create a configuration with default options.
    pub fn new(
        reactor: Reactor,
        incoming_endpoint: impl Into<String>,
        outgoing_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            reactor,
            incoming_endpoint: incoming_endpoint.into(),
            outgoing_endpoint: outgoing_endpoint.into(),
            topic: Bytes::new(),
            hwm: DEFAULT_DEVICE_HWM,
            linger: Duration::ZERO,
            verbose: false,
        }
    }

    /// Set the subscription filter.
    pub fn with_topic(mut self, topic: impl Into<Bytes>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Set the high water mark.
    pub fn with_hwm(mut self, hwm: i32) -> Self {
        self.hwm = hwm;
        self
    }

    /// Set the linger.
    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    /// Enable or disable per-frame logging.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Socket options applied to both device sockets before they bind.
    #[must_use]
    pub fn socket_options(&self) -> SocketOptions {
        SocketOptions::new()
            .with_hwm(self.hwm)
            .with_linger(self.linger)
    }
}
