use super::{cross_wire, DeviceConfig, Relay, Side};
use crate::error::Result;
use crate::reactor::Reactor;
use crate::socket::Socket;
use tracing::info;
use zmreactor_core::address::Address;

/// Publish/subscribe bus.
///
/// Publishers connect to the incoming address, subscribers to the outgoing
/// one. Every message matching the configured topic is republished verbatim.
///
/// # Example
///
/// ```no_run
/// use zmreactor::prelude::*;
///
/// let reactor = Reactor::new(ReactorConfig::new("bus"));
/// reactor.run(|reactor| {
///     Forwarder::new(DeviceConfig::new(reactor.clone(), "tcp://*:5555", "tcp://*:5556"))?;
///     Ok(())
/// })?;
/// # Ok::<(), zmreactor::ReactorError>(())
/// ```
#[derive(Debug)]
pub struct Forwarder {
    reactor: Reactor,
    incoming: Socket,
    outgoing: Socket,
}

impl Forwarder {
    /// Open both sockets and bind them. Must run on the reactor's owning thread.
    #[track_caller]
    pub fn new(config: DeviceConfig) -> Result<Self> {
        Address::parse(&config.incoming_endpoint)?;
        Address::parse(&config.outgoing_endpoint)?;

        let reactor = config.reactor.clone();
        let (in_relay, in_peer) = Relay::new("forwarder", Side::Incoming, &config);
        let (out_relay, out_peer) = Relay::new("forwarder", Side::Outgoing, &config);

        let incoming = reactor.open_sub_socket(in_relay)?;
        let outgoing = match reactor.open_pub_socket(out_relay) {
            Ok(socket) => socket,
            Err(e) => {
                reactor.close_socket(&incoming);
                return Err(e);
            }
        };
        cross_wire(&incoming, &in_peer, &outgoing, &out_peer);

        info!(
            reactor = reactor.name(),
            incoming = %config.incoming_endpoint,
            outgoing = %config.outgoing_endpoint,
            "forwarder started"
        );
        Ok(Self {
            reactor,
            incoming,
            outgoing,
        })
    }

    /// Subscriber socket publishers connect to.
    #[must_use]
    pub fn incoming(&self) -> &Socket {
        &self.incoming
    }

    /// Publisher socket subscribers connect to.
    #[must_use]
    pub fn outgoing(&self) -> &Socket {
        &self.outgoing
    }

    /// Close both sockets. Returns `true` if both were open.
    #[track_caller]
    pub fn close(&self) -> bool {
        let incoming = self.reactor.close_socket(&self.incoming);
        let outgoing = self.reactor.close_socket(&self.outgoing);
        incoming && outgoing
    }
}
