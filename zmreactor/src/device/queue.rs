use super::{cross_wire, DeviceConfig, Relay, Side};
use crate::error::Result;
use crate::reactor::Reactor;
use crate::socket::Socket;
use tracing::info;
use zmreactor_core::address::Address;

/// Request/reply load balancer.
///
/// Clients (REQ or DEALER) connect to the incoming ROUTER socket; workers
/// (REP or DEALER) connect to the outgoing DEALER socket, which spreads
/// requests across them. The ROUTER prepends the client identity to each
/// request and the envelope rides along to the worker and back, so the reply
/// reaches the client that asked.
#[derive(Debug)]
pub struct Queue {
    reactor: Reactor,
    incoming: Socket,
    outgoing: Socket,
}

impl Queue {
    /// Open both sockets and bind them. Must run on the reactor's owning thread.
    #[track_caller]
    pub fn new(config: DeviceConfig) -> Result<Self> {
        Address::parse(&config.incoming_endpoint)?;
        Address::parse(&config.outgoing_endpoint)?;

        let reactor = config.reactor.clone();
        let (in_relay, in_peer) = Relay::new("queue", Side::Incoming, &config);
        let (out_relay, out_peer) = Relay::new("queue", Side::Outgoing, &config);

        let incoming = reactor.open_router_socket(in_relay)?;
        let outgoing = match reactor.open_dealer_socket(out_relay) {
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
            "queue started"
        );
        Ok(Self {
            reactor,
            incoming,
            outgoing,
        })
    }

    /// ROUTER socket clients connect to.
    #[must_use]
    pub fn incoming(&self) -> &Socket {
        &self.incoming
    }

    /// DEALER socket workers connect to.
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
