//! Routing devices built from two reactor sockets.
//!
//! A device binds an incoming and an outgoing socket and relays every message
//! read on one side to the other:
//!
//! ```text
//! Forwarder: publishers → SUB (incoming) → PUB (outgoing) → subscribers
//! Queue:     clients    → ROUTER (incoming) ⇄ DEALER (outgoing) ⇄ workers
//! ```
//!
//! Routing envelopes travel with the message, so replies passing back
//! through a queue reach the client that sent the request.
//!
//! Devices live on their reactor: create them on the owning thread
//! (typically in the `run` setup closure). Stopping the reactor tears them
//! down with its other sockets.

pub mod config;
mod forwarder;
mod queue;

pub use config::DeviceConfig;
pub use forwarder::Forwarder;
pub use queue::Queue;

use crate::handler::{Handler, HandlerResult, ReadableHandler, WritableHandler};
use crate::reactor::Reactor;
use crate::socket::{Socket, WeakSocket};
use bytes::Bytes;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use zmreactor_core::message::{render_envelope, render_frame};
use zmreactor_core::options::SocketOptions;
use zmreactor_core::pattern::Pattern;

/// Which side of a device a relay serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Incoming,
    Outgoing,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incoming => f.write_str("in"),
            Self::Outgoing => f.write_str("out"),
        }
    }
}

/// Slot for the opposite socket, filled once both sockets exist.
pub(crate) type Peer = Arc<OnceCell<WeakSocket>>;

/// Handler for one device socket: binds on attach, relays reads to the peer.
pub(crate) struct Relay {
    device: &'static str,
    side: Side,
    reactor: Reactor,
    address: String,
    options: SocketOptions,
    topic: Bytes,
    verbose: bool,
    peer: Peer,
}

impl Relay {
    pub(crate) fn new(device: &'static str, side: Side, config: &DeviceConfig) -> (Self, Peer) {
        let address = match side {
            Side::Incoming => config.incoming_endpoint.clone(),
            Side::Outgoing => config.outgoing_endpoint.clone(),
        };
        let peer = Peer::default();
        let relay = Self {
            device,
            side,
            reactor: config.reactor.clone(),
            address,
            options: config.socket_options(),
            topic: config.topic.clone(),
            verbose: config.verbose,
            peer: Arc::clone(&peer),
        };
        (relay, peer)
    }

    fn log_frames(&self, envelope: &[Bytes], parts: &[Bytes]) {
        let body: Vec<_> = parts.iter().map(|p| render_frame(p)).collect();
        info!(
            device = self.device,
            side = %self.side,
            envelope = %render_envelope(envelope),
            frames = ?body,
            "relaying message"
        );
    }
}

/// Wire two relays together once both sockets are open.
pub(crate) fn cross_wire(incoming: &Socket, in_peer: &Peer, outgoing: &Socket, out_peer: &Peer) {
    let _ = in_peer.set(outgoing.downgrade());
    let _ = out_peer.set(incoming.downgrade());
}

impl Handler for Relay {
    fn on_attach(&mut self, socket: &Socket) -> HandlerResult {
        socket.apply_options(&self.options)?;
        socket.bind(&self.address)?;
        if socket.pattern() == Pattern::Subscriber {
            socket.subscribe(&self.topic)?;
        }
        debug!(device = self.device, side = %self.side, socket = %socket, address = %self.address, "device socket ready");
        Ok(())
    }
}

impl ReadableHandler for Relay {
    fn on_readable(
        &mut self,
        socket: &Socket,
        parts: Vec<Bytes>,
        envelope: Option<Vec<Bytes>>,
    ) -> HandlerResult {
        let envelope = envelope.unwrap_or_default();
        if self.verbose {
            self.log_frames(&envelope, &parts);
        }

        let Some(peer) = self.peer.get().and_then(WeakSocket::upgrade) else {
            debug!(device = self.device, side = %self.side, socket = %socket, "no peer socket; message dropped");
            return Ok(());
        };

        // TODO: queue and retry on EAGAIN once the outgoing side can signal
        // backpressure to the incoming side; until then a full peer drops the message.
        if let Err(e) = peer.send_with_envelope(&envelope, &parts) {
            warn!(
                device = self.device,
                side = %self.side,
                peer = %peer,
                error = %e,
                "forward failed; message dropped"
            );
        }
        Ok(())
    }

    fn on_readable_error(&mut self, socket: &Socket, error: zmq::Error) -> HandlerResult {
        warn!(device = self.device, side = %self.side, socket = %socket, %error, "receive error");
        Ok(())
    }
}

impl WritableHandler for Relay {
    fn on_writable(&mut self, socket: &Socket) -> HandlerResult {
        // Writes happen from the peer's read callback, not on readiness.
        self.reactor.deregister_writable(socket)?;
        Ok(())
    }

    fn on_writable_error(&mut self, socket: &Socket, error: zmq::Error) -> HandlerResult {
        warn!(device = self.device, side = %self.side, socket = %socket, %error, "write readiness error");
        Ok(())
    }
}
