//! Shared fixtures for the reactor integration tests.
#![allow(dead_code)]

use std::time::Duration;
use zmreactor::prelude::*;

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// What a [`Recorder`] saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Attached(SocketId),
    Message {
        parts: Vec<Bytes>,
        envelope: Option<Vec<Bytes>>,
    },
    Writable,
    Error(zmq::Error),
}

/// Handler that reports every callback on a channel.
///
/// Binds and/or connects on attach, subscribes SUB sockets to `topic`, and
/// drops write interest on the first writable notification.
pub struct Recorder {
    pub reactor: Reactor,
    pub tx: flume::Sender<Seen>,
    pub bind: Option<String>,
    pub connect: Option<String>,
    pub topic: Option<Vec<u8>>,
    /// Reply to every message with these frames (REP/ROUTER echo servers)
    pub reply: Option<Vec<Bytes>>,
}

impl Recorder {
    pub fn new(reactor: &Reactor, tx: flume::Sender<Seen>) -> Self {
        Self {
            reactor: reactor.clone(),
            tx,
            bind: None,
            connect: None,
            topic: None,
            reply: None,
        }
    }

    pub fn bind(mut self, address: impl Into<String>) -> Self {
        self.bind = Some(address.into());
        self
    }

    pub fn connect(mut self, address: impl Into<String>) -> Self {
        self.connect = Some(address.into());
        self
    }

    pub fn topic(mut self, topic: &[u8]) -> Self {
        self.topic = Some(topic.to_vec());
        self
    }

    pub fn reply(mut self, frames: &[&'static [u8]]) -> Self {
        self.reply = Some(frames.iter().map(|f| Bytes::from_static(f)).collect());
        self
    }
}

impl Handler for Recorder {
    fn on_attach(&mut self, socket: &Socket) -> HandlerResult {
        if let Some(address) = &self.bind {
            socket.bind(address)?;
        }
        if let Some(address) = &self.connect {
            socket.connect(address)?;
        }
        if let Some(topic) = &self.topic {
            socket.subscribe(topic)?;
        }
        let _ = self.tx.send(Seen::Attached(socket.id()));
        Ok(())
    }
}

impl ReadableHandler for Recorder {
    fn on_readable(
        &mut self,
        socket: &Socket,
        parts: Vec<Bytes>,
        envelope: Option<Vec<Bytes>>,
    ) -> HandlerResult {
        if let Some(reply) = &self.reply {
            match &envelope {
                Some(envelope) => socket.send_with_envelope(envelope, reply)?,
                None => socket.send_multi(reply)?,
            }
        }
        let _ = self.tx.send(Seen::Message { parts, envelope });
        Ok(())
    }

    fn on_readable_error(&mut self, _socket: &Socket, error: zmq::Error) -> HandlerResult {
        let _ = self.tx.send(Seen::Error(error));
        Ok(())
    }
}

impl WritableHandler for Recorder {
    fn on_writable(&mut self, socket: &Socket) -> HandlerResult {
        self.reactor.deregister_writable(socket)?;
        let _ = self.tx.send(Seen::Writable);
        Ok(())
    }

    fn on_writable_error(&mut self, _socket: &Socket, error: zmq::Error) -> HandlerResult {
        let _ = self.tx.send(Seen::Error(error));
        Ok(())
    }
}

/// Next message reported by a recorder, skipping other events.
pub fn next_message(rx: &flume::Receiver<Seen>) -> (Vec<Bytes>, Option<Vec<Bytes>>) {
    loop {
        match rx.recv_timeout(WAIT).expect("no message within timeout") {
            Seen::Message { parts, envelope } => return (parts, envelope),
            Seen::Error(e) => panic!("handler saw error: {e}"),
            _ => {}
        }
    }
}

/// Raw transport socket for the test side of a conversation.
pub fn peer(ctx: &zmq::Context, kind: zmq::SocketType) -> zmq::Socket {
    let socket = ctx.socket(kind).expect("create peer socket");
    socket.set_linger(0).expect("set linger");
    socket.set_rcvtimeo(WAIT.as_millis() as i32).expect("set rcvtimeo");
    socket
}

/// Free loopback TCP address.
pub fn tcp_address() -> String {
    let port = portpicker::pick_unused_port().expect("no free port");
    format!("tcp://127.0.0.1:{port}")
}

/// Reactor sharing `ctx`, with tracing enabled when `RUST_LOG` is set.
pub fn reactor(name: &str, ctx: &zmq::Context) -> Reactor {
    zmreactor::dev_tracing::init_tracing();
    Reactor::new(ReactorConfig::new(name).with_context(ctx.clone()))
}

/// Stop a reactor and check it shut down cleanly.
pub fn shutdown(reactor: &Reactor) {
    assert!(reactor.stop(Some(WAIT)), "reactor did not stop in time");
    reactor.join().expect("reactor failed");
}
