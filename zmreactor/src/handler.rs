//! Handler capability traits.
//!
//! A socket's pattern decides which callbacks its handler must provide:
//!
//! | Pattern                              | Required trait          |
//! |--------------------------------------|-------------------------|
//! | REQ, REP, ROUTER, DEALER, PAIR       | [`BidirectionalHandler`] |
//! | PUB, PUSH                            | [`WritableHandler`]     |
//! | SUB, PULL                            | [`ReadableHandler`]     |
//!
//! The reactor's `open_*_socket` methods are bounded by the matching trait,
//! so a handler that lacks a callback does not compile.
//!
//! Every callback runs on the reactor's loop thread. Callbacks must not
//! block; use timers or `schedule_work` to defer work.

use crate::socket::Socket;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;

/// Error returned by handler callbacks.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by handler callbacks.
pub type HandlerResult = Result<(), HandlerError>;

/// Callbacks every handler provides.
pub trait Handler: Send + 'static {
    /// Called once, synchronously, when the socket is created.
    ///
    /// Typical work: apply options, bind or connect, arm timers. An error
    /// closes the socket again and fails the `open_*_socket` call.
    fn on_attach(&mut self, socket: &Socket) -> HandlerResult;
}

/// Callbacks for sockets that receive.
pub trait ReadableHandler: Handler {
    /// One complete multipart message arrived.
    ///
    /// `envelope` is `Some` for router and dealer sockets and holds the
    /// routing frames split off the front of the message.
    fn on_readable(
        &mut self,
        socket: &Socket,
        parts: Vec<Bytes>,
        envelope: Option<Vec<Bytes>>,
    ) -> HandlerResult;

    /// Receiving failed with an error the reactor does not recover from itself.
    fn on_readable_error(&mut self, socket: &Socket, error: zmq::Error) -> HandlerResult;
}

/// Callbacks for sockets that send.
pub trait WritableHandler: Handler {
    /// The socket can accept a message. Called once per readiness report;
    /// deregister write interest when there is nothing left to send.
    fn on_writable(&mut self, socket: &Socket) -> HandlerResult;

    /// Querying write readiness failed.
    fn on_writable_error(&mut self, socket: &Socket, error: zmq::Error) -> HandlerResult;
}

/// Handlers for sockets that both send and receive.
pub trait BidirectionalHandler: ReadableHandler + WritableHandler {}

impl<T: ReadableHandler + WritableHandler> BidirectionalHandler for T {}

// One handler instance may serve several sockets when shared behind a lock.
impl<H: Handler> Handler for Arc<Mutex<H>> {
    fn on_attach(&mut self, socket: &Socket) -> HandlerResult {
        self.lock().on_attach(socket)
    }
}

impl<H: ReadableHandler> ReadableHandler for Arc<Mutex<H>> {
    fn on_readable(
        &mut self,
        socket: &Socket,
        parts: Vec<Bytes>,
        envelope: Option<Vec<Bytes>>,
    ) -> HandlerResult {
        self.lock().on_readable(socket, parts, envelope)
    }

    fn on_readable_error(&mut self, socket: &Socket, error: zmq::Error) -> HandlerResult {
        self.lock().on_readable_error(socket, error)
    }
}

impl<H: WritableHandler> WritableHandler for Arc<Mutex<H>> {
    fn on_writable(&mut self, socket: &Socket) -> HandlerResult {
        self.lock().on_writable(socket)
    }

    fn on_writable_error(&mut self, socket: &Socket, error: zmq::Error) -> HandlerResult {
        self.lock().on_writable_error(socket, error)
    }
}

/// Type-erased handler stored by a socket.
pub(crate) enum HandlerSlot {
    Readable(Box<dyn ReadableHandler>),
    Writable(Box<dyn WritableHandler>),
    Bidirectional(Box<dyn BidirectionalHandler>),
}

impl HandlerSlot {
    pub(crate) fn on_attach(&mut self, socket: &Socket) -> HandlerResult {
        match self {
            Self::Readable(h) => h.on_attach(socket),
            Self::Writable(h) => h.on_attach(socket),
            Self::Bidirectional(h) => h.on_attach(socket),
        }
    }

    /// `None` when the handler has no read callbacks.
    pub(crate) fn on_readable(
        &mut self,
        socket: &Socket,
        parts: Vec<Bytes>,
        envelope: Option<Vec<Bytes>>,
    ) -> Option<HandlerResult> {
        match self {
            Self::Readable(h) => Some(h.on_readable(socket, parts, envelope)),
            Self::Bidirectional(h) => Some(h.on_readable(socket, parts, envelope)),
            Self::Writable(_) => None,
        }
    }

    pub(crate) fn on_readable_error(
        &mut self,
        socket: &Socket,
        error: zmq::Error,
    ) -> Option<HandlerResult> {
        match self {
            Self::Readable(h) => Some(h.on_readable_error(socket, error)),
            Self::Bidirectional(h) => Some(h.on_readable_error(socket, error)),
            Self::Writable(_) => None,
        }
    }

    /// `None` when the handler has no write callbacks.
    pub(crate) fn on_writable(&mut self, socket: &Socket) -> Option<HandlerResult> {
        match self {
            Self::Writable(h) => Some(h.on_writable(socket)),
            Self::Bidirectional(h) => Some(h.on_writable(socket)),
            Self::Readable(_) => None,
        }
    }

    pub(crate) fn on_writable_error(
        &mut self,
        socket: &Socket,
        error: zmq::Error,
    ) -> Option<HandlerResult> {
        match self {
            Self::Writable(h) => Some(h.on_writable_error(socket, error)),
            Self::Bidirectional(h) => Some(h.on_writable_error(socket, error)),
            Self::Readable(_) => None,
        }
    }
}
