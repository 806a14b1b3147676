//! Socket endpoints managed by a reactor.
//!
//! A [`Socket`] wraps one raw libzmq socket together with its pattern, the
//! request/reply turn tracker and the handler that receives its events. It
//! is created only through the reactor's `open_*_socket` methods and closed
//! only through `Reactor::close_socket`, which keeps the poller and the
//! handle map in step with the socket's lifetime.
//!
//! `Socket` is a cheap clonable handle. Sends are non-blocking: a full queue
//! surfaces as a transport `EAGAIN` error, see
//! [`ReactorError::is_would_block`].
//!
//! Operations that change the socket (bind, connect, send, subscriptions,
//! options) share the reactor's owner-thread rule and fail with
//! [`ReactorError::ThreadViolation`] elsewhere. The read-only accessors
//! `is_closed`, `bindings` and `connections` work from any thread without
//! waiting for the loop's poll step.

use crate::affinity::Affinity;
use crate::error::{is_recoverable_transport, ReactorError, Result};
use crate::handler::{HandlerResult, HandlerSlot};
use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};
use zmreactor_core::alternation::Alternation;
use zmreactor_core::message::split_envelope;
use zmreactor_core::options::{validate_identity, SocketOptions};
use zmreactor_core::pattern::Pattern;

/// Process-wide unique socket identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(pub(crate) u64);

static NEXT_SOCKET_ID: AtomicU64 = AtomicU64::new(1);

impl SocketId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SOCKET_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw identifier value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Locked by the poller for a whole poll step.
pub(crate) struct EndpointState {
    /// `None` once the socket is closed
    pub(crate) raw: Option<zmq::Socket>,
    alternation: Alternation,
}

#[derive(Default)]
struct Addresses {
    bindings: Vec<String>,
    connections: Vec<String>,
}

struct Endpoint {
    id: SocketId,
    pattern: Pattern,
    affinity: Arc<Affinity>,
    closed: AtomicBool,
    state: Mutex<EndpointState>,
    addresses: Mutex<Addresses>,
    handler: Mutex<Option<HandlerSlot>>,
}

/// Handle to a reactor-managed socket.
#[derive(Clone)]
pub struct Socket {
    inner: Arc<Endpoint>,
}

/// Non-owning socket handle. Devices use it to cross-wire their two sockets.
#[derive(Clone)]
pub struct WeakSocket {
    inner: Weak<Endpoint>,
}

impl WeakSocket {
    /// Get a strong handle if the socket still exists.
    #[must_use]
    pub fn upgrade(&self) -> Option<Socket> {
        self.inner.upgrade().map(|inner| Socket { inner })
    }
}

impl fmt::Debug for WeakSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(socket) => write!(f, "WeakSocket({socket})"),
            None => f.write_str("WeakSocket(<dropped>)"),
        }
    }
}

impl Socket {
    pub(crate) fn new(pattern: Pattern, raw: zmq::Socket, affinity: Arc<Affinity>) -> Self {
        Self {
            inner: Arc::new(Endpoint {
                id: SocketId::next(),
                pattern,
                affinity,
                closed: AtomicBool::new(false),
                state: Mutex::new(EndpointState {
                    raw: Some(raw),
                    alternation: Alternation::new(pattern),
                }),
                addresses: Mutex::new(Addresses::default()),
                handler: Mutex::new(None),
            }),
        }
    }

    /// Identity of this socket.
    #[must_use]
    pub fn id(&self) -> SocketId {
        self.inner.id
    }

    /// Messaging pattern. Fixed at creation.
    #[must_use]
    pub fn pattern(&self) -> Pattern {
        self.inner.pattern
    }

    /// True once the reactor has closed the socket.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Snapshot of the send/receive turn tracker. Waits out a running poll
    /// step.
    #[must_use]
    pub fn alternation(&self) -> Alternation {
        self.inner.state.lock().alternation
    }

    /// Create a non-owning handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakSocket {
        WeakSocket {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// True when both handles refer to the same socket.
    #[must_use]
    pub fn ptr_eq(&self, other: &Socket) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, EndpointState> {
        self.inner.state.lock()
    }

    /// Run `f` against the raw socket, failing if the socket is closed.
    fn with_raw<T>(&self, f: impl FnOnce(&zmq::Socket) -> zmq::Result<T>) -> Result<T> {
        let state = self.inner.state.lock();
        let raw = state.raw.as_ref().ok_or(ReactorError::SocketClosed)?;
        Ok(f(raw)?)
    }

    /// Bind to an address. On failure the address is not recorded.
    #[track_caller]
    pub fn bind(&self, address: &str) -> Result<()> {
        self.inner.affinity.check("bind")?;
        if let Err(e) = self.with_raw(|raw| raw.bind(address)) {
            debug!(socket = %self, address, error = %e, "bind failed");
            return Err(e);
        }
        debug!(socket = %self, address, "bound");
        self.inner.addresses.lock().bindings.push(address.to_string());
        Ok(())
    }

    /// Connect to an address. On failure the address is not recorded.
    #[track_caller]
    pub fn connect(&self, address: &str) -> Result<()> {
        self.inner.affinity.check("connect")?;
        if let Err(e) = self.with_raw(|raw| raw.connect(address)) {
            debug!(socket = %self, address, error = %e, "connect failed");
            return Err(e);
        }
        debug!(socket = %self, address, "connected");
        self.inner.addresses.lock().connections.push(address.to_string());
        Ok(())
    }

    /// Addresses successfully bound, in call order.
    #[must_use]
    pub fn bindings(&self) -> Vec<String> {
        self.inner.addresses.lock().bindings.clone()
    }

    /// Addresses successfully connected, in call order.
    #[must_use]
    pub fn connections(&self) -> Vec<String> {
        self.inner.addresses.lock().connections.clone()
    }

    /// Send one frame without blocking.
    ///
    /// `more` marks a multipart continuation; the message is only complete
    /// once a frame is sent with `more == false`.
    ///
    /// # Errors
    ///
    /// - [`ReactorError::InvalidState`] if a request socket is still awaiting
    ///   its reply, or a reply socket has no request to answer
    /// - [`ReactorError::WrongPattern`] on SUB and PULL sockets
    /// - [`ReactorError::Transport`] with `EAGAIN` if the frame was not queued
    /// - [`ReactorError::ThreadViolation`] off the owning thread
    #[track_caller]
    pub fn send(&self, frame: impl AsRef<[u8]>, more: bool) -> Result<()> {
        self.inner.affinity.check("send")?;
        self.ensure_writable("send")?;
        let frame: &[u8] = frame.as_ref();
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        let raw = state.raw.as_ref().ok_or(ReactorError::SocketClosed)?;
        state.alternation.check_send()?;

        raw.send(frame, send_flags(more))?;
        state.alternation.frame_sent(more);
        trace!(socket = %self, len = frame.len(), more, "frame sent");
        Ok(())
    }

    /// Send a UTF-8 string frame.
    #[track_caller]
    pub fn send_str(&self, text: &str, more: bool) -> Result<()> {
        self.send(text.as_bytes(), more)
    }

    /// Send a complete multipart message: every frame but the last with the
    /// continuation flag, the last without.
    ///
    /// Sending no frames is a no-op.
    #[track_caller]
    pub fn send_multi<I>(&self, frames: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        self.inner.affinity.check("send_multi")?;
        self.ensure_writable("send_multi")?;
        let frames: Vec<I::Item> = frames.into_iter().collect();
        let Some(last) = frames.len().checked_sub(1) else {
            return Ok(());
        };

        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        let raw = state.raw.as_ref().ok_or(ReactorError::SocketClosed)?;
        state.alternation.check_send()?;

        for (i, frame) in frames.iter().enumerate() {
            let more = i < last;
            let frame: &[u8] = frame.as_ref();
            raw.send(frame, send_flags(more))?;
            state.alternation.frame_sent(more);
        }
        trace!(socket = %self, frames = frames.len(), "message sent");
        Ok(())
    }

    /// Send routing frames followed by body frames as one message.
    #[track_caller]
    pub fn send_with_envelope(&self, envelope: &[Bytes], body: &[Bytes]) -> Result<()> {
        self.send_multi(envelope.iter().chain(body))
    }

    /// Add a topic filter. SUB sockets only.
    #[track_caller]
    pub fn subscribe(&self, topic: impl AsRef<[u8]>) -> Result<()> {
        self.inner.affinity.check("subscribe")?;
        self.ensure_pattern(Pattern::Subscriber, "subscribe")?;
        self.with_raw(|raw| raw.set_subscribe(topic.as_ref()))
    }

    /// Accept every message. SUB sockets only.
    #[track_caller]
    pub fn subscribe_all(&self) -> Result<()> {
        self.subscribe(b"")
    }

    /// Remove a topic filter. SUB sockets only.
    #[track_caller]
    pub fn unsubscribe(&self, topic: impl AsRef<[u8]>) -> Result<()> {
        self.inner.affinity.check("unsubscribe")?;
        self.ensure_pattern(Pattern::Subscriber, "unsubscribe")?;
        self.with_raw(|raw| raw.set_unsubscribe(topic.as_ref()))
    }

    /// Transport identity of this socket.
    pub fn identity(&self) -> Result<Vec<u8>> {
        self.with_raw(zmq::Socket::get_identity)
    }

    /// Set the transport identity (1..=255 bytes). Must precede bind/connect.
    #[track_caller]
    pub fn set_identity(&self, identity: &[u8]) -> Result<()> {
        self.inner.affinity.check("set_identity")?;
        validate_identity(identity).map_err(ReactorError::InvalidOption)?;
        self.with_raw(|raw| raw.set_identity(identity))
    }

    /// Apply every option that is set. Must precede bind/connect.
    #[track_caller]
    pub fn apply_options(&self, options: &SocketOptions) -> Result<()> {
        self.inner.affinity.check("apply_options")?;
        options.validate().map_err(ReactorError::InvalidOption)?;
        self.with_raw(|raw| {
            if let Some(hwm) = options.send_hwm {
                raw.set_sndhwm(hwm)?;
            }
            if let Some(hwm) = options.recv_hwm {
                raw.set_rcvhwm(hwm)?;
            }
            if let Some(linger) = options.linger_millis() {
                raw.set_linger(linger)?;
            }
            if let Some(identity) = &options.identity {
                raw.set_identity(identity)?;
            }
            Ok(())
        })
    }

    fn ensure_writable(&self, operation: &'static str) -> Result<()> {
        if self.pattern().can_write() {
            Ok(())
        } else {
            Err(ReactorError::wrong_pattern(self.pattern(), operation))
        }
    }

    fn ensure_pattern(&self, pattern: Pattern, operation: &'static str) -> Result<()> {
        if self.pattern() == pattern {
            Ok(())
        } else {
            Err(ReactorError::wrong_pattern(self.pattern(), operation))
        }
    }

    /// Install the handler and run its attach callback.
    pub(crate) fn attach(&self, slot: HandlerSlot) -> HandlerResult {
        let mut handler = self.inner.handler.lock();
        let slot = handler.insert(slot);
        slot.on_attach(self)
    }

    /// Deliver every message currently queued on the socket.
    ///
    /// Stops at "would block", at a recoverable transport error, or after
    /// escalating any other error to the handler.
    pub(crate) fn resume_read(&self) -> HandlerResult {
        loop {
            let received = {
                let mut guard = self.inner.state.lock();
                let state = &mut *guard;
                let Some(raw) = state.raw.as_ref() else {
                    return Ok(());
                };
                match raw.recv_multipart(zmq::DONTWAIT) {
                    Ok(frames) => {
                        if let Err(e) = state.alternation.check_receive() {
                            warn!(socket = %self, error = %e, "dropping out-of-turn message");
                            continue;
                        }
                        state.alternation.message_received();
                        Ok(frames)
                    }
                    Err(zmq::Error::EAGAIN) => return Ok(()),
                    Err(e) => Err(e),
                }
            };

            match received {
                Ok(frames) => {
                    let frames: Vec<Bytes> = frames.into_iter().map(Bytes::from).collect();
                    let (parts, envelope) = if self.pattern().is_routing() {
                        let (envelope, parts) = split_envelope(self.pattern(), frames);
                        (parts, Some(envelope))
                    } else {
                        (frames, None)
                    };
                    trace!(socket = %self, parts = parts.len(), "message received");
                    self.dispatch(|slot, socket| slot.on_readable(socket, parts, envelope))?;
                }
                Err(e) if is_recoverable_transport(e) => {
                    debug!(socket = %self, error = %e, "recoverable receive error");
                    return Ok(());
                }
                Err(e) => {
                    warn!(socket = %self, error = %e, "receive failed");
                    return self.dispatch(|slot, socket| slot.on_readable_error(socket, e));
                }
            }
        }
    }

    /// Offer one write opportunity to the handler.
    pub(crate) fn resume_write(&self) -> HandlerResult {
        let events = {
            let state = self.inner.state.lock();
            let Some(raw) = state.raw.as_ref() else {
                return Ok(());
            };
            raw.get_events()
        };

        match events {
            Ok(events) if events.contains(zmq::POLLOUT) => {
                self.dispatch(|slot, socket| slot.on_writable(socket))
            }
            Ok(_) => Ok(()),
            Err(e) if is_recoverable_transport(e) => {
                debug!(socket = %self, error = %e, "recoverable event query error");
                Ok(())
            }
            Err(e) => {
                warn!(socket = %self, error = %e, "event query failed");
                self.dispatch(|slot, socket| slot.on_writable_error(socket, e))
            }
        }
    }

    /// Run a handler callback. Releases the handler once the socket is closed,
    /// including when the callback closed it.
    fn dispatch<F>(&self, f: F) -> HandlerResult
    where
        F: FnOnce(&mut HandlerSlot, &Socket) -> Option<HandlerResult>,
    {
        let mut handler = self.inner.handler.lock();
        let result = match handler.as_mut() {
            Some(slot) => f(slot, self).unwrap_or(Ok(())),
            None => Ok(()),
        };
        if self.is_closed() {
            handler.take();
        }
        result
    }

    /// Release the raw socket and the handler. Returns `false` if already closed.
    pub(crate) fn close(&self) -> bool {
        let raw = {
            let mut state = self.inner.state.lock();
            self.inner.closed.store(true, Ordering::Release);
            state.raw.take()
        };
        let Some(raw) = raw else {
            return false;
        };
        drop(raw);
        // When a callback of this very socket is running, `dispatch` drops the
        // handler on its way out instead.
        if let Some(mut handler) = self.inner.handler.try_lock() {
            handler.take();
        }
        debug!(socket = %self, "closed");
        true
    }
}

fn send_flags(more: bool) -> i32 {
    if more {
        zmq::DONTWAIT | zmq::SNDMORE
    } else {
        zmq::DONTWAIT
    }
}

impl fmt::Display for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.inner.pattern, self.inner.id)
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addresses = self.inner.addresses.lock();
        f.debug_struct("Socket")
            .field("id", &self.inner.id)
            .field("pattern", &self.inner.pattern)
            .field("closed", &self.is_closed())
            .field("bindings", &addresses.bindings)
            .field("connections", &addresses.connections)
            .finish_non_exhaustive()
    }
}
