//! Single-threaded event loop for sockets, timers and injected work.
//!
//! A [`Reactor`] owns a set of sockets and a timer scheduler, and runs one
//! loop thread that repeats:
//!
//! 1. run a snapshot of the work injected with [`Reactor::schedule_work`]
//! 2. fire expired timers
//! 3. poll the sockets for up to the poll interval and dispatch readiness
//!
//! # Thread affinity
//!
//! Everything except `schedule_work`, the read-only accessors and the
//! lifecycle calls (`run`, `stop`, `kill`, `join`) may only be called from the
//! owning thread: the loop thread once running, the creating thread before
//! that. The same holds for the sockets' bind, connect, send, subscription
//! and option calls. Calls from anywhere else are refused with
//! [`ReactorError::ThreadViolation`], logged with the caller's location and
//! counted in [`Reactor::thread_violations`].
//!
//! # Callback failures
//!
//! An error returned by (or a panic raised in) a handler, timer, work item or
//! the setup closure goes to the configured exception handler. Without one
//! it is fatal: the loop exits, cleans up, and [`Reactor::join`] returns the
//! error.
//!
//! # Example
//!
//! ```no_run
//! use zmreactor::prelude::*;
//! use std::time::Duration;
//!
//! let reactor = Reactor::new(ReactorConfig::new("ticker"));
//! reactor.run(|reactor| {
//!     reactor.periodical_timer(Duration::from_millis(100), || println!("tick"))?;
//!     Ok(())
//! })?;
//! std::thread::sleep(Duration::from_secs(1));
//! reactor.stop(Some(Duration::from_secs(1)));
//! reactor.join()?;
//! # Ok::<(), zmreactor::ReactorError>(())
//! ```

mod guard;
pub(crate) mod poller;

use crate::affinity::Affinity;
use crate::config::{ExceptionHandler, ReactorConfig};
use crate::error::{is_recoverable_transport, ReactorError, Result};
use crate::handler::{
    BidirectionalHandler, HandlerResult, HandlerSlot, ReadableHandler, WritableHandler,
};
use crate::socket::{Socket, SocketId};
use guard::CleanupGuard;
use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use poller::Poller;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tracing::{debug, error, info, info_span, trace, warn};
use zmreactor_core::pattern::Pattern;
use zmreactor_core::timers::{TimerId, Timers};

/// Work injected from any thread.
type Work = Box<dyn FnOnce() + Send>;

/// How long `kill` waits for the loop thread to exit on its own.
const KILL_GRACE: Duration = Duration::from_millis(100);

/// Linger applied to every socket at creation so close never blocks for long.
const SOCKET_LINGER_MS: i32 = 1;

/// Loop-thread state. Never locked while user code runs.
struct LoopState {
    /// Live sockets in creation order
    sockets: Vec<Socket>,
    handles: HashMap<SocketId, Socket>,
    poller: Poller,
    timers: Timers,
}

pub(crate) struct Shared {
    name: String,
    poll_interval: Duration,
    context: Mutex<Option<zmq::Context>>,
    shared_context: bool,
    exception_handler: Option<ExceptionHandler>,

    started: AtomicBool,
    running: AtomicBool,
    stopping: AtomicBool,
    killed: AtomicBool,
    cleaned: AtomicBool,

    affinity: Arc<Affinity>,
    /// Set by the loop thread itself; survives `join` taking the handle
    loop_thread: RwLock<Option<ThreadId>>,
    work: Mutex<Vec<Work>>,
    state: Mutex<LoopState>,
    thread: Mutex<Option<JoinHandle<Result<()>>>>,

    /// Dropped when the loop finishes; wakes every `stop` waiter at once
    done_tx: Mutex<Option<flume::Sender<()>>>,
    done_rx: flume::Receiver<()>,
}

impl Shared {
    /// Close every socket and drop timers, pending work and the context.
    /// Runs once; later calls do nothing.
    fn cleanup(&self) {
        if self.cleaned.swap(true, Ordering::AcqRel) {
            return;
        }

        let sockets = {
            let mut state = self.state.lock();
            state.handles.clear();
            state.poller.clear();
            state.timers.clear();
            std::mem::take(&mut state.sockets)
        };
        let closed = sockets.iter().filter(|socket| socket.close()).count();
        let dropped_work = std::mem::take(&mut *self.work.lock()).len();

        // A private context is terminated once its last handle goes; a shared
        // one stays alive through the other reactors' handles.
        let context = self.context.lock().take();
        drop(context);

        info!(
            reactor = %self.name,
            closed,
            dropped_work,
            shared_context = self.shared_context,
            "reactor cleaned up"
        );
    }

    /// Cleanup plus lifecycle bookkeeping when the loop thread finishes.
    fn finish(&self) {
        self.stopping.store(true, Ordering::Release);
        self.cleanup();
        self.running.store(false, Ordering::Release);
        self.done_tx.lock().take();
    }
}

/// Handle to a reactor. Cheap to clone and shareable across threads.
#[derive(Clone)]
pub struct Reactor {
    shared: Arc<Shared>,
}

impl Reactor {
    /// Create a reactor. The calling thread owns it until [`Reactor::run`].
    pub fn new(config: ReactorConfig) -> Self {
        let poll_interval = config.effective_poll_interval();
        let shared_context = config.context.is_some();
        let context = config.context.unwrap_or_else(zmq::Context::new);
        let (done_tx, done_rx) = flume::bounded(1);
        let affinity = Arc::new(Affinity::new(config.name.clone()));

        Self {
            shared: Arc::new(Shared {
                name: config.name,
                poll_interval,
                context: Mutex::new(Some(context)),
                shared_context,
                exception_handler: config.exception_handler,
                started: AtomicBool::new(false),
                running: AtomicBool::new(false),
                stopping: AtomicBool::new(false),
                killed: AtomicBool::new(false),
                cleaned: AtomicBool::new(false),
                affinity,
                loop_thread: RwLock::new(None),
                work: Mutex::new(Vec::new()),
                state: Mutex::new(LoopState {
                    sockets: Vec::new(),
                    handles: HashMap::new(),
                    poller: Poller::default(),
                    timers: Timers::with_time_source(config.time_source),
                }),
                thread: Mutex::new(None),
                done_tx: Mutex::new(Some(done_tx)),
                done_rx,
            }),
        }
    }

    /// Reactor name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Upper bound on one poll step.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.shared.poll_interval
    }

    /// True while the loop thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Transport context, for sharing with another reactor (`inproc://`
    /// only connects sockets of the same context). `None` after cleanup.
    #[must_use]
    pub fn context(&self) -> Option<zmq::Context> {
        self.shared.context.lock().clone()
    }

    /// Number of owner-thread-only calls refused so far.
    #[must_use]
    pub fn thread_violations(&self) -> u64 {
        self.shared.affinity.violations()
    }

    /// Number of live sockets, optionally only those of one pattern.
    #[must_use]
    pub fn open_socket_count(&self, pattern: Option<Pattern>) -> usize {
        let state = self.shared.state.lock();
        match pattern {
            None => state.sockets.len(),
            Some(p) => state.sockets.iter().filter(|s| s.pattern() == p).count(),
        }
    }

    /// Number of pending timers.
    #[must_use]
    pub fn timer_count(&self) -> usize {
        self.shared.state.lock().timers.len()
    }

    fn is_loop_thread(&self) -> bool {
        *self.shared.loop_thread.read() == Some(thread::current().id())
    }

    fn is_killed(&self) -> bool {
        self.shared.killed.load(Ordering::Acquire)
    }

    #[track_caller]
    fn check_owner(&self, operation: &'static str) -> Result<()> {
        self.shared.affinity.check(operation)
    }

    /// Start the loop thread.
    ///
    /// The thread is named after the reactor and takes ownership before
    /// `setup` runs on it; `setup` typically opens sockets and arms timers.
    /// Returns once ownership has moved.
    pub fn run<F>(&self, setup: F) -> Result<()>
    where
        F: FnOnce(&Reactor) -> HandlerResult + Send + 'static,
    {
        if self.shared.started.swap(true, Ordering::AcqRel) {
            return Err(ReactorError::AlreadyStarted(self.shared.name.clone()));
        }

        let reactor = self.clone();
        let (owned_tx, owned_rx) = flume::bounded(1);
        let spawned = thread::Builder::new()
            .name(self.shared.name.clone())
            .spawn(move || {
                reactor.shared.affinity.claim();
                *reactor.shared.loop_thread.write() = Some(thread::current().id());
                reactor.shared.running.store(true, Ordering::Release);
                let _ = owned_tx.send(());
                reactor.event_loop(setup)
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.started.store(false, Ordering::Release);
                return Err(ReactorError::Spawn(e));
            }
        };
        *self.shared.thread.lock() = Some(handle);
        let _ = owned_rx.recv();
        Ok(())
    }

    fn event_loop<F>(&self, setup: F) -> Result<()>
    where
        F: FnOnce(&Reactor) -> HandlerResult,
    {
        let span = info_span!("reactor", name = %self.shared.name);
        let _enter = span.enter();
        let _cleanup = CleanupGuard::new(&self.shared);

        info!(poll_interval = ?self.shared.poll_interval, "reactor started");
        self.guarded("setup", || setup(self))?;

        while !self.shared.stopping.load(Ordering::Acquire) {
            self.run_once()?;
        }
        info!(killed = self.is_killed(), "reactor stopped");
        Ok(())
    }

    /// One loop iteration. `Err` only for fatal failures.
    fn run_once(&self) -> Result<()> {
        self.run_work()?;
        self.fire_timers()?;
        self.poll_and_dispatch()
    }

    fn run_work(&self) -> Result<()> {
        // Work queued while this batch runs waits for the next iteration.
        let batch = std::mem::take(&mut *self.shared.work.lock());
        for work in batch {
            if self.is_killed() {
                return Ok(());
            }
            self.guarded("work", move || {
                work();
                Ok(())
            })?;
        }
        Ok(())
    }

    fn fire_timers(&self) -> Result<()> {
        let mut expired = self.shared.state.lock().timers.expire();
        let mut outcome = Ok(());
        for timer in expired.iter_mut() {
            if self.is_killed() {
                break;
            }
            trace!(timer = %timer.id(), "firing");
            if let Err(e) = self.guarded("timer", || {
                timer.fire();
                Ok(())
            }) {
                outcome = Err(e);
                break;
            }
        }
        self.shared.state.lock().timers.rearm(expired);
        outcome
    }

    fn poll_timeout(&self, timers: &Timers) -> Duration {
        if !self.shared.work.lock().is_empty() {
            return Duration::ZERO;
        }
        match timers.next_fire_at() {
            Some(at) => {
                let wait = Duration::from_millis(at.saturating_sub(timers.now()));
                wait.min(self.shared.poll_interval)
            }
            None => self.shared.poll_interval,
        }
    }

    fn poll_and_dispatch(&self) -> Result<()> {
        let (active, timeout) = {
            let state = self.shared.state.lock();
            (state.poller.active(&state.handles), self.poll_timeout(&state.timers))
        };

        let ready = match poller::poll(&active, timeout) {
            Ok(Some(ready)) => ready,
            Ok(None) => {
                if !timeout.is_zero() {
                    thread::sleep(timeout);
                }
                return Ok(());
            }
            Err(e) if is_recoverable_transport(e) => {
                debug!(error = %e, "recoverable poll error");
                thread::sleep(timeout);
                return Ok(());
            }
            Err(e) => {
                error!(error = %e, "poll failed");
                return Err(e.into());
            }
        };

        for event in ready {
            if self.is_killed() {
                break;
            }
            let socket = &event.socket;
            // An earlier callback in this batch may have closed it.
            if event.readable && !socket.is_closed() {
                self.guarded("readable", || socket.resume_read())?;
            }
            if event.writable && !socket.is_closed() && self.wants_write(socket) {
                self.guarded("writable", || socket.resume_write())?;
            }
        }
        Ok(())
    }

    /// Write interest may have been dropped by the read callback just before.
    fn wants_write(&self, socket: &Socket) -> bool {
        self.shared
            .state
            .lock()
            .poller
            .interest(socket.id())
            .is_some_and(|interest| interest.writable)
    }

    /// Run user code, catching errors and panics.
    ///
    /// Returns `Err` only when the failure is fatal, that is when no
    /// exception handler is installed.
    fn guarded<F>(&self, origin: &'static str, f: F) -> Result<()>
    where
        F: FnOnce() -> HandlerResult,
    {
        let error = match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(source)) => ReactorError::Handler { origin, source },
            Err(payload) => ReactorError::Panic {
                origin,
                message: panic_message(payload.as_ref()),
            },
        };

        match &self.shared.exception_handler {
            Some(handler) => {
                debug!(%error, "callback failure routed to exception handler");
                handler(&error);
                Ok(())
            }
            None => {
                error!(%error, "unhandled callback failure; stopping reactor");
                self.shared.stopping.store(true, Ordering::Release);
                Err(error)
            }
        }
    }

    /// Queue `work` to run on the loop thread at the start of the next
    /// iteration. Callable from any thread; work runs in enqueue order.
    pub fn schedule_work<F>(&self, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.shared.cleaned.load(Ordering::Acquire) {
            debug!(reactor = %self.shared.name, "reactor finished; work dropped");
            return;
        }
        self.shared.work.lock().push(Box::new(work));
    }

    /// Request a graceful stop and wait for the loop thread to exit.
    ///
    /// Returns `true` if the loop has exited (or never ran) within `timeout`
    /// (`None` waits indefinitely). Called from the loop thread itself it only
    /// requests the stop and returns `false`.
    pub fn stop(&self, timeout: Option<Duration>) -> bool {
        self.shared.stopping.store(true, Ordering::Release);
        debug!(reactor = %self.shared.name, "stop requested");

        if !self.shared.started.load(Ordering::Acquire) {
            self.shared.finish();
            return true;
        }
        if self.is_loop_thread() {
            return false;
        }
        self.wait_done(timeout)
    }

    fn wait_done(&self, timeout: Option<Duration>) -> bool {
        let outcome = match timeout {
            Some(timeout) => self.shared.done_rx.recv_timeout(timeout).map_err(|e| {
                matches!(e, flume::RecvTimeoutError::Disconnected)
            }),
            None => self.shared.done_rx.recv().map_err(|_| true),
        };
        // The channel never carries a value: disconnection means done.
        matches!(outcome, Err(true))
    }

    /// Force the loop to end and clean up.
    ///
    /// The loop abandons its iteration at the next callback boundary. If it
    /// does not exit within a short grace period (a callback is stuck),
    /// cleanup runs here instead; should even that be impossible it is left
    /// to the loop thread. Cleanup here may wait up to one poll interval for
    /// the sockets a poll step holds.
    pub fn kill(&self) {
        warn!(reactor = %self.shared.name, "kill requested");
        self.shared.killed.store(true, Ordering::Release);
        self.shared.stopping.store(true, Ordering::Release);

        if !self.shared.started.load(Ordering::Acquire) {
            self.shared.finish();
            return;
        }
        if self.is_loop_thread() || self.wait_done(Some(KILL_GRACE)) {
            return;
        }

        match self.shared.state.try_lock_for(KILL_GRACE) {
            Some(state) => {
                drop(state);
                warn!(reactor = %self.shared.name, "loop thread wedged; cleaning up from killer thread");
                self.shared.cleanup();
            }
            None => {
                warn!(reactor = %self.shared.name, "loop thread wedged; cleanup deferred to loop thread");
            }
        }
    }

    /// Wait for the loop thread to exit and return its outcome.
    ///
    /// A fatal callback failure is returned as the error. Returns `Ok(())`
    /// at once if the loop never started, was already joined, or this is
    /// the loop thread itself.
    pub fn join(&self) -> Result<()> {
        if self.is_loop_thread() {
            return Ok(());
        }
        let handle = self.shared.thread.lock().take();
        let Some(handle) = handle else {
            return Ok(());
        };
        match handle.join() {
            Ok(outcome) => outcome,
            Err(payload) => Err(ReactorError::Panic {
                origin: "reactor",
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    /// Like [`Reactor::join`], but gives up after `timeout`.
    ///
    /// Returns `Ok(false)` if the loop is still running by then (always, on
    /// the loop thread itself), `Ok(true)` once it has been joined.
    pub fn join_timeout(&self, timeout: Duration) -> Result<bool> {
        if self.is_loop_thread() {
            return Ok(false);
        }
        if self.shared.started.load(Ordering::Acquire) && !self.wait_done(Some(timeout)) {
            return Ok(false);
        }
        self.join().map(|()| true)
    }

    // -- sockets --

    /// Open a REQ socket.
    #[track_caller]
    pub fn open_req_socket<H: BidirectionalHandler>(&self, handler: H) -> Result<Socket> {
        self.open(Pattern::Request, zmq::REQ, HandlerSlot::Bidirectional(Box::new(handler)))
    }

    /// Open a REP socket.
    #[track_caller]
    pub fn open_rep_socket<H: BidirectionalHandler>(&self, handler: H) -> Result<Socket> {
        self.open(Pattern::Reply, zmq::REP, HandlerSlot::Bidirectional(Box::new(handler)))
    }

    /// Open a ROUTER socket. Received messages carry their routing envelope.
    #[track_caller]
    pub fn open_router_socket<H: BidirectionalHandler>(&self, handler: H) -> Result<Socket> {
        self.open(Pattern::Router, zmq::ROUTER, HandlerSlot::Bidirectional(Box::new(handler)))
    }

    /// Open a DEALER socket. Received messages carry their routing envelope.
    #[track_caller]
    pub fn open_dealer_socket<H: BidirectionalHandler>(&self, handler: H) -> Result<Socket> {
        self.open(Pattern::Dealer, zmq::DEALER, HandlerSlot::Bidirectional(Box::new(handler)))
    }

    /// Open a PAIR socket.
    #[track_caller]
    pub fn open_pair_socket<H: BidirectionalHandler>(&self, handler: H) -> Result<Socket> {
        self.open(Pattern::Pair, zmq::PAIR, HandlerSlot::Bidirectional(Box::new(handler)))
    }

    /// Open a PUB socket.
    #[track_caller]
    pub fn open_pub_socket<H: WritableHandler>(&self, handler: H) -> Result<Socket> {
        self.open(Pattern::Publisher, zmq::PUB, HandlerSlot::Writable(Box::new(handler)))
    }

    /// Open a SUB socket. It receives nothing until a topic is subscribed.
    #[track_caller]
    pub fn open_sub_socket<H: ReadableHandler>(&self, handler: H) -> Result<Socket> {
        self.open(Pattern::Subscriber, zmq::SUB, HandlerSlot::Readable(Box::new(handler)))
    }

    /// Open a PUSH socket.
    #[track_caller]
    pub fn open_push_socket<H: WritableHandler>(&self, handler: H) -> Result<Socket> {
        self.open(Pattern::Push, zmq::PUSH, HandlerSlot::Writable(Box::new(handler)))
    }

    /// Open a PULL socket.
    #[track_caller]
    pub fn open_pull_socket<H: ReadableHandler>(&self, handler: H) -> Result<Socket> {
        self.open(Pattern::Pull, zmq::PULL, HandlerSlot::Readable(Box::new(handler)))
    }

    #[track_caller]
    fn open(&self, pattern: Pattern, kind: zmq::SocketType, slot: HandlerSlot) -> Result<Socket> {
        self.check_owner("open_socket")?;

        let raw = {
            let context = self.shared.context.lock();
            let context = context.as_ref().ok_or(ReactorError::Transport(zmq::Error::ETERM))?;
            context.socket(kind)?
        };
        raw.set_linger(SOCKET_LINGER_MS)?;

        let socket = Socket::new(pattern, raw, Arc::clone(&self.shared.affinity));
        {
            let mut state = self.shared.state.lock();
            state.poller.register(socket.id(), pattern.default_interest());
            state.handles.insert(socket.id(), socket.clone());
            state.sockets.push(socket.clone());
        }

        if let Err(source) = socket.attach(slot) {
            warn!(socket = %socket, error = %source, "attach failed; closing socket");
            self.remove_socket(&socket);
            return Err(ReactorError::Attach { pattern, source });
        }
        debug!(reactor = %self.shared.name, socket = %socket, "socket opened");
        Ok(socket)
    }

    /// Deregister and close a socket.
    ///
    /// Returns `true` only if the socket was registered with this reactor and
    /// every step succeeded. Closing twice returns `false`.
    #[track_caller]
    pub fn close_socket(&self, socket: &Socket) -> bool {
        if self.check_owner("close_socket").is_err() {
            return false;
        }
        self.remove_socket(socket)
    }

    fn remove_socket(&self, socket: &Socket) -> bool {
        let id = socket.id();
        let (registered, live) = {
            let mut state = self.shared.state.lock();
            let mapped = state.handles.get(&id).is_some_and(|s| s.ptr_eq(socket));
            if !mapped {
                return false;
            }
            state.handles.remove(&id);
            let registered = state.poller.remove(id);
            let before = state.sockets.len();
            state.sockets.retain(|s| !s.ptr_eq(socket));
            (registered, state.sockets.len() != before)
        };
        let closed = socket.close();
        registered && live && closed
    }

    /// Resume delivering read readiness for `socket`.
    #[track_caller]
    pub fn register_readable(&self, socket: &Socket) -> Result<()> {
        self.check_owner("register_readable")?;
        if !socket.pattern().can_read() {
            return Err(ReactorError::wrong_pattern(socket.pattern(), "register_readable"));
        }
        self.set_interest(socket, |poller, id| poller.set_readable(id, true))
    }

    /// Stop delivering read readiness for `socket`.
    #[track_caller]
    pub fn deregister_readable(&self, socket: &Socket) -> Result<()> {
        self.check_owner("deregister_readable")?;
        self.set_interest(socket, |poller, id| poller.set_readable(id, false))
    }

    /// Resume delivering write readiness for `socket`.
    #[track_caller]
    pub fn register_writable(&self, socket: &Socket) -> Result<()> {
        self.check_owner("register_writable")?;
        if !socket.pattern().can_write() {
            return Err(ReactorError::wrong_pattern(socket.pattern(), "register_writable"));
        }
        self.set_interest(socket, |poller, id| poller.set_writable(id, true))
    }

    /// Stop delivering write readiness for `socket`, typically once its
    /// handler has nothing left to send.
    #[track_caller]
    pub fn deregister_writable(&self, socket: &Socket) -> Result<()> {
        self.check_owner("deregister_writable")?;
        self.set_interest(socket, |poller, id| poller.set_writable(id, false))
    }

    fn set_interest(&self, socket: &Socket, f: impl FnOnce(&mut Poller, SocketId) -> bool) -> Result<()> {
        let mut state = self.shared.state.lock();
        if f(&mut state.poller, socket.id()) {
            Ok(())
        } else {
            Err(ReactorError::SocketClosed)
        }
    }

    // -- timers --

    /// Run `callback` once after `delay`.
    #[track_caller]
    pub fn oneshot_timer<F>(&self, delay: Duration, callback: F) -> Result<TimerId>
    where
        F: FnOnce() + Send + 'static,
    {
        self.check_owner("oneshot_timer")?;
        Ok(self.shared.state.lock().timers.add_oneshot(millis(delay), callback))
    }

    /// Run `callback` every `delay` until cancelled.
    #[track_caller]
    pub fn periodical_timer<F>(&self, delay: Duration, callback: F) -> Result<TimerId>
    where
        F: FnMut() + Send + 'static,
    {
        self.check_owner("periodical_timer")?;
        Ok(self.shared.state.lock().timers.add_periodical(millis(delay), callback))
    }

    /// Cancel a timer. Returns `true` if it was pending.
    #[track_caller]
    pub fn cancel_timer(&self, id: TimerId) -> bool {
        if self.check_owner("cancel_timer").is_err() {
            return false;
        }
        self.shared.state.lock().timers.cancel(id)
    }

    /// Recompute every timer's fire time from now. Call after the time
    /// source jumped.
    #[track_caller]
    pub fn reschedule_all_timers(&self) -> Result<()> {
        self.check_owner("reschedule_all_timers")?;
        self.shared.state.lock().timers.reschedule();
        Ok(())
    }
}

fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

impl fmt::Debug for Reactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactor")
            .field("name", &self.shared.name)
            .field("running", &self.is_running())
            .field("poll_interval", &self.shared.poll_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "<non-string panic payload>");
    }

    #[test]
    fn test_creator_owns_until_run() {
        let reactor = Reactor::new(ReactorConfig::new("pre-run"));
        let id = reactor.oneshot_timer(Duration::from_secs(60), || {}).unwrap();
        assert_eq!(reactor.timer_count(), 1);
        assert!(reactor.cancel_timer(id));
        assert_eq!(reactor.thread_violations(), 0);
        assert!(reactor.stop(None));
    }

    #[test]
    fn test_run_twice_rejected() {
        let reactor = Reactor::new(ReactorConfig::new("twice"));
        reactor.run(|_| Ok(())).unwrap();
        assert!(matches!(reactor.run(|_| Ok(())), Err(ReactorError::AlreadyStarted(_))));
        assert!(reactor.stop(Some(Duration::from_secs(5))));
        reactor.join().unwrap();
    }

    #[test]
    fn test_guarded_routes_to_exception_handler() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let reactor = Reactor::new(
            ReactorConfig::new("guarded").with_exception_handler(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(reactor.guarded("test", || Err("nope".into())).is_ok());
        assert!(reactor.guarded("test", || panic!("boom")).is_ok());
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_guarded_without_handler_is_fatal() {
        let reactor = Reactor::new(ReactorConfig::new("fatal"));
        let err = reactor.guarded("timer", || Err("nope".into())).unwrap_err();
        assert!(matches!(err, ReactorError::Handler { origin: "timer", .. }));
        assert!(reactor.shared.stopping.load(Ordering::SeqCst));
    }

    #[test]
    fn test_poll_timeout_bounded_by_next_timer() {
        let reactor = Reactor::new(
            ReactorConfig::new("timeout").with_poll_interval(Duration::from_millis(50)),
        );
        reactor.oneshot_timer(Duration::from_millis(5), || {}).unwrap();
        let state = reactor.shared.state.lock();
        assert!(reactor.poll_timeout(&state.timers) <= Duration::from_millis(5));
        drop(state);

        reactor.schedule_work(|| {});
        let state = reactor.shared.state.lock();
        assert_eq!(reactor.poll_timeout(&state.timers), Duration::ZERO);
    }
}
