//! Ordered timer scheduling for a single reactor.
//!
//! Timers live in a `Vec` kept sorted by fire time. Insertion uses a binary
//! search for the slot followed by a shift, which beats a heap for the small
//! timer counts a reactor usually carries and keeps in-order iteration trivial.
//!
//! # Firing
//!
//! Expired timers are removed from the live sequence *before* any callback
//! runs. Callbacks are therefore free to add or cancel timers, including the
//! one currently firing, without disturbing the scan. Periodical timers are
//! re-armed afterwards from the current time, so lateness shows up as drift
//! rather than as a burst of catch-up firings.
//!
//! The two halves of a pass are exposed separately ([`Timers::expire`] and
//! [`Timers::rearm`]) so that an owner holding the scheduler behind a lock can
//! release it while callbacks run.

use hashbrown::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// Source of "now", in milliseconds since an arbitrary epoch.
pub trait TimeSource: Send + Sync {
    /// Current time in milliseconds.
    fn now_millis(&self) -> u64;
}

/// Default time source backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    /// Create a clock whose epoch is the moment of construction.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

/// Hand-driven time source.
///
/// Clones share the same underlying counter, so a host can keep one clone and
/// hand another to the scheduler.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock reading `start` milliseconds.
    #[must_use]
    pub fn new(start: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    /// Jump to an absolute reading (may go backwards).
    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Identity of a scheduled timer. Used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Raw identifier value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Boxed timer callback.
pub type TimerCallback = Box<dyn FnMut() + Send>;

/// A scheduled timer.
pub struct Timer {
    id: TimerId,
    delay_ms: u64,
    periodical: bool,
    fire_at: u64,
    callback: TimerCallback,
}

impl Timer {
    /// Identity of this timer.
    #[must_use]
    pub const fn id(&self) -> TimerId {
        self.id
    }

    /// Delay originally requested, in milliseconds.
    #[must_use]
    pub const fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    /// True when the timer re-arms itself after firing.
    #[must_use]
    pub const fn is_periodical(&self) -> bool {
        self.periodical
    }

    /// Absolute fire time in the scheduler's clock.
    #[must_use]
    pub const fn fire_at(&self) -> u64 {
        self.fire_at
    }

    /// True when the timer is due at `now`.
    #[must_use]
    pub const fn is_expired(&self, now: u64) -> bool {
        self.fire_at <= now
    }

    /// Run the callback.
    pub fn fire(&mut self) {
        (self.callback)();
    }

    fn schedule_from(&mut self, now: u64) {
        self.fire_at = now.saturating_add(self.delay_ms);
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("id", &self.id)
            .field("delay_ms", &self.delay_ms)
            .field("periodical", &self.periodical)
            .field("fire_at", &self.fire_at)
            .finish_non_exhaustive()
    }
}

/// Timers removed from the live sequence by [`Timers::expire`].
///
/// Hand it back to [`Timers::rearm`] once the callbacks have run.
#[derive(Debug, Default)]
pub struct Expired {
    timers: Vec<Timer>,
}

impl Expired {
    /// Number of expired timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// True when nothing expired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Expired timers in expiration order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Timer> {
        self.timers.iter_mut()
    }
}

/// Ordered collection of pending timers.
pub struct Timers {
    clock: Arc<dyn TimeSource>,
    pending: Vec<Timer>,
    /// Timers handed out by `expire` and not yet returned through `rearm`
    in_flight: HashSet<TimerId>,
    /// In-flight timers cancelled by a callback; they must not be re-armed
    cancelled: HashSet<TimerId>,
    next_id: u64,
}

impl Timers {
    /// Create a scheduler driven by the monotonic clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_time_source(Arc::new(MonotonicClock::new()))
    }

    /// Create a scheduler driven by the given time source.
    #[must_use]
    pub fn with_time_source(clock: Arc<dyn TimeSource>) -> Self {
        Self {
            clock,
            pending: Vec::new(),
            in_flight: HashSet::new(),
            cancelled: HashSet::new(),
            next_id: 1,
        }
    }

    /// Replace the time source. Call [`Timers::reschedule`] afterwards so
    /// existing timers are expressed in the new clock.
    pub fn set_time_source(&mut self, clock: Arc<dyn TimeSource>) {
        self.clock = clock;
    }

    /// Current time according to the scheduler's clock.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Number of pending (not in-flight) timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True when no timer is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Fire time of the earliest pending timer.
    #[must_use]
    pub fn next_fire_at(&self) -> Option<u64> {
        self.pending.first().map(Timer::fire_at)
    }

    /// Pending timers, ordered by fire time.
    pub fn iter(&self) -> std::slice::Iter<'_, Timer> {
        self.pending.iter()
    }

    /// Schedule `callback` to run once, `delay_ms` from now.
    pub fn add_oneshot<F>(&mut self, delay_ms: u64, callback: F) -> TimerId
    where
        F: FnOnce() + Send + 'static,
    {
        let mut callback = Some(callback);
        self.add(
            delay_ms,
            false,
            Box::new(move || {
                if let Some(f) = callback.take() {
                    f();
                }
            }),
        )
    }

    /// Schedule `callback` to run every `delay_ms` until cancelled.
    pub fn add_periodical<F>(&mut self, delay_ms: u64, callback: F) -> TimerId
    where
        F: FnMut() + Send + 'static,
    {
        self.add(delay_ms, true, Box::new(callback))
    }

    fn add(&mut self, delay_ms: u64, periodical: bool, callback: TimerCallback) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;

        let mut timer = Timer {
            id,
            delay_ms,
            periodical,
            fire_at: 0,
            callback,
        };
        timer.schedule_from(self.now());
        trace!(%id, delay_ms, periodical, fire_at = timer.fire_at, "timer added");
        self.insert(timer);
        id
    }

    /// Ordered insertion; ties keep insertion order.
    fn insert(&mut self, timer: Timer) {
        let at = self.pending.partition_point(|t| t.fire_at <= timer.fire_at);
        self.pending.insert(at, timer);
    }

    /// Cancel a timer.
    ///
    /// Returns `true` if the timer was pending, or if it is currently firing
    /// and would otherwise have been re-armed. Returns `false` for unknown or
    /// already finished timers.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        if let Some(pos) = self.pending.iter().position(|t| t.id == id) {
            self.pending.remove(pos);
            trace!(%id, "timer cancelled");
            return true;
        }
        if self.in_flight.contains(&id) {
            return self.cancelled.insert(id);
        }
        false
    }

    /// Drop every timer.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.cancelled.extend(self.in_flight.iter().copied());
    }

    /// Remove every timer due at the current time and hand them out in
    /// expiration order.
    pub fn expire(&mut self) -> Expired {
        let now = self.now();
        let due = self.pending.partition_point(|t| t.is_expired(now));
        let timers: Vec<Timer> = self.pending.drain(..due).collect();
        self.in_flight.extend(timers.iter().map(Timer::id));
        Expired { timers }
    }

    /// Return an expired batch: periodical timers that were not cancelled in
    /// the meantime are re-armed from the current time.
    pub fn rearm(&mut self, expired: Expired) {
        let now = self.now();
        for mut timer in expired.timers {
            self.in_flight.remove(&timer.id);
            let cancelled = self.cancelled.remove(&timer.id);
            if timer.periodical && !cancelled {
                timer.schedule_from(now);
                self.insert(timer);
            }
        }
    }

    /// Fire every expired timer and re-arm the periodicals.
    ///
    /// Returns the number of callbacks run.
    pub fn fire_expired(&mut self) -> usize {
        let mut expired = self.expire();
        let fired = expired.len();
        for timer in expired.iter_mut() {
            timer.fire();
        }
        self.rearm(expired);
        fired
    }

    /// Recompute every pending fire time from now plus its original delay.
    pub fn reschedule(&mut self) {
        let now = self.now();
        for timer in &mut self.pending {
            timer.schedule_from(now);
        }
        // Stable sort keeps insertion order among equal fire times.
        self.pending.sort_by_key(Timer::fire_at);
    }
}

impl Default for Timers {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Timers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timers")
            .field("pending", &self.pending)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn scheduler() -> (ManualClock, Timers) {
        let clock = ManualClock::new(1_000);
        let timers = Timers::with_time_source(Arc::new(clock.clone()));
        (clock, timers)
    }

    fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn push(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> impl FnMut() + Send + 'static {
        let log = Arc::clone(log);
        move || log.lock().unwrap().push(tag)
    }

    #[test]
    fn test_does_not_fire_early() {
        let (clock, mut timers) = scheduler();
        let log = recorder();
        timers.add_oneshot(50, push(&log, "a"));

        clock.advance(49);
        assert_eq!(timers.fire_expired(), 0);
        assert!(log.lock().unwrap().is_empty());

        clock.advance(1);
        assert_eq!(timers.fire_expired(), 1);
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
        assert!(timers.is_empty(), "oneshot timers are removed after firing");
    }

    #[test]
    fn test_sorted_insertion_and_tie_order() {
        let (clock, mut timers) = scheduler();
        let log = recorder();
        timers.add_oneshot(30, push(&log, "late"));
        timers.add_oneshot(10, push(&log, "first"));
        timers.add_oneshot(10, push(&log, "second"));
        timers.add_oneshot(20, push(&log, "middle"));

        let fire_times: Vec<u64> = timers.iter().map(Timer::fire_at).collect();
        assert_eq!(fire_times, vec![1_010, 1_010, 1_020, 1_030]);

        clock.advance(30);
        timers.fire_expired();
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "middle", "late"]);
    }

    #[test]
    fn test_periodical_rearms_from_current_time() {
        let (clock, mut timers) = scheduler();
        let log = recorder();
        let id = timers.add_periodical(10, push(&log, "tick"));

        // Fire late: the next fire time is computed from "now", not 1_010.
        clock.advance(17);
        assert_eq!(timers.fire_expired(), 1);
        assert_eq!(timers.next_fire_at(), Some(1_027));

        clock.advance(10);
        assert_eq!(timers.fire_expired(), 1);
        assert_eq!(timers.next_fire_at(), Some(1_037));
        assert_eq!(log.lock().unwrap().len(), 2);

        assert!(timers.cancel(id));
        clock.advance(100);
        assert_eq!(timers.fire_expired(), 0);
    }

    #[test]
    fn test_cancel() {
        let (clock, mut timers) = scheduler();
        let log = recorder();
        let keep = timers.add_oneshot(5, push(&log, "keep"));
        let drop = timers.add_oneshot(5, push(&log, "drop"));

        assert!(timers.cancel(drop));
        assert!(!timers.cancel(drop), "second cancel finds nothing");

        clock.advance(5);
        timers.fire_expired();
        assert_eq!(*log.lock().unwrap(), vec!["keep"]);
        assert!(!timers.cancel(keep), "already fired");
    }

    #[test]
    fn test_cancel_while_in_flight_prevents_rearm() {
        let (clock, mut timers) = scheduler();
        let log = recorder();
        let id = timers.add_periodical(10, push(&log, "tick"));

        clock.advance(10);
        let mut expired = timers.expire();
        assert_eq!(expired.len(), 1);
        assert!(timers.is_empty(), "expired timers leave the live sequence first");

        for timer in expired.iter_mut() {
            timer.fire();
        }
        assert!(timers.cancel(id));
        timers.rearm(expired);

        assert!(timers.is_empty());
        assert!(!timers.cancel(id));
    }

    #[test]
    fn test_add_during_fire_waits_for_next_pass() {
        let (clock, mut timers) = scheduler();
        let log = recorder();
        timers.add_oneshot(0, push(&log, "now"));

        let mut expired = timers.expire();
        for timer in expired.iter_mut() {
            timer.fire();
        }
        timers.add_oneshot(0, push(&log, "added"));
        timers.rearm(expired);
        assert_eq!(*log.lock().unwrap(), vec!["now"]);

        clock.advance(1);
        timers.fire_expired();
        assert_eq!(*log.lock().unwrap(), vec!["now", "added"]);
    }

    #[test]
    fn test_reschedule_after_clock_change() {
        let (clock, mut timers) = scheduler();
        timers.add_oneshot(20, || {});
        timers.add_oneshot(10, || {});

        clock.set(50_000);
        timers.reschedule();
        let fire_times: Vec<u64> = timers.iter().map(Timer::fire_at).collect();
        assert_eq!(fire_times, vec![50_010, 50_020]);
    }

    #[test]
    fn test_monotonic_clock_advances() {
        let clock = MonotonicClock::new();
        let a = clock.now_millis();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(clock.now_millis() >= a + 5);
    }
}
