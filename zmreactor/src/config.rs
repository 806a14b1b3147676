//! Reactor configuration.

use crate::error::ReactorError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use zmreactor_core::timers::{MonotonicClock, TimeSource};

/// Default upper bound on one poll step.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Shortest poll step accepted.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Receives callback failures when installed on a reactor.
///
/// Without one, the first failing callback stops the reactor and `join`
/// returns the error.
pub type ExceptionHandler = Arc<dyn Fn(&ReactorError) + Send + Sync>;

/// Reactor configuration.
///
/// # Examples
///
/// ```
/// use zmreactor::config::ReactorConfig;
/// use std::time::Duration;
///
/// let config = ReactorConfig::new("ingest")
///     .with_poll_interval(Duration::from_millis(5))
///     .with_exception_handler(|err| eprintln!("handler failed: {err}"));
/// assert_eq!(config.poll_interval, Duration::from_millis(5));
/// ```
#[derive(Clone)]
pub struct ReactorConfig {
    /// Reactor name; also names the loop thread and its tracing span
    pub name: String,

    /// Upper bound on one poll step. Clamped to at least 1 ms.
    pub poll_interval: Duration,

    /// Transport context shared with other reactors. `None` gives the
    /// reactor a private context that it terminates on cleanup.
    pub context: Option<zmq::Context>,

    /// Receives callback failures instead of stopping the reactor
    pub exception_handler: Option<ExceptionHandler>,

    /// Clock driving the timers
    pub time_source: Arc<dyn TimeSource>,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            name: "reactor".to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            context: None,
            exception_handler: None,
            time_source: Arc::new(MonotonicClock::new()),
        }
    }
}

impl ReactorConfig {
    /// Create a configuration with default values and the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Share a transport context (required for `inproc://` between reactors).
    pub fn with_context(mut self, context: zmq::Context) -> Self {
        self.context = Some(context);
        self
    }

    /// Route callback failures to `handler`.
    pub fn with_exception_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ReactorError) + Send + Sync + 'static,
    {
        self.exception_handler = Some(Arc::new(handler));
        self
    }

    /// Drive timers from a custom clock.
    pub fn with_time_source(mut self, source: Arc<dyn TimeSource>) -> Self {
        self.time_source = source;
        self
    }

    /// Poll interval after clamping.
    #[must_use]
    pub fn effective_poll_interval(&self) -> Duration {
        self.poll_interval.max(MIN_POLL_INTERVAL)
    }
}

impl fmt::Debug for ReactorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactorConfig")
            .field("name", &self.name)
            .field("poll_interval", &self.poll_interval)
            .field("shared_context", &self.context.is_some())
            .field("exception_handler", &self.exception_handler.is_some())
            .finish_non_exhaustive()
    }
}
