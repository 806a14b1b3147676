//! Reactor error types.

use crate::handler::HandlerError;
use std::panic::Location;
use thiserror::Error;
use zmreactor_core::address::AddressError;
use zmreactor_core::alternation::AlternationError;
use zmreactor_core::pattern::Pattern;

/// Main error type for reactor and socket operations
#[derive(Error, Debug)]
pub enum ReactorError {
    /// Transport error reported by libzmq
    #[error("Transport error: {0}")]
    Transport(#[from] zmq::Error),

    /// Operation would break the request/reply alternation
    #[error("Invalid state: {0}")]
    InvalidState(#[from] AlternationError),

    /// Operation not supported by the socket's pattern
    #[error("{operation} is not supported on {pattern} sockets")]
    WrongPattern {
        /// Pattern of the socket
        pattern: Pattern,
        /// Refused operation
        operation: &'static str,
    },

    /// Owner-thread-only operation called from another thread
    #[error("reactor '{reactor}' called from foreign thread at {location}")]
    ThreadViolation {
        /// Reactor name
        reactor: String,
        /// Caller of the refused operation
        location: &'static Location<'static>,
    },

    /// Socket already closed through the reactor
    #[error("Socket closed")]
    SocketClosed,

    /// `run` called on a reactor that was already started
    #[error("reactor '{0}' already started")]
    AlreadyStarted(String),

    /// Loop thread could not be spawned
    #[error("failed to spawn reactor thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// Handler's attach callback failed; the socket was closed again
    #[error("{pattern} socket attach failed: {source}")]
    Attach {
        /// Pattern of the socket that was being opened
        pattern: Pattern,
        /// Error returned by `on_attach`
        #[source]
        source: HandlerError,
    },

    /// Handler, timer or work callback returned an error
    #[error("{origin} callback failed: {source}")]
    Handler {
        /// Kind of callback: setup, work, timer, readable or writable
        origin: &'static str,
        /// Error returned by the callback
        #[source]
        source: HandlerError,
    },

    /// Handler, timer or work callback panicked
    #[error("{origin} callback panicked: {message}")]
    Panic {
        /// Kind of callback that panicked
        origin: &'static str,
        /// Panic payload, if it was a string
        message: String,
    },

    /// Address could not be parsed
    #[error("Invalid address: {0}")]
    Address(#[from] AddressError),

    /// Option value rejected before reaching the transport
    #[error("Invalid option: {0}")]
    InvalidOption(String),
}

/// Result type alias for reactor operations
pub type Result<T> = std::result::Result<T, ReactorError>;

impl ReactorError {
    pub(crate) fn wrong_pattern(pattern: Pattern, operation: &'static str) -> Self {
        Self::WrongPattern { pattern, operation }
    }

    /// Transport error code, if this is a transport error.
    #[must_use]
    pub const fn transport(&self) -> Option<zmq::Error> {
        match self {
            Self::Transport(e) => Some(*e),
            _ => None,
        }
    }

    /// Check if this is the transport's "would block" signal.
    #[must_use]
    pub fn is_would_block(&self) -> bool {
        self.transport() == Some(zmq::Error::EAGAIN)
    }

    /// Check if this error is recoverable: the socket stays usable and the
    /// loop carries on.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(e) => *e == zmq::Error::EAGAIN || is_recoverable_transport(*e),
            Self::InvalidState(_) | Self::WrongPattern { .. } | Self::ThreadViolation { .. } => {
                true
            }
            _ => false,
        }
    }

    /// Check if this error came out of user callback code.
    #[must_use]
    pub const fn is_callback_failure(&self) -> bool {
        matches!(
            self,
            Self::Handler { .. } | Self::Panic { .. } | Self::Attach { .. }
        )
    }
}

/// Transport errors that are logged and skipped rather than escalated:
/// interrupted calls and errors raised while a socket or context is being
/// torn down.
#[must_use]
pub fn is_recoverable_transport(error: zmq::Error) -> bool {
    matches!(
        error,
        zmq::Error::EINTR | zmq::Error::ENOTSUP | zmq::Error::ETERM | zmq::Error::ENOTSOCK
    )
}
