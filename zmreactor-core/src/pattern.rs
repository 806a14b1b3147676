//! Messaging pattern tags for reactor-managed sockets.
//!
//! A [`Pattern`] is fixed when a socket endpoint is created and decides which
//! handler callbacks are required, the initial poll interest, and whether
//! received messages carry a routing envelope.

use std::fmt;

/// Messaging role of a socket endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Pattern {
    /// Strictly alternating request side (send, then receive)
    Request = 0,

    /// Strictly alternating reply side (receive, then send)
    Reply = 1,

    /// Identity-routing socket; received messages carry an envelope
    Router = 2,

    /// Load-balancing asynchronous socket; received messages carry an envelope
    Dealer = 3,

    /// Exclusive bidirectional socket
    Pair = 4,

    /// Broadcast side of publish/subscribe (write only)
    Publisher = 5,

    /// Filtered receive side of publish/subscribe (read only)
    Subscriber = 6,

    /// Pipeline sender (write only)
    Push = 7,

    /// Pipeline receiver (read only)
    Pull = 8,
}

/// Poll interest requested for a socket endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interest {
    /// Deliver read-readiness
    pub readable: bool,
    /// Deliver write-readiness
    pub writable: bool,
}

impl Interest {
    /// No interest at all.
    pub const NONE: Self = Self {
        readable: false,
        writable: false,
    };

    /// Read-readiness only.
    pub const READABLE: Self = Self {
        readable: true,
        writable: false,
    };

    /// Write-readiness only.
    pub const WRITABLE: Self = Self {
        readable: false,
        writable: true,
    };

    /// Both read- and write-readiness.
    pub const BOTH: Self = Self {
        readable: true,
        writable: true,
    };

    /// True when neither direction is requested.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.readable && !self.writable
    }
}

impl Pattern {
    /// All patterns, in declaration order.
    pub const ALL: [Pattern; 9] = [
        Self::Request,
        Self::Reply,
        Self::Router,
        Self::Dealer,
        Self::Pair,
        Self::Publisher,
        Self::Subscriber,
        Self::Push,
        Self::Pull,
    ];

    /// Get the pattern as a string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "REQ",
            Self::Reply => "REP",
            Self::Router => "ROUTER",
            Self::Dealer => "DEALER",
            Self::Pair => "PAIR",
            Self::Publisher => "PUB",
            Self::Subscriber => "SUB",
            Self::Push => "PUSH",
            Self::Pull => "PULL",
        }
    }

    /// True when sockets of this pattern can receive messages.
    #[must_use]
    pub const fn can_read(&self) -> bool {
        !matches!(self, Self::Publisher | Self::Push)
    }

    /// True when sockets of this pattern can send messages.
    #[must_use]
    pub const fn can_write(&self) -> bool {
        !matches!(self, Self::Subscriber | Self::Pull)
    }

    /// True for patterns whose received messages carry a routing envelope.
    #[must_use]
    pub const fn is_routing(&self) -> bool {
        matches!(self, Self::Router | Self::Dealer)
    }

    /// True for patterns that enforce strict send/receive alternation.
    #[must_use]
    pub const fn alternates(&self) -> bool {
        matches!(self, Self::Request | Self::Reply)
    }

    /// Poll interest registered when the endpoint is created.
    ///
    /// Handlers narrow or widen it later through the reactor's
    /// register/deregister calls.
    #[must_use]
    pub const fn default_interest(&self) -> Interest {
        match self {
            Self::Reply | Self::Subscriber | Self::Pull => Interest::READABLE,
            Self::Publisher | Self::Push => Interest::WRITABLE,
            Self::Request | Self::Router | Self::Dealer | Self::Pair => Interest::BOTH,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
