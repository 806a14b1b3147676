//! Send/receive alternation for request and reply endpoints.
//!
//! The transport already rejects out-of-order operations on REQ/REP sockets,
//! but it does so by moving the socket into an error state. [`Alternation`]
//! tracks the turn locally so the endpoint can refuse the operation before it
//! ever reaches the transport.
//!
//! ```text
//! REQ: Idle ─send→ AwaitingReply ─recv→ Idle
//! REP: AwaitingRequest ─recv→ ReadyToReply ─send→ AwaitingRequest
//! ```
//!
//! Multipart sends only complete the turn on the final frame.

use crate::pattern::Pattern;
use std::fmt;

/// REQ socket state for enforcing strict request-reply pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReqState {
    /// Ready to send a request
    Idle,
    /// Waiting for a reply after sending request
    AwaitingReply,
}

/// REP socket state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepState {
    /// Awaiting a request from the client
    AwaitingRequest,
    /// Received a request, ready to send reply
    ReadyToReply,
}

/// Error returned when an operation would break the alternation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{pattern} socket cannot {operation} while {state}")]
pub struct AlternationError {
    /// Pattern of the refusing endpoint
    pub pattern: Pattern,
    /// Operation that was refused
    pub operation: &'static str,
    /// Human readable state at the time of refusal
    pub state: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Turn {
    Free,
    Req(ReqState),
    Rep(RepState),
}

/// Turn tracker owned by a socket endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alternation {
    pattern: Pattern,
    turn: Turn,
    /// A multipart send has started but its final frame is still pending
    mid_message: bool,
}

impl Alternation {
    /// Create the tracker for a pattern. Non-alternating patterns never refuse.
    #[must_use]
    pub const fn new(pattern: Pattern) -> Self {
        let turn = match pattern {
            Pattern::Request => Turn::Req(ReqState::Idle),
            Pattern::Reply => Turn::Rep(RepState::AwaitingRequest),
            _ => Turn::Free,
        };
        Self {
            pattern,
            turn,
            mid_message: false,
        }
    }

    /// Current REQ state, if this tracks a request endpoint.
    #[must_use]
    pub const fn req_state(&self) -> Option<ReqState> {
        match self.turn {
            Turn::Req(state) => Some(state),
            _ => None,
        }
    }

    /// Current REP state, if this tracks a reply endpoint.
    #[must_use]
    pub const fn rep_state(&self) -> Option<RepState> {
        match self.turn {
            Turn::Rep(state) => Some(state),
            _ => None,
        }
    }

    /// True while a multipart send is waiting for its final frame.
    #[must_use]
    pub const fn is_mid_message(&self) -> bool {
        self.mid_message
    }

    /// Check whether a frame may be sent right now.
    ///
    /// Continuation frames of a message that already started are always allowed.
    pub fn check_send(&self) -> Result<(), AlternationError> {
        if self.mid_message {
            return Ok(());
        }
        match self.turn {
            Turn::Req(ReqState::AwaitingReply) => Err(self.refuse("send", "awaiting a reply")),
            Turn::Rep(RepState::AwaitingRequest) => Err(self.refuse("send", "awaiting a request")),
            _ => Ok(()),
        }
    }

    /// Record a frame that the transport accepted.
    ///
    /// `more` is the multipart continuation flag used for that frame.
    pub fn frame_sent(&mut self, more: bool) {
        if more {
            self.mid_message = true;
            return;
        }
        self.mid_message = false;
        self.turn = match self.turn {
            Turn::Req(_) => Turn::Req(ReqState::AwaitingReply),
            Turn::Rep(_) => Turn::Rep(RepState::AwaitingRequest),
            Turn::Free => Turn::Free,
        };
    }

    /// Check whether a complete message may be delivered right now.
    pub fn check_receive(&self) -> Result<(), AlternationError> {
        match self.turn {
            Turn::Req(ReqState::Idle) => Err(self.refuse("receive", "idle")),
            Turn::Rep(RepState::ReadyToReply) => Err(self.refuse("receive", "ready to reply")),
            _ => Ok(()),
        }
    }

    /// Record a complete message that was received.
    pub fn message_received(&mut self) {
        self.turn = match self.turn {
            Turn::Req(_) => Turn::Req(ReqState::Idle),
            Turn::Rep(_) => Turn::Rep(RepState::ReadyToReply),
            Turn::Free => Turn::Free,
        };
    }

    fn refuse(&self, operation: &'static str, state: &'static str) -> AlternationError {
        AlternationError {
            pattern: self.pattern,
            operation,
            state,
        }
    }
}

impl fmt::Display for Alternation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.turn {
            Turn::Free => write!(f, "{} (unrestricted)", self.pattern),
            Turn::Req(state) => write!(f, "{} {:?}", self.pattern, state),
            Turn::Rep(state) => write!(f, "{} {:?}", self.pattern, state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_req_refuses_second_send() {
        let mut req = Alternation::new(Pattern::Request);
        assert!(req.check_send().is_ok());
        req.frame_sent(false);
        assert_eq!(req.req_state(), Some(ReqState::AwaitingReply));

        let err = req.check_send().unwrap_err();
        assert_eq!(err.operation, "send");
        assert!(err.to_string().contains("awaiting a reply"));

        req.message_received();
        assert_eq!(req.req_state(), Some(ReqState::Idle));
        assert!(req.check_send().is_ok());
    }

    #[test]
    fn test_rep_must_receive_first() {
        let mut rep = Alternation::new(Pattern::Reply);
        assert!(rep.check_send().is_err());
        assert!(rep.check_receive().is_ok());

        rep.message_received();
        assert_eq!(rep.rep_state(), Some(RepState::ReadyToReply));
        assert!(rep.check_receive().is_err());
        assert!(rep.check_send().is_ok());

        rep.frame_sent(false);
        assert!(rep.check_send().is_err());
    }

    #[test]
    fn test_multipart_completes_on_last_frame() {
        let mut req = Alternation::new(Pattern::Request);
        req.frame_sent(true);
        assert!(req.is_mid_message());
        assert_eq!(req.req_state(), Some(ReqState::Idle));
        assert!(req.check_send().is_ok(), "continuation frames are allowed");

        req.frame_sent(true);
        req.frame_sent(false);
        assert!(!req.is_mid_message());
        assert!(req.check_send().is_err());
    }

    #[test]
    fn test_free_patterns_never_refuse() {
        for pattern in [Pattern::Dealer, Pattern::Router, Pattern::Pair, Pattern::Push] {
            let mut free = Alternation::new(pattern);
            for _ in 0..3 {
                assert!(free.check_send().is_ok());
                free.frame_sent(false);
            }
            assert!(free.check_receive().is_ok());
            assert!(free.req_state().is_none());
            assert!(free.rep_state().is_none());
        }
    }
}
