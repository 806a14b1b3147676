//! zmreactor core
//!
//! This crate contains the transport-independent building blocks of the
//! reactor:
//! - Ordered timer scheduling and time sources (`timers`)
//! - Messaging pattern tags and poll interest (`pattern`)
//! - Request/reply send-receive alternation (`alternation`)
//! - Transport address parsing (`address`)
//! - Socket option sets (`options`)
//! - Multipart message building and envelope splitting (`message`)

#![deny(unsafe_code)]
// Allow some pedantic lints that are intentional in this crate
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
pub mod address;
pub mod alternation;
pub mod message;
pub mod options;
pub mod pattern;
pub mod timers;

// Optional: a small prelude to make downstream crates ergonomic.
pub mod prelude {
    pub use crate::address::{Address, AddressError, Port};
    pub use crate::alternation::{Alternation, AlternationError, RepState, ReqState};
    pub use crate::message::{split_envelope, Message};
    pub use crate::options::SocketOptions;
    pub use crate::pattern::{Interest, Pattern};
    pub use crate::timers::{ManualClock, MonotonicClock, TimeSource, TimerId, Timers};
}
