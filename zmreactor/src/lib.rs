//! # zmreactor
//!
//! A single-threaded reactor for ZeroMQ sockets, timers and routing devices.
//!
//! ## Architecture
//!
//! - **`zmreactor-core`**: transport-independent pieces (timer scheduler,
//!   pattern tags, request/reply alternation, addresses, message envelopes)
//! - **`zmreactor`**: the reactor, its sockets and handlers, and the
//!   forwarder and queue devices (this crate)
//!
//! Each [`Reactor`] runs one loop thread. Sockets are opened through the
//! reactor with a handler whose callbacks the loop invokes on readiness;
//! timers and injected work run on the same thread, so handlers never need
//! locks of their own. Other threads talk to a reactor with
//! [`Reactor::schedule_work`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zmreactor::prelude::*;
//!
//! struct Echo;
//!
//! impl Handler for Echo {
//!     fn on_attach(&mut self, socket: &Socket) -> HandlerResult {
//!         socket.bind("tcp://*:5555")?;
//!         Ok(())
//!     }
//! }
//!
//! impl ReadableHandler for Echo {
//!     fn on_readable(&mut self, socket: &Socket, parts: Vec<Bytes>, _: Option<Vec<Bytes>>) -> HandlerResult {
//!         socket.send_multi(&parts)?;
//!         Ok(())
//!     }
//!
//!     fn on_readable_error(&mut self, _: &Socket, _: zmq::Error) -> HandlerResult {
//!         Ok(())
//!     }
//! }
//!
//! impl WritableHandler for Echo {
//!     fn on_writable(&mut self, _: &Socket) -> HandlerResult {
//!         Ok(())
//!     }
//!
//!     fn on_writable_error(&mut self, _: &Socket, _: zmq::Error) -> HandlerResult {
//!         Ok(())
//!     }
//! }
//!
//! let reactor = Reactor::new(ReactorConfig::new("echo"));
//! reactor.run(|reactor| {
//!     reactor.open_rep_socket(Echo)?;
//!     Ok(())
//! })?;
//! reactor.join()?;
//! # Ok::<(), zmreactor::ReactorError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod affinity;
pub mod config;
pub mod dev_tracing;
pub mod device;
pub mod error;
pub mod handler;
pub mod reactor;
pub mod socket;

// Re-export core types
pub use bytes::Bytes;
pub use zmq;
pub use zmreactor_core::{address, alternation, message, options, pattern, timers};

pub use config::ReactorConfig;
pub use error::{ReactorError, Result};
pub use reactor::Reactor;
pub use socket::{Socket, SocketId, WeakSocket};

/// Everything needed to write handlers and run a reactor.
pub mod prelude {
    pub use crate::config::{ExceptionHandler, ReactorConfig};
    pub use crate::device::{DeviceConfig, Forwarder, Queue};
    pub use crate::error::{ReactorError, Result};
    pub use crate::handler::{
        BidirectionalHandler, Handler, HandlerError, HandlerResult, ReadableHandler,
        WritableHandler,
    };
    pub use crate::reactor::Reactor;
    pub use crate::socket::{Socket, SocketId, WeakSocket};
    pub use bytes::Bytes;
    pub use zmreactor_core::address::Address;
    pub use zmreactor_core::message::Message;
    pub use zmreactor_core::options::SocketOptions;
    pub use zmreactor_core::pattern::{Interest, Pattern};
    pub use zmreactor_core::timers::{ManualClock, TimeSource, TimerId};
}
