//! Example: request/reply load balancer on a reactor
//!
//! ```text
//! Clients (REQ) → ROUTER :5555 → DEALER :5556 → Workers (REP)
//! ```
//!
//! Run this example:
//! ```bash
//! cargo run --example queue_broker
//! ```
//!
//! Then connect REQ clients to 5555 and REP workers to 5556.

use std::time::Duration;
use zmreactor::prelude::*;

fn main() -> zmreactor::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let reactor = Reactor::new(ReactorConfig::new("queue-broker").with_exception_handler(|e| {
        tracing::error!(error = %e, "callback failed");
    }));

    reactor.run(|reactor| {
        let queue = Queue::new(
            DeviceConfig::new(reactor.clone(), "tcp://127.0.0.1:5555", "tcp://127.0.0.1:5556")
                .with_hwm(1000)
                .with_verbose(true),
        )?;
        tracing::info!(
            frontend = ?queue.incoming().bindings(),
            backend = ?queue.outgoing().bindings(),
            "queue running"
        );

        let r = reactor.clone();
        reactor.periodical_timer(Duration::from_secs(10), move || {
            tracing::info!(sockets = r.open_socket_count(None), "heartbeat");
        })?;
        Ok(())
    })?;

    reactor.join()
}
