//! Example: timer-driven publisher, forwarder and subscriber on one context
//!
//! A PUB socket publishes a tick every 200ms into a forwarder; a SUB socket
//! on a second reactor reads them back out. The run stops itself after two
//! seconds.
//!
//! ```bash
//! cargo run --example ticker_pubsub
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use zmreactor::prelude::*;

const FWD_IN: &str = "inproc://ticks-in";
const FWD_OUT: &str = "inproc://ticks-out";

/// Publisher that only connects; sends come from a timer.
struct Ticker;

impl Handler for Ticker {
    fn on_attach(&mut self, socket: &Socket) -> HandlerResult {
        socket.connect(FWD_IN)?;
        Ok(())
    }
}

impl WritableHandler for Ticker {
    fn on_writable(&mut self, _socket: &Socket) -> HandlerResult {
        Ok(())
    }

    fn on_writable_error(&mut self, _socket: &Socket, error: zmq::Error) -> HandlerResult {
        Err(error.into())
    }
}

struct Printer;

impl Handler for Printer {
    fn on_attach(&mut self, socket: &Socket) -> HandlerResult {
        socket.connect(FWD_OUT)?;
        socket.subscribe(b"tick")?;
        Ok(())
    }
}

impl ReadableHandler for Printer {
    fn on_readable(&mut self, _: &Socket, parts: Vec<Bytes>, _: Option<Vec<Bytes>>) -> HandlerResult {
        let text: Vec<_> = parts.iter().map(|p| String::from_utf8_lossy(p)).collect();
        tracing::info!(message = ?text, "received");
        Ok(())
    }

    fn on_readable_error(&mut self, _: &Socket, error: zmq::Error) -> HandlerResult {
        Err(error.into())
    }
}

fn main() -> zmreactor::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_thread_names(true)
        .init();

    let ctx = zmq::Context::new();
    let broker = Reactor::new(ReactorConfig::new("broker").with_context(ctx.clone()));
    let client = Reactor::new(ReactorConfig::new("client").with_context(ctx));

    broker.run(|reactor| {
        Forwarder::new(DeviceConfig::new(reactor.clone(), FWD_IN, FWD_OUT))?;

        let publisher = reactor.open_pub_socket(Ticker)?;
        reactor.deregister_writable(&publisher)?;
        let seq = Arc::new(AtomicU32::new(0));
        reactor.periodical_timer(Duration::from_millis(200), move || {
            let n = seq.fetch_add(1, Ordering::Relaxed);
            if let Err(e) = publisher.send_multi([&b"tick"[..], n.to_string().as_bytes()]) {
                tracing::warn!(error = %e, "tick dropped");
            }
        })?;
        Ok(())
    })?;

    client.run(|reactor| {
        reactor.open_sub_socket(Printer)?;
        Ok(())
    })?;

    std::thread::sleep(Duration::from_secs(2));
    client.stop(Some(Duration::from_secs(1)));
    broker.stop(Some(Duration::from_secs(1)));
    client.join()?;
    broker.join()
}
