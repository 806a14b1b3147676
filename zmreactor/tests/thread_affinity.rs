//! Owner-thread-only operations called from the wrong thread.

mod common;

use common::{shutdown, Recorder, WAIT};
use std::thread;
use std::time::{Duration, Instant};
use zmreactor::prelude::*;

fn running_with_pull() -> (Reactor, Socket) {
    zmreactor::dev_tracing::init_tracing();
    let reactor = Reactor::new(ReactorConfig::new("affinity"));
    let (tx, _rx) = flume::unbounded();
    let (sock_tx, sock_rx) = flume::bounded(1);
    reactor
        .run(move |r| {
            let pull = r.open_pull_socket(Recorder::new(r, tx))?;
            pull.bind("inproc://affinity")?;
            sock_tx.send(pull).unwrap();
            Ok(())
        })
        .unwrap();
    let pull = sock_rx.recv_timeout(WAIT).unwrap();
    (reactor, pull)
}

#[test]
fn test_foreign_calls_are_refused_and_counted() {
    let (reactor, pull) = running_with_pull();
    let (tx, _rx) = flume::unbounded();

    // The creating thread lost ownership when the loop started.
    let err = reactor.open_push_socket(Recorder::new(&reactor, tx)).unwrap_err();
    match err {
        ReactorError::ThreadViolation { reactor: name, location } => {
            assert_eq!(name, "affinity");
            assert!(location.file().ends_with("thread_affinity.rs"), "{location}");
        }
        other => panic!("expected thread violation, got {other:?}"),
    }

    assert!(matches!(
        reactor.oneshot_timer(Duration::from_millis(1), || {}),
        Err(ReactorError::ThreadViolation { .. })
    ));
    assert!(matches!(
        reactor.periodical_timer(Duration::from_millis(1), || {}),
        Err(ReactorError::ThreadViolation { .. })
    ));
    assert!(matches!(
        reactor.deregister_readable(&pull),
        Err(ReactorError::ThreadViolation { .. })
    ));
    assert!(matches!(
        reactor.reschedule_all_timers(),
        Err(ReactorError::ThreadViolation { .. })
    ));
    assert!(!reactor.close_socket(&pull));

    assert_eq!(reactor.thread_violations(), 6);

    // Nothing was changed.
    assert!(!pull.is_closed());
    assert_eq!(reactor.open_socket_count(None), 1);
    assert_eq!(reactor.timer_count(), 0);

    shutdown(&reactor);
    assert!(pull.is_closed());
}

#[test]
fn test_foreign_socket_calls_are_refused_and_counted() {
    let (reactor, pull) = running_with_pull();

    let err = pull.bind("inproc://affinity-foreign").unwrap_err();
    match err {
        ReactorError::ThreadViolation { location, .. } => {
            assert!(location.file().ends_with("thread_affinity.rs"), "{location}");
        }
        other => panic!("expected thread violation, got {other:?}"),
    }

    let refused = [
        pull.connect("inproc://affinity-foreign"),
        pull.set_identity(b"x"),
        pull.apply_options(&SocketOptions::new().with_hwm(5)),
        // Ownership is checked before the pattern.
        pull.subscribe(b"topic"),
        pull.unsubscribe(b"topic"),
        pull.send_str("x", false),
        pull.send_multi([&b"a"[..], &b"b"[..]]),
    ];
    for result in refused {
        assert!(matches!(result, Err(ReactorError::ThreadViolation { .. })), "{result:?}");
    }
    assert_eq!(reactor.thread_violations(), 8);

    // Nothing was changed.
    assert_eq!(pull.bindings(), vec!["inproc://affinity".to_string()]);
    assert!(pull.connections().is_empty());

    // The same calls on the loop thread go through.
    let (tx, rx) = flume::bounded(1);
    let socket = pull.clone();
    reactor.schedule_work(move || {
        tx.send(socket.bind("inproc://affinity-owned").is_ok()).unwrap();
    });
    assert!(rx.recv_timeout(WAIT).unwrap());
    assert_eq!(pull.bindings().len(), 2);
    assert_eq!(reactor.thread_violations(), 8);

    shutdown(&reactor);
}

#[test]
fn test_accessors_do_not_wait_for_poll() {
    zmreactor::dev_tracing::init_tracing();
    let reactor = Reactor::new(
        ReactorConfig::new("slow-poll").with_poll_interval(Duration::from_secs(2)),
    );
    let (tx, _rx) = flume::unbounded();
    let (sock_tx, sock_rx) = flume::bounded(1);
    reactor
        .run(move |r| {
            let pull = r.open_pull_socket(Recorder::new(r, tx).bind("inproc://slow-poll"))?;
            sock_tx.send(pull).unwrap();
            Ok(())
        })
        .unwrap();
    let pull = sock_rx.recv_timeout(WAIT).unwrap();
    // Let the loop settle into its long poll.
    thread::sleep(Duration::from_millis(50));

    let start = Instant::now();
    assert!(!pull.is_closed());
    assert_eq!(pull.bindings(), vec!["inproc://slow-poll".to_string()]);
    assert!(pull.connections().is_empty());
    assert!(format!("{pull:?}").contains("slow-poll"));
    assert!(start.elapsed() < Duration::from_millis(500), "{:?}", start.elapsed());

    shutdown(&reactor);
}

#[test]
fn test_other_threads_are_foreign_too() {
    let (reactor, pull) = running_with_pull();

    let remote = reactor.clone();
    let socket = pull.clone();
    let closed = thread::spawn(move || remote.close_socket(&socket)).join().unwrap();
    assert!(!closed);
    assert_eq!(reactor.thread_violations(), 1);
    assert!(!pull.is_closed());

    shutdown(&reactor);
}

#[test]
fn test_schedule_work_is_the_way_in() {
    let (reactor, pull) = running_with_pull();

    let (tx, rx) = flume::bounded(1);
    let r = reactor.clone();
    reactor.schedule_work(move || {
        let timer = r.oneshot_timer(Duration::from_secs(60), || {}).is_ok();
        tx.send((timer, r.close_socket(&pull))).unwrap();
    });

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), (true, true));
    assert_eq!(reactor.thread_violations(), 0);
    assert_eq!(reactor.open_socket_count(None), 0);
    assert_eq!(reactor.timer_count(), 1);

    shutdown(&reactor);
    assert_eq!(reactor.timer_count(), 0);
}
