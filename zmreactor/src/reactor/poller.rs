//! Poll registrations for the reactor's sockets.
//!
//! Each live socket owns exactly one registration, kept in creation order.
//! Interest is toggled per direction by handlers; a registration with no
//! interest stays in place but is left out of the poll set.

use crate::socket::{Socket, SocketId};
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::time::Duration;
use zmreactor_core::pattern::Interest;

/// Readiness reported for one socket by a poll step.
#[derive(Debug)]
pub(crate) struct Ready {
    pub(crate) socket: Socket,
    pub(crate) readable: bool,
    pub(crate) writable: bool,
}

pub(crate) type ReadySet = SmallVec<[Ready; 8]>;

#[derive(Debug, Default)]
pub(crate) struct Poller {
    entries: Vec<(SocketId, Interest)>,
}

impl Poller {
    pub(crate) fn register(&mut self, id: SocketId, interest: Interest) {
        match self.entries.iter_mut().find(|(e, _)| *e == id) {
            Some((_, current)) => *current = interest,
            None => self.entries.push((id, interest)),
        }
    }

    /// Remove the registration. Returns `false` if there was none.
    pub(crate) fn remove(&mut self, id: SocketId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(e, _)| *e != id);
        self.entries.len() != before
    }

    pub(crate) fn interest(&self, id: SocketId) -> Option<Interest> {
        self.entries
            .iter()
            .find(|(e, _)| *e == id)
            .map(|(_, interest)| *interest)
    }

    /// Toggle read interest. Returns `false` if the socket is not registered.
    pub(crate) fn set_readable(&mut self, id: SocketId, on: bool) -> bool {
        self.update(id, |interest| interest.readable = on)
    }

    /// Toggle write interest. Returns `false` if the socket is not registered.
    pub(crate) fn set_writable(&mut self, id: SocketId, on: bool) -> bool {
        self.update(id, |interest| interest.writable = on)
    }

    fn update(&mut self, id: SocketId, f: impl FnOnce(&mut Interest)) -> bool {
        match self.entries.iter_mut().find(|(e, _)| *e == id) {
            Some((_, interest)) => {
                f(interest);
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Registrations that currently request any readiness.
    pub(crate) fn active(&self, handles: &HashMap<SocketId, Socket>) -> Vec<(Socket, Interest)> {
        self.entries
            .iter()
            .filter(|(_, interest)| !interest.is_empty())
            .filter_map(|(id, interest)| handles.get(id).map(|s| (s.clone(), *interest)))
            .collect()
    }
}

fn poll_events(interest: Interest) -> zmq::PollEvents {
    let mut events = zmq::PollEvents::empty();
    if interest.readable {
        events |= zmq::POLLIN;
    }
    if interest.writable {
        events |= zmq::POLLOUT;
    }
    events
}

/// Wait up to `timeout` for readiness on `active`.
///
/// Returns `Ok(None)` when there is nothing to poll so the caller can sleep
/// instead. An interrupted poll reports no readiness.
///
/// Every polled socket's state stays locked until the poll returns, so a
/// socket cannot be closed under the poll. Anything else that needs that
/// lock (sends and closes from a killer thread) waits up to `timeout`.
pub(crate) fn poll(active: &[(Socket, Interest)], timeout: Duration) -> zmq::Result<Option<ReadySet>> {
    let guards: Vec<_> = active.iter().map(|(socket, _)| socket.lock_state()).collect();

    let mut owners = Vec::with_capacity(active.len());
    let mut items = Vec::with_capacity(active.len());
    for ((socket, interest), state) in active.iter().zip(&guards) {
        if let Some(raw) = state.raw.as_ref() {
            items.push(raw.as_poll_item(poll_events(*interest)));
            owners.push(socket);
        }
    }
    if items.is_empty() {
        return Ok(None);
    }

    let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
    match zmq::poll(&mut items, timeout_ms) {
        Ok(_) => {}
        Err(zmq::Error::EINTR) => return Ok(Some(ReadySet::new())),
        Err(e) => return Err(e),
    }

    let ready = owners
        .into_iter()
        .zip(&items)
        .filter(|(_, item)| item.is_readable() || item.is_writable())
        .map(|(socket, item)| Ready {
            socket: socket.clone(),
            readable: item.is_readable(),
            writable: item.is_writable(),
        })
        .collect();
    Ok(Some(ready))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_toggles() {
        let mut poller = Poller::default();
        let a = SocketId(1);
        let b = SocketId(2);
        poller.register(a, Interest::BOTH);
        poller.register(b, Interest::READABLE);
        assert_eq!(poller.len(), 2);

        assert!(poller.set_writable(a, false));
        assert_eq!(poller.interest(a), Some(Interest::READABLE));
        assert!(poller.set_readable(b, false));
        assert_eq!(poller.interest(b), Some(Interest::NONE));

        assert!(!poller.set_readable(SocketId(9), true));
        assert!(poller.remove(a));
        assert!(!poller.remove(a));
        assert_eq!(poller.len(), 1);
    }

    #[test]
    fn test_register_twice_keeps_one_entry() {
        let mut poller = Poller::default();
        poller.register(SocketId(1), Interest::READABLE);
        poller.register(SocketId(1), Interest::WRITABLE);
        assert_eq!(poller.len(), 1);
        assert_eq!(poller.interest(SocketId(1)), Some(Interest::WRITABLE));
    }

    #[test]
    fn test_poll_events() {
        assert_eq!(poll_events(Interest::NONE), zmq::PollEvents::empty());
        assert_eq!(poll_events(Interest::BOTH), zmq::POLLIN | zmq::POLLOUT);
    }

    #[test]
    fn test_poll_nothing_active() {
        assert!(poll(&[], Duration::from_millis(1)).unwrap().is_none());
    }
}
