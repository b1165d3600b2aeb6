//! Testing utilities for `ferric::state`.

use super::StateInner;
use crate::config::Config;
use crate::peer::MessageQueueItem;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

pub(crate) type Queue = mpsc::Receiver<MessageQueueItem>;

/// Large enough that no test overflows a peer's queue.
const TEST_QUEUE_CAPACITY: usize = 512;

pub(crate) const TEST_PASSWORD: &str = "foobar";

pub(crate) fn simple_state() -> StateInner {
    let config = Config {
        password: TEST_PASSWORD.to_owned(),
        motd_path: PathBuf::from("motd-that-does-not-exist.txt"),
    };
    StateInner::new(config, None)
}

pub(crate) fn add_peer(state: &mut StateInner) -> (usize, Queue) {
    let (queue, outgoing) = mpsc::channel(TEST_QUEUE_CAPACITY);
    let key = state.peer_joined(queue, Arc::new(Notify::new()));
    (key, outgoing)
}

/// Adds a peer and registers it, discarding the welcome sequence.
pub(crate) fn add_registered(state: &mut StateInner, nick: &str) -> (usize, Queue) {
    let (key, mut outgoing) = add_peer(state);
    handle(state, key, &format!("NICK {}", nick));
    handle(state, key, &format!("USER {} * * :{}", nick, nick));
    flush(&mut outgoing);
    (key, outgoing)
}

pub(crate) fn handle(state: &mut StateInner, key: usize, line: &str) -> ControlFlow<()> {
    state.handle_line(key, line)
}

/// Discards everything queued for the peer.
pub(crate) fn flush(queue: &mut Queue) {
    while queue.try_recv().is_ok() {}
}

/// Drains the queue into one string of CRLF-terminated lines.
pub(crate) fn collect(queue: &mut Queue) -> String {
    let mut res = String::new();
    while let Ok(item) = queue.try_recv() {
        res.push_str(item.as_ref());
    }
    res
}

/// Asserts the exact sequence of lines (CRLF stripped) queued for a peer.
pub(crate) fn assert_lines(queue: &mut Queue, expected: &[&str]) {
    let collected = collect(queue);
    let actual: Vec<&str> = collected.lines().collect();
    assert_eq!(actual, expected);
}
