//! Shared state and the API that handles incoming commands.
//!
//! This module is split in two files:
//!
//! - `mod.rs`: public API of the server state, registry bookkeeping and the
//!   reply-writing utilities
//! - `commands.rs`: the dispatch table and one handler per verb

use crate::channel::Channel;
use crate::config::Config;
use crate::error::Error;
use crate::peer::{say, MessageQueue, MessageQueueItem, Peer};
use crate::trace::Trace;
use ferric_tokens::Message;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

mod commands;
#[cfg(test)]
mod test;

type HandlerResult = Result<(), Error>;

/// State of the whole chat network.
///
/// This is just an `Arc` around the real data, so it is cheap to clone and
/// clones share the same registry. Every command, including all of its
/// fan-out, runs under the one lock inside; the per-peer outbound queues are
/// what keep socket I/O out of that critical section.
///
/// # Example
///
/// ```rust
/// # use ferric::{Config, State};
/// # use std::sync::Arc;
/// # use tokio::sync::{mpsc, Notify};
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let state = State::new(Config::default(), None);
///
/// // Each connection gets a bounded queue; handlers push outbound lines
/// // onto it and a writer task drains it to the socket.
/// let (queue, mut outgoing) = mpsc::channel(16);
/// let key = state.peer_joined(queue, Arc::new(Notify::new())).await;
///
/// assert!(state.handle_line(key, "NICK ser").await.is_continue());
/// assert!(state.handle_line(key, "USER ser * * :ser").await.is_continue());
///
/// // Registration completed, so the welcome sequence is queued.
/// let msg = outgoing.recv().await.unwrap();
/// assert_eq!(
///     msg.as_ref(),
///     ":s 001 ser :Welcome to the Internet Relay Network ser!ser@foo\r\n",
/// );
/// # });
/// ```
#[derive(Clone)]
pub struct State(Arc<Mutex<StateInner>>);

impl State {
    pub fn new(config: Config, trace: Option<Arc<Trace>>) -> State {
        State(Arc::new(Mutex::new(StateInner::new(config, trace))))
    }

    /// Adds a connection to the registry and returns its peer key.
    ///
    /// The key is unique for the lifetime of the process; `disconnect` is
    /// fired when the peer must be torn down (a full outbound queue).
    pub async fn peer_joined(&self, queue: MessageQueue, disconnect: Arc<Notify>) -> usize {
        self.0.lock().await.peer_joined(queue, disconnect)
    }

    /// Removes a connection from the registry.
    ///
    /// If the peer was still in any room, the other members see a QUIT whose
    /// reason is the I/O error, or `dropped connection` when the stream just
    /// ended.
    pub async fn peer_quit(&self, key: usize, err: Option<io::Error>) {
        self.0.lock().await.peer_quit(key, err);
    }

    /// Parses and runs one line from the peer.
    ///
    /// `Break` means the peer has quit and the connection must close.
    pub async fn handle_line(&self, key: usize, line: &str) -> ControlFlow<()> {
        self.0.lock().await.handle_line(key, line)
    }
}

/// The actual shared data of the server: the registry of peers, nicks and
/// rooms, plus the configuration.
pub(crate) struct StateInner {
    /// Every connection, keyed by peer key.
    peers: BTreeMap<usize, Peer>,

    /// Owners of the non-empty nicks.
    nicks: HashMap<String, usize>,

    /// Rooms by name. A room listed here always has at least one member.
    rooms: BTreeMap<String, Channel>,

    /// How many peers have completed registration.
    user_count: usize,

    next_peer_key: usize,

    password: String,
    motd_path: PathBuf,
    trace: Option<Arc<Trace>>,
}

impl StateInner {
    pub fn new(config: Config, trace: Option<Arc<Trace>>) -> StateInner {
        StateInner {
            peers: BTreeMap::new(),
            nicks: HashMap::new(),
            rooms: BTreeMap::new(),
            user_count: 0,
            next_peer_key: 0,
            password: config.password,
            motd_path: config.motd_path,
            trace,
        }
    }

    pub fn peer_joined(&mut self, queue: MessageQueue, disconnect: Arc<Notify>) -> usize {
        let key = self.next_peer_key;
        self.next_peer_key += 1;
        log::debug!("{}: connected", key);
        self.peers
            .insert(key, Peer::new(key, queue, disconnect, self.trace.clone()));
        key
    }

    pub fn peer_quit(&mut self, key: usize, err: Option<io::Error>) {
        if !self.peers.contains_key(&key) {
            return;
        }
        log::debug!("{}: disconnected", key);
        let reason = match &err {
            Some(err) => err.to_string(),
            None => "dropped connection".to_owned(),
        };
        self.quit_rooms(key, &reason);
        self.remove_peer(key);
    }

    /// Broadcasts the QUIT to every room containing the peer and removes the
    /// peer from them, dropping the rooms it leaves empty.
    fn quit_rooms(&mut self, key: usize, reason: &str) {
        let nick = &self.peers[&key].nick;
        let msg = MessageQueueItem::from(format!(":{}!u@h QUIT :{}\r\n", nick, reason));
        for room in self.rooms.values() {
            if room.contains_member(key) {
                for member in room.members.keys().filter(|&&member| member != key) {
                    self.peers[member].send(msg.clone());
                }
            }
        }
        self.rooms.retain(|_, room| {
            room.remove_member(key);
            !room.members.is_empty()
        });
    }

    fn remove_peer(&mut self, key: usize) {
        if let Some(peer) = self.peers.remove(&key) {
            if !peer.nick.is_empty() {
                self.nicks.remove(&peer.nick);
            }
            if peer.sent_welcome {
                self.user_count -= 1;
            }
        }
    }

    /// Parses and dispatches one line, writing back the rendered reply when
    /// the handler fails. All of it happens under one lock acquisition, so
    /// the writes of two commands never interleave.
    pub fn handle_line(&mut self, key: usize, line: &str) -> ControlFlow<()> {
        if !self.peers.contains_key(&key) {
            return ControlFlow::Continue(());
        }
        let Some(msg) = Message::parse(line) else {
            return ControlFlow::Continue(());
        };
        log::debug!("{}: {:?} {:?} {:?}", key, msg.command, msg.args, msg.trailing);
        match self.route(key, &msg) {
            Ok(()) => ControlFlow::Continue(()),
            Err(err) => {
                let quitting = matches!(err, Error::Quitting { .. });
                let peer = &self.peers[&key];
                say!(peer, "{}", err);
                if quitting {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
        }
    }
}

// Reply-writing utilities.
impl StateInner {
    /// Sends the welcome sequence once, as soon as the peer has both its nick
    /// and its user name.
    fn maybe_welcome(&mut self, key: usize) {
        let Some(peer) = self.peers.get_mut(&key) else {
            return;
        };
        if !peer.is_registered() || peer.sent_welcome {
            return;
        }
        peer.sent_welcome = true;
        self.user_count += 1;

        let peer = &self.peers[&key];
        say!(
            peer,
            "001 {} :Welcome to the Internet Relay Network {}!{}@foo",
            peer.nick,
            peer.nick,
            peer.user
        );
        say!(peer, "002 {} :TBD", peer.nick);
        say!(peer, "003 {} :TBD", peer.nick);
        say!(peer, "004 {} 1 2 3 4", peer.nick);
        self.write_lusers(peer);
        self.write_motd(peer);
    }

    fn write_lusers(&self, peer: &Peer) {
        let users = self.user_count;
        let clients = self.peers.len();
        let operators = self
            .peers
            .values()
            .filter(|peer| peer.is_global_operator)
            .count();
        say!(
            peer,
            "251 {} :There are {} users and 0 services on 1 servers",
            peer.nick,
            users
        );
        say!(peer, "252 {} {} :operator(s) online", peer.nick, operators);
        say!(peer, "253 {} {} :unknown connection(s)", peer.nick, clients - users);
        say!(peer, "254 {} {} :channels formed", peer.nick, self.rooms.len());
        say!(peer, "255 {} :I have {} clients and 0 servers", peer.nick, clients);
    }

    /// Writes the message of the day, re-read from disk on every use; the
    /// file is small and may change while the server runs.
    fn write_motd(&self, peer: &Peer) {
        let motd = match fs::read_to_string(&self.motd_path) {
            Ok(motd) => motd,
            Err(_) => {
                say!(peer, "422 {} :MOTD File is missing", peer.nick);
                return;
            }
        };
        say!(peer, "375 {} :- Today's Message of the day - ", peer.nick);
        for line in motd.lines() {
            say!(peer, "372 {} :- {}", peer.nick, line);
        }
        say!(peer, "376 {} :End of MOTD command", peer.nick);
    }

    /// Writes the names line for one room, crossing listed members off
    /// `leftover` when collecting the all-channels listing.
    fn write_names(
        &self,
        peer: &Peer,
        name: &str,
        room: &Channel,
        mut leftover: Option<&mut BTreeSet<usize>>,
    ) {
        let mut members = String::new();
        for (&member, modes) in &room.members {
            if let Some(leftover) = leftover.as_deref_mut() {
                leftover.remove(&member);
            }
            members.push(' ');
            if let Some(symbol) = modes.symbol() {
                members.push(symbol);
            }
            members.push_str(&self.peers[&member].nick);
        }
        say!(peer, "353 {} = {} :{}", peer.nick, name, &members[1..]);
    }
}

#[cfg(test)]
mod tests {
    use super::test::{add_peer, add_registered, assert_lines, collect, handle, simple_state};
    use std::ops::ControlFlow;

    #[test]
    fn peer_keys_are_monotonic_and_stable() {
        let mut state = simple_state();
        let (a, _qa) = add_peer(&mut state);
        let (b, _qb) = add_peer(&mut state);
        assert_eq!((a, b), (0, 1));
        state.peer_quit(a, None);
        let (c, _qc) = add_peer(&mut state);
        assert_eq!(c, 2);
    }

    #[test]
    fn blank_lines_are_dropped() {
        let mut state = simple_state();
        let (key, mut queue) = add_peer(&mut state);
        assert_eq!(handle(&mut state, key, ""), ControlFlow::Continue(()));
        assert_eq!(handle(&mut state, key, "    "), ControlFlow::Continue(()));
        assert_eq!(collect(&mut queue), "");
    }

    #[test]
    fn teardown_clears_every_index() {
        let mut state = simple_state();
        let (key, _queue) = add_registered(&mut state, "alice");
        handle(&mut state, key, "JOIN #room");
        state.peer_quit(key, None);
        assert!(state.peers.is_empty());
        assert!(state.nicks.is_empty());
        assert!(state.rooms.is_empty());
        assert_eq!(state.user_count, 0);
    }

    #[test]
    fn dropped_connection_broadcasts_a_quit() {
        let mut state = simple_state();
        let (alice, _qa) = add_registered(&mut state, "alice");
        let (bob, mut qb) = add_registered(&mut state, "bob");
        handle(&mut state, alice, "JOIN #room");
        handle(&mut state, bob, "JOIN #room");
        collect(&mut qb);
        state.peer_quit(alice, None);
        assert_lines(&mut qb, &[":alice!u@h QUIT :dropped connection"]);
        assert!(state.rooms["#room"].contains_member(bob));
    }

    #[test]
    fn quit_then_teardown_does_not_broadcast_twice() {
        let mut state = simple_state();
        let (alice, mut qa) = add_registered(&mut state, "alice");
        let (bob, mut qb) = add_registered(&mut state, "bob");
        handle(&mut state, alice, "JOIN #room");
        handle(&mut state, bob, "JOIN #room");
        collect(&mut qa);
        collect(&mut qb);
        assert_eq!(handle(&mut state, alice, "QUIT :bye"), ControlFlow::Break(()));
        state.peer_quit(alice, None);
        assert_lines(&mut qa, &[":s ERROR :Closing Link: user said (bye)"]);
        assert_lines(&mut qb, &[":alice!u@h QUIT :bye"]);
    }

    #[test]
    fn registered_count_follows_the_welcome_latch() {
        let mut state = simple_state();
        let (alice, _qa) = add_registered(&mut state, "alice");
        let (_half, _qh) = add_peer(&mut state);
        assert_eq!(state.user_count, 1);
        assert_eq!(state.peers.len(), 2);
        state.peer_quit(alice, None);
        assert_eq!(state.user_count, 0);
        assert_eq!(state.peers.len(), 1);
    }
}
