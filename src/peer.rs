//! Connected peers and their outbound write path.

use crate::trace::Trace;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::Notify;

/// How many outbound lines may be queued for one peer before it is dropped as
/// a slow consumer.
pub const OUTGOING_QUEUE_CAPACITY: usize = 100_000;

/// One formatted outbound line, shared between all of its recipients.
///
/// Fan-out formats a line once and clones the item per member. An empty item
/// is a flush request for the writer task, not a message.
#[derive(Clone, Debug)]
pub struct MessageQueueItem(Arc<str>);

impl MessageQueueItem {
    pub fn flush() -> MessageQueueItem {
        MessageQueueItem(Arc::from(""))
    }
}

impl From<String> for MessageQueueItem {
    fn from(line: String) -> MessageQueueItem {
        MessageQueueItem(Arc::from(line))
    }
}

impl AsRef<str> for MessageQueueItem {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub type MessageQueue = mpsc::Sender<MessageQueueItem>;

/// A connected client and what the server knows about it.
///
/// All the string fields start out empty; an empty `nick` or `user` means the
/// command that sets it has not been accepted yet, an empty `away` means the
/// peer is not away.
pub struct Peer {
    key: usize,
    queue: MessageQueue,
    disconnect: Arc<Notify>,
    trace: Option<Arc<Trace>>,

    pub nick: String,
    pub user: String,
    pub real_name: String,
    pub away: String,
    pub is_global_operator: bool,
    pub sent_welcome: bool,
}

impl Peer {
    pub fn new(
        key: usize,
        queue: MessageQueue,
        disconnect: Arc<Notify>,
        trace: Option<Arc<Trace>>,
    ) -> Peer {
        Peer {
            key,
            queue,
            disconnect,
            trace,
            nick: String::new(),
            user: String::new(),
            real_name: String::new(),
            away: String::new(),
            is_global_operator: false,
            sent_welcome: false,
        }
    }

    /// The peer's nick, or `*` before one is set.
    pub fn nick_or_star(&self) -> &str {
        if self.nick.is_empty() {
            "*"
        } else {
            &self.nick
        }
    }

    /// Whether both NICK and USER have been accepted.
    pub fn is_registered(&self) -> bool {
        !self.nick.is_empty() && !self.user.is_empty()
    }

    /// Writes a server-sourced line: `:s <args>`.
    pub fn say(&self, args: fmt::Arguments<'_>) {
        self.send(MessageQueueItem::from(format!(":s {args}\r\n")));
    }

    /// Writes a relayed line: `:<source> <args>`.
    pub fn say_from(&self, source: &str, args: fmt::Arguments<'_>) {
        self.send(MessageQueueItem::from(format!(":{source} {args}\r\n")));
    }

    /// Enqueues one already-formatted line.
    ///
    /// Never blocks: the queue is bounded, and a peer that lets it fill up is
    /// disconnected rather than allowed to hold up the registry lock. Sends to
    /// a peer whose writer is gone are dropped, which is also what lets tests
    /// drive handlers against in-memory peers.
    pub fn send(&self, msg: MessageQueueItem) {
        if let Some(trace) = &self.trace {
            trace.output(self.key, msg.as_ref());
        }
        match self.queue.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::warn!("{}: outbound queue full, dropping connection", self.key);
                self.disconnect.notify_one();
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

/// Formats a server-sourced reply to a peer.
macro_rules! say {
    ($peer:expr, $($arg:tt)*) => {
        $peer.say(format_args!($($arg)*))
    };
}

/// Formats a relayed line to a peer.
macro_rules! say_from {
    ($peer:expr, $source:expr, $($arg:tt)*) => {
        $peer.say_from($source, format_args!($($arg)*))
    };
}

pub(crate) use say;
pub(crate) use say_from;
