//! ferric, a multi-user chat relay speaking the classic IRC line protocol.
//!
//! The server keeps one registry of peers, nicks and rooms behind a single
//! async mutex. Each connection has a reader task that parses CRLF-delimited
//! commands and a writer task that drains a bounded outbound queue, so
//! handlers never block on socket I/O and every command's responses form one
//! uninterrupted run in each peer's transcript. See [`State`] for the
//! entry points.

pub mod config;
pub mod net;
pub mod state;

mod channel;
mod error;
mod peer;
mod trace;

pub use config::Config;
pub use peer::{MessageQueue, MessageQueueItem, OUTGOING_QUEUE_CAPACITY};
pub use state::State;
pub use trace::Trace;
