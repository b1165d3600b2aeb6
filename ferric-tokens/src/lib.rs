//! Tokenize the IRC line protocol.
//!
//! This library splits a single protocol line into its verb, arguments and
//! trailing text, without allocating for anything but the argument list.

pub use command::Command;
pub use message::Message;

mod command;
mod message;

/// Assert all data of a parsed message.
///
/// Empty elements in `args` are not compared with their counterpart in
/// `msg.args`, but still count for the assertion of the argument count.
pub fn assert_msg(msg: &Message<'_>, command: Result<Command, &str>, args: &[&str], trailing: &str) {
    assert_eq!(msg.command, command, "command of {:?}", msg);
    assert_eq!(msg.args.len(), args.len(), "number of arguments of {:?}", msg);
    for (i, (actual, expected)) in msg.args.iter().zip(args.iter()).enumerate() {
        if expected.is_empty() {
            continue;
        }
        assert_eq!(actual, expected, "argument #{} of {:?}", i, msg);
    }
    assert_eq!(msg.trailing, trailing, "trailing of {:?}", msg);
}
