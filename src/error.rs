//! The reply catalogue for failed commands.

use thiserror::Error;

/// Everything a command handler can fail with.
///
/// The `Display` rendering of each variant is the body of the reply line sent
/// back to the offending peer; the write path prepends the server source tag
/// and appends CRLF, so one failure is always exactly one line. Every variant
/// is recoverable except [`Error::Quitting`], which additionally terminates
/// the connection once the line is written.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("301 {sender} {peer} :{message}")]
    PeerIsAway {
        sender: String,
        peer: String,
        message: String,
    },

    #[error("401 {sender} {target} :No such nick/channel")]
    NoSuchUser { sender: String, target: String },

    #[error("403 {sender} {channel} :No such channel")]
    NoSuchChannel { sender: String, channel: String },

    #[error("404 {sender} {channel} :Cannot send to channel")]
    CannotSendToChannel { sender: String, channel: String },

    #[error("411 {sender} :No recipient given (PRIVMSG)")]
    NoRecipient { sender: String },

    #[error("412 {sender} :No text to send")]
    NoMessage { sender: String },

    #[error("421 {sender} {command} :Unknown command")]
    UnknownCommand { sender: String, command: String },

    #[error("431 * :No nickname given")]
    NoNickSpecified,

    #[error("433 * {nick} :Nickname is already in use")]
    NickAlreadyInUse { nick: String },

    #[error("441 {sender} {member} {channel} :They aren't on that channel")]
    SubjectNotOnChannel {
        sender: String,
        channel: String,
        member: String,
    },

    #[error("442 {sender} {channel} :You're not on that channel")]
    NotOnChannel { sender: String, channel: String },

    #[error("451 {sender} :You have not registered")]
    NotRegistered { sender: String },

    #[error("461 {sender} {command} :Not enough parameters")]
    NeedsMoreParams {
        sender: String,
        command: &'static str,
    },

    #[error("464 {sender} :Password incorrect")]
    IncorrectPassword { sender: String },

    #[error("472 {sender} {mode} :is unknown mode char to me for {channel}")]
    UnknownChannelMode {
        sender: String,
        channel: String,
        mode: char,
    },

    #[error("482 {sender} {channel} :You're not channel operator")]
    NotOperator { sender: String, channel: String },

    #[error("501 {sender} :Unknown MODE flag")]
    UnknownUserMode { sender: String },

    #[error("502 {sender} :Cannot change mode for other users")]
    CannotChangeForOtherUser { sender: String },

    #[error("ERROR :Closing Link: user said ({reason})")]
    Quitting { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renderings_are_wire_exact() {
        let err = Error::NickAlreadyInUse {
            nick: "alice".to_owned(),
        };
        assert_eq!(err.to_string(), "433 * alice :Nickname is already in use");

        let err = Error::SubjectNotOnChannel {
            sender: "alice".to_owned(),
            channel: "#room".to_owned(),
            member: "bob".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "441 alice bob #room :They aren't on that channel",
        );

        let err = Error::UnknownChannelMode {
            sender: "alice".to_owned(),
            channel: "#room".to_owned(),
            mode: 'x',
        };
        assert_eq!(
            err.to_string(),
            "472 alice x :is unknown mode char to me for #room",
        );

        let err = Error::Quitting {
            reason: "bye".to_owned(),
        };
        assert_eq!(err.to_string(), "ERROR :Closing Link: user said (bye)");
    }
}
