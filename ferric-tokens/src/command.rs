use std::fmt;

/// The verbs the server routes.
///
/// The set is closed and matching is exact: anything else is reported back
/// with the unknown-command reply once the peer has registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Away,
    Join,
    List,
    Lusers,
    Mode,
    Motd,
    Names,
    Nick,
    Notice,
    Oper,
    Part,
    Ping,
    Pong,
    PrivMsg,
    Quit,
    Topic,
    User,
    Who,
    Whois,
}

impl Command {
    /// Resolves a verb, or gives it back when it is not part of the set.
    pub fn parse(verb: &str) -> Result<Command, &str> {
        match verb {
            "AWAY" => Ok(Command::Away),
            "JOIN" => Ok(Command::Join),
            "LIST" => Ok(Command::List),
            "LUSERS" => Ok(Command::Lusers),
            "MODE" => Ok(Command::Mode),
            "MOTD" => Ok(Command::Motd),
            "NAMES" => Ok(Command::Names),
            "NICK" => Ok(Command::Nick),
            "NOTICE" => Ok(Command::Notice),
            "OPER" => Ok(Command::Oper),
            "PART" => Ok(Command::Part),
            "PING" => Ok(Command::Ping),
            "PONG" => Ok(Command::Pong),
            "PRIVMSG" => Ok(Command::PrivMsg),
            "QUIT" => Ok(Command::Quit),
            "TOPIC" => Ok(Command::Topic),
            "USER" => Ok(Command::User),
            "WHO" => Ok(Command::Who),
            "WHOIS" => Ok(Command::Whois),
            _ => Err(verb),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Command::Away => "AWAY",
            Command::Join => "JOIN",
            Command::List => "LIST",
            Command::Lusers => "LUSERS",
            Command::Mode => "MODE",
            Command::Motd => "MOTD",
            Command::Names => "NAMES",
            Command::Nick => "NICK",
            Command::Notice => "NOTICE",
            Command::Oper => "OPER",
            Command::Part => "PART",
            Command::Ping => "PING",
            Command::Pong => "PONG",
            Command::PrivMsg => "PRIVMSG",
            Command::Quit => "QUIT",
            Command::Topic => "TOPIC",
            Command::User => "USER",
            Command::Who => "WHO",
            Command::Whois => "WHOIS",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_exact() {
        assert_eq!(Command::parse("PRIVMSG"), Ok(Command::PrivMsg));
        assert_eq!(Command::parse("privmsg"), Err("privmsg"));
        assert_eq!(Command::parse("PRIVMSG "), Err("PRIVMSG "));
        assert_eq!(Command::parse(""), Err(""));
    }

    #[test]
    fn round_trips_through_as_str() {
        for verb in ["NICK", "USER", "JOIN", "PART", "NOTICE", "WHOIS"] {
            assert_eq!(Command::parse(verb).map(Command::as_str), Ok(verb));
        }
    }
}
