use crate::Command;

/// One tokenized protocol line, borrowing from the input.
///
/// The grammar is `<verb> (SP <arg>)* (SP ':' <trailing>)?`: the verb is the
/// first space-delimited token (leading and repeated spaces collapse), the
/// first `:` anywhere after the verb starts the trailing text, which runs to
/// the end of the line with its spaces preserved.
#[derive(Debug, PartialEq, Eq)]
pub struct Message<'a> {
    /// The resolved verb, or the raw token when it is not a known command.
    pub command: Result<Command, &'a str>,
    pub args: Vec<&'a str>,
    /// Empty when the line has no `:` part.
    pub trailing: &'a str,
}

impl<'a> Message<'a> {
    /// Tokenizes one line, without its line ending.
    ///
    /// Returns `None` for lines that are empty or all spaces.
    pub fn parse(line: &'a str) -> Option<Message<'a>> {
        let bytes = line.as_bytes();

        let mut start = 0;
        while start < bytes.len() && bytes[start] == b' ' {
            start += 1;
        }
        if start == bytes.len() {
            return None;
        }
        let mut end = start;
        while end < bytes.len() && bytes[end] != b' ' {
            end += 1;
        }
        let verb = &line[start..end];
        let rest = if end < bytes.len() { &line[end + 1..] } else { "" };

        let mut args = Vec::new();
        let mut trailing = "";
        let rb = rest.as_bytes();
        let mut s = 0;
        for (i, &c) in rb.iter().enumerate() {
            if c == b':' {
                if s < i {
                    args.push(&rest[s..i]);
                }
                trailing = &rest[i + 1..];
                s = rb.len();
                break;
            } else if c == b' ' {
                if s < i {
                    args.push(&rest[s..i]);
                }
                s = i + 1;
            }
        }
        if s < rb.len() {
            args.push(&rest[s..]);
        }

        Some(Message {
            command: Command::parse(verb),
            args,
            trailing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_msg;

    #[test]
    fn verb_only() {
        let msg = Message::parse("LUSERS").unwrap();
        assert_msg(&msg, Ok(Command::Lusers), &[], "");
    }

    #[test]
    fn verb_args_and_trailing() {
        let msg = Message::parse("USER alice * * :Alice Liddell").unwrap();
        assert_msg(&msg, Ok(Command::User), &["alice", "*", "*"], "Alice Liddell");
    }

    #[test]
    fn spaces_collapse_around_tokens() {
        let msg = Message::parse("   JOIN    #room   ").unwrap();
        assert_msg(&msg, Ok(Command::Join), &["#room"], "");
    }

    #[test]
    fn trailing_keeps_its_spaces_and_colons() {
        let msg = Message::parse("PRIVMSG #room : spaced  out : text ").unwrap();
        assert_msg(&msg, Ok(Command::PrivMsg), &["#room"], " spaced  out : text ");
    }

    #[test]
    fn first_colon_starts_trailing_even_inside_a_token() {
        let msg = Message::parse("PRIVMSG b:ob hi").unwrap();
        assert_msg(&msg, Ok(Command::PrivMsg), &["b"], "ob hi");
    }

    #[test]
    fn colon_with_no_text_reads_as_empty_trailing() {
        let msg = Message::parse("PRIVMSG bob :").unwrap();
        assert_msg(&msg, Ok(Command::PrivMsg), &["bob"], "");
        let msg = Message::parse("PRIVMSG bob").unwrap();
        assert_msg(&msg, Ok(Command::PrivMsg), &["bob"], "");
    }

    #[test]
    fn unknown_verbs_are_returned_raw() {
        let msg = Message::parse("CAP LS 302").unwrap();
        assert_msg(&msg, Err("CAP"), &["LS", "302"], "");
    }

    #[test]
    fn blank_lines_parse_to_nothing() {
        assert_eq!(Message::parse(""), None);
        assert_eq!(Message::parse("     "), None);
    }
}
