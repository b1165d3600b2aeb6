//! The dispatch table and one handler per verb.

use super::{HandlerResult, StateInner};
use crate::error::Error;
use crate::peer::{say, say_from, MessageQueueItem};
use ferric_tokens::{Command, Message};
use std::collections::BTreeSet;

impl StateInner {
    /// The verb dispatch table.
    ///
    /// Commands that need registration first either fail with 451 (PRIVMSG
    /// and NOTICE) or are dropped silently, so clients may send pre-session
    /// chatter without being punished for it. Arity failures are reported
    /// with 461 except for NICK, which has its own reply.
    pub(super) fn route(&mut self, key: usize, msg: &Message<'_>) -> HandlerResult {
        let trailing = msg.trailing;
        let registered = self.peers[&key].is_registered();
        let command = match msg.command {
            Ok(command) => command,
            Err(verb) => return self.unknown_command(key, verb),
        };
        match command {
            Command::Nick => {
                let nick = msg.args.first().copied().ok_or(Error::NoNickSpecified)?;
                self.cmd_nick(key, nick)?;
                self.maybe_welcome(key);
                Ok(())
            }
            Command::User => {
                if msg.args.len() < 3 || trailing.is_empty() {
                    return Err(Error::NeedsMoreParams {
                        sender: self.peers[&key].nick_or_star().to_owned(),
                        command: "USER",
                    });
                }
                self.cmd_user(key, msg.args[0], trailing);
                self.maybe_welcome(key);
                Ok(())
            }
            Command::Motd => {
                self.write_motd(&self.peers[&key]);
                Ok(())
            }
            Command::PrivMsg | Command::Notice => {
                if !registered {
                    return Err(Error::NotRegistered {
                        sender: self.peers[&key].nick_or_star().to_owned(),
                    });
                }
                let result = if msg.args.is_empty() {
                    Err(Error::NoRecipient {
                        sender: self.peers[&key].nick_or_star().to_owned(),
                    })
                } else if trailing.is_empty() {
                    Err(Error::NoMessage {
                        sender: self.peers[&key].nick_or_star().to_owned(),
                    })
                } else {
                    self.send_query_or_channel_msg(key, command, msg.args[0], trailing)
                };
                if command == Command::Notice {
                    Ok(())
                } else {
                    result
                }
            }
            Command::Away => {
                if registered {
                    self.cmd_away(key, trailing);
                }
                Ok(())
            }
            Command::Join => {
                if !registered {
                    return Ok(());
                }
                match msg.args[..] {
                    [name] => self.cmd_join(key, name),
                    _ => Err(self.needs_more_params(key, "JOIN")),
                }
            }
            Command::Part => {
                if !registered {
                    return Ok(());
                }
                match msg.args[..] {
                    [name] => self.cmd_part(key, name, trailing),
                    _ => Err(self.needs_more_params(key, "PART")),
                }
            }
            Command::Names => {
                if !registered {
                    return Ok(());
                }
                match msg.args[..] {
                    [name] => self.cmd_names(key, name),
                    _ => self.cmd_all_names(key),
                }
            }
            Command::List => {
                if !registered {
                    return Ok(());
                }
                // LIST with a channel argument is accepted and ignored.
                if msg.args.len() == 1 {
                    Ok(())
                } else {
                    self.cmd_list(key)
                }
            }
            Command::Who => {
                if !registered {
                    return Ok(());
                }
                match msg.args[..] {
                    ["*"] => self.cmd_who_all(key),
                    [target] => self.cmd_who(key, target),
                    _ => Err(self.needs_more_params(key, "WHO")),
                }
            }
            Command::Mode => {
                if !registered {
                    return Ok(());
                }
                match msg.args[..] {
                    [subject] => self.cmd_get_mode(key, subject),
                    [subject, mode] => self.cmd_set_mode(key, subject, mode),
                    [channel, mode, nick] => self.cmd_set_membership_mode(key, channel, mode, nick),
                    _ => Err(self.needs_more_params(key, "MODE")),
                }
            }
            Command::Topic => {
                if !registered {
                    return Ok(());
                }
                match msg.args[..] {
                    [channel] if !trailing.is_empty() => self.cmd_set_topic(key, channel, trailing),
                    [channel] => self.cmd_get_topic(key, channel),
                    _ => Err(self.needs_more_params(key, "TOPIC")),
                }
            }
            Command::Ping => {
                let peer = &self.peers[&key];
                say!(peer, "PONG {}", peer.nick_or_star());
                Ok(())
            }
            Command::Pong => Ok(()),
            Command::Lusers => {
                self.write_lusers(&self.peers[&key]);
                Ok(())
            }
            Command::Oper => {
                if !registered {
                    return Ok(());
                }
                match msg.args[..] {
                    [_name, password] => self.cmd_oper(key, password),
                    _ => Err(self.needs_more_params(key, "OPER")),
                }
            }
            Command::Whois => match msg.args.first().copied() {
                Some(nick) => self.cmd_whois(key, nick),
                None => Ok(()),
            },
            Command::Quit => self.cmd_quit(key, trailing),
        }
    }

    fn needs_more_params(&self, key: usize, command: &'static str) -> Error {
        Error::NeedsMoreParams {
            sender: self.peers[&key].nick.clone(),
            command,
        }
    }

    fn unknown_command(&self, key: usize, verb: &str) -> HandlerResult {
        let peer = &self.peers[&key];
        if peer.sent_welcome {
            return Err(Error::UnknownCommand {
                sender: peer.nick_or_star().to_owned(),
                command: verb.to_owned(),
            });
        }
        Ok(())
    }

    fn cmd_nick(&mut self, key: usize, nick: &str) -> HandlerResult {
        if self.nicks.contains_key(nick) {
            return Err(Error::NickAlreadyInUse {
                nick: nick.to_owned(),
            });
        }

        // Members of the peer's rooms, the peer included, see the rename
        // under the old source prefix.
        let old = self.peers[&key].nick.clone();
        let msg = MessageQueueItem::from(format!(":{}!u@h NICK :{}\r\n", old, nick));
        for room in self.rooms.values() {
            if room.contains_member(key) {
                for member in room.members.keys() {
                    self.peers[member].send(msg.clone());
                }
            }
        }

        if !old.is_empty() {
            self.nicks.remove(&old);
        }
        self.nicks.insert(nick.to_owned(), key);
        if let Some(peer) = self.peers.get_mut(&key) {
            peer.nick = nick.to_owned();
        }
        Ok(())
    }

    fn cmd_user(&mut self, key: usize, user: &str, real_name: &str) {
        if let Some(peer) = self.peers.get_mut(&key) {
            peer.user = user.to_owned();
            peer.real_name = real_name.to_owned();
        }
    }

    fn cmd_away(&mut self, key: usize, away: &str) {
        if let Some(peer) = self.peers.get_mut(&key) {
            peer.away = away.to_owned();
        }
        let peer = &self.peers[&key];
        if peer.away.is_empty() {
            say!(peer, "305 {} :You are no longer marked as being away", peer.nick);
        } else {
            say!(peer, "306 {} :You have been marked as being away", peer.nick);
        }
    }

    /// Relays a PRIVMSG or NOTICE to a room or to a single peer.
    fn send_query_or_channel_msg(
        &mut self,
        key: usize,
        command: Command,
        target: &str,
        text: &str,
    ) -> HandlerResult {
        let sender = &self.peers[&key];
        let msg = MessageQueueItem::from(format!(
            ":{}!{}@c {} {} :{}\r\n",
            sender.nick, sender.user, command, target, text
        ));

        if target.starts_with('#') {
            let Some(room) = self.rooms.get(target) else {
                return Err(Error::NoSuchUser {
                    sender: sender.nick.clone(),
                    target: target.to_owned(),
                });
            };
            if !room.contains_member(key) {
                return Err(Error::CannotSendToChannel {
                    sender: sender.nick.clone(),
                    channel: target.to_owned(),
                });
            }
            if !sender.is_global_operator && !room.can_talk(key) {
                return Err(Error::CannotSendToChannel {
                    sender: sender.nick.clone(),
                    channel: target.to_owned(),
                });
            }
            for member in room.members.keys().filter(|&&member| member != key) {
                self.peers[member].send(msg.clone());
            }
        } else {
            let peer = match self.nicks.get(target) {
                Some(member) => &self.peers[member],
                None if command == Command::Notice => return Ok(()),
                None => {
                    return Err(Error::NoSuchUser {
                        sender: sender.nick.clone(),
                        target: target.to_owned(),
                    })
                }
            };
            if !peer.away.is_empty() {
                return Err(Error::PeerIsAway {
                    sender: sender.nick.clone(),
                    peer: target.to_owned(),
                    message: peer.away.clone(),
                });
            }
            peer.send(msg);
        }
        Ok(())
    }

    fn cmd_join(&mut self, key: usize, name: &str) -> HandlerResult {
        let room = self.rooms.entry(name.to_owned()).or_default();
        if room.contains_member(key) {
            return Ok(());
        }
        room.add_member(key);

        let peer = &self.peers[&key];
        let msg = MessageQueueItem::from(format!(":{}!u@h JOIN {}\r\n", peer.nick, name));
        let room = &self.rooms[name];
        for member in room.members.keys() {
            self.peers[member].send(msg.clone());
        }
        if !room.topic.is_empty() {
            say!(peer, "332 {} {} :{}", peer.nick, name, room.topic);
        }
        self.write_names(peer, name, room, None);
        say!(peer, "366 {} {} 3", peer.nick, name);
        Ok(())
    }

    fn cmd_part(&mut self, key: usize, name: &str, reason: &str) -> HandlerResult {
        let sender = &self.peers[&key];
        let Some(room) = self.rooms.get(name) else {
            return Err(Error::NoSuchChannel {
                sender: sender.nick.clone(),
                channel: name.to_owned(),
            });
        };

        // The broadcast goes out before the membership check, so even a
        // non-member's PART is seen by the whole room.
        let msg = if reason.is_empty() {
            MessageQueueItem::from(format!(":{}!u@h PART {}\r\n", sender.nick, name))
        } else {
            MessageQueueItem::from(format!(":{}!u@h PART {} :{}\r\n", sender.nick, name, reason))
        };
        for member in room.members.keys() {
            self.peers[member].send(msg.clone());
        }

        if !room.contains_member(key) {
            return Err(Error::NotOnChannel {
                sender: sender.nick.clone(),
                channel: name.to_owned(),
            });
        }
        self.remove_member(key, name);
        Ok(())
    }

    /// Removes a member, dropping the room in the same critical section when
    /// the last member leaves.
    fn remove_member(&mut self, key: usize, name: &str) {
        if let Some(room) = self.rooms.get_mut(name) {
            room.remove_member(key);
            if room.members.is_empty() {
                self.rooms.remove(name);
            }
        }
    }

    fn cmd_names(&mut self, key: usize, name: &str) -> HandlerResult {
        let peer = &self.peers[&key];
        if let Some(room) = self.rooms.get(name) {
            self.write_names(peer, name, room, None);
        }
        say!(peer, "366 {} {} 3", peer.nick, name);
        Ok(())
    }

    /// Names for every room, then one line crediting the peers that are in no
    /// room at all under the `*` placeholder.
    fn cmd_all_names(&mut self, key: usize) -> HandlerResult {
        let peer = &self.peers[&key];
        let mut leftover: BTreeSet<usize> = self.peers.keys().copied().collect();
        for (name, room) in &self.rooms {
            self.write_names(peer, name, room, Some(&mut leftover));
        }
        if !leftover.is_empty() {
            let mut users = String::new();
            for member in &leftover {
                users.push(' ');
                users.push_str(&self.peers[member].nick);
            }
            say!(peer, "353 {} * * :{}", peer.nick, &users[1..]);
        }
        say!(peer, "366 {} * 3", peer.nick);
        Ok(())
    }

    fn cmd_list(&mut self, key: usize) -> HandlerResult {
        let peer = &self.peers[&key];
        for (name, room) in &self.rooms {
            if room.topic.is_empty() {
                say!(peer, "322 {} {} {} :No topic set", peer.nick, name, room.members.len());
            } else {
                say!(peer, "322 {} {} {} :{}", peer.nick, name, room.members.len(), room.topic);
            }
        }
        say!(peer, "323 {} :End of LIST", peer.nick);
        Ok(())
    }

    fn cmd_who(&mut self, key: usize, channel: &str) -> HandlerResult {
        let sender = &self.peers[&key];
        let Some(room) = self.rooms.get(channel) else {
            return Err(Error::NoSuchUser {
                sender: sender.nick.clone(),
                target: channel.to_owned(),
            });
        };
        for (member, modes) in &room.members {
            let peer = &self.peers[member];
            let mut flags = String::from(if peer.away.is_empty() { "H" } else { "G" });
            if peer.is_global_operator {
                flags.push('*');
            }
            if let Some(symbol) = modes.symbol() {
                flags.push(symbol);
            }
            say!(sender, "352 {} {} 2 3 4 {} {} 7", sender.nick, channel, peer.nick, flags);
        }
        say!(sender, "315 {} {} :End of WHO list", sender.nick, channel);
        Ok(())
    }

    /// `WHO *`: every peer that shares no room with the sender.
    fn cmd_who_all(&mut self, key: usize) -> HandlerResult {
        let sender = &self.peers[&key];
        for (&member, peer) in &self.peers {
            let mutual = self
                .rooms
                .values()
                .any(|room| room.contains_member(key) && room.contains_member(member));
            if !mutual {
                let away = if peer.away.is_empty() { "H" } else { "G" };
                say!(sender, "352 {} * 2 3 4 {} {} 7", sender.nick, peer.nick, away);
            }
        }
        say!(sender, "315 {} * :End of WHO list", sender.nick);
        Ok(())
    }

    fn cmd_get_mode(&mut self, key: usize, subject: &str) -> HandlerResult {
        let peer = &self.peers[&key];
        let Some(room) = self.rooms.get(subject) else {
            return Err(Error::NoSuchChannel {
                sender: peer.nick.clone(),
                channel: subject.to_owned(),
            });
        };
        say!(peer, "324 {} {} {}", peer.nick, subject, room.modes());
        Ok(())
    }

    fn cmd_set_mode(&mut self, key: usize, subject: &str, mode: &str) -> HandlerResult {
        if subject.starts_with('#') {
            self.set_channel_mode(key, subject, mode)
        } else {
            self.set_user_mode(key, subject, mode)
        }
    }

    fn set_channel_mode(&mut self, key: usize, channel: &str, mode: &str) -> HandlerResult {
        let sender_nick = self.peers[&key].nick.clone();
        let global_operator = self.peers[&key].is_global_operator;
        let Some(room) = self.rooms.get_mut(channel) else {
            return Err(Error::NoSuchChannel {
                sender: sender_nick,
                channel: channel.to_owned(),
            });
        };
        if !global_operator && !room.is_operator(key) {
            return Err(Error::NotOperator {
                sender: sender_nick,
                channel: channel.to_owned(),
            });
        }
        let &[sign, flag] = mode.as_bytes() else {
            return Err(Error::UnknownChannelMode {
                sender: sender_nick,
                channel: channel.to_owned(),
                mode: '?',
            });
        };
        let enable = sign == b'+';
        match flag {
            b'm' => room.moderated = enable,
            b't' => room.fixed_topic = enable,
            other => {
                return Err(Error::UnknownChannelMode {
                    sender: sender_nick,
                    channel: channel.to_owned(),
                    mode: other as char,
                })
            }
        }
        let msg = MessageQueueItem::from(format!(
            ":{}!u@h MODE {} {}\r\n",
            sender_nick, channel, mode
        ));
        for member in room.members.keys() {
            self.peers[member].send(msg.clone());
        }
        Ok(())
    }

    fn set_user_mode(&mut self, key: usize, subject: &str, mode: &str) -> HandlerResult {
        let peer = &self.peers[&key];
        if subject != peer.nick {
            return Err(Error::CannotChangeForOtherUser {
                sender: peer.nick.clone(),
            });
        }
        let enable = mode.as_bytes().first() == Some(&b'+');
        match mode.as_bytes().get(1) {
            // A peer cannot grant itself operator status.
            Some(b'o') if enable => return Ok(()),
            Some(b'o') => {}
            Some(b'a') => return Ok(()),
            _ => {
                return Err(Error::UnknownUserMode {
                    sender: peer.nick.clone(),
                })
            }
        }
        say_from!(peer, &peer.nick, "MODE {} :{}", subject, mode);
        Ok(())
    }

    fn cmd_set_membership_mode(
        &mut self,
        key: usize,
        channel: &str,
        mode: &str,
        nick: &str,
    ) -> HandlerResult {
        let sender_nick = self.peers[&key].nick.clone();
        let global_operator = self.peers[&key].is_global_operator;
        let Some(room) = self.rooms.get_mut(channel) else {
            return Err(Error::NoSuchChannel {
                sender: sender_nick,
                channel: channel.to_owned(),
            });
        };
        if !global_operator && !room.is_operator(key) {
            return Err(Error::NotOperator {
                sender: sender_nick,
                channel: channel.to_owned(),
            });
        }
        let subject = room
            .members
            .keys()
            .copied()
            .find(|member| self.peers[member].nick == nick);
        let Some(subject) = subject else {
            return Err(Error::SubjectNotOnChannel {
                sender: sender_nick,
                channel: channel.to_owned(),
                member: nick.to_owned(),
            });
        };
        let &[sign, flag] = mode.as_bytes() else {
            return Err(Error::UnknownChannelMode {
                sender: sender_nick,
                channel: channel.to_owned(),
                mode: '?',
            });
        };
        let enable = sign == b'+';
        if let Some(modes) = room.members.get_mut(&subject) {
            match flag {
                b'v' => modes.voice = enable,
                b'o' => modes.operator = enable,
                other => {
                    return Err(Error::UnknownChannelMode {
                        sender: sender_nick,
                        channel: channel.to_owned(),
                        mode: other as char,
                    })
                }
            }
        }
        let msg = MessageQueueItem::from(format!(
            ":{}!u@h MODE {} {} {}\r\n",
            sender_nick, channel, mode, nick
        ));
        for member in room.members.keys() {
            self.peers[member].send(msg.clone());
        }
        Ok(())
    }

    fn cmd_set_topic(&mut self, key: usize, channel: &str, topic: &str) -> HandlerResult {
        let sender_nick = self.peers[&key].nick.clone();
        let global_operator = self.peers[&key].is_global_operator;
        let Some(room) = self.rooms.get_mut(channel) else {
            return Err(Error::NotOnChannel {
                sender: sender_nick,
                channel: channel.to_owned(),
            });
        };
        if !room.contains_member(key) {
            return Err(Error::NotOnChannel {
                sender: sender_nick,
                channel: channel.to_owned(),
            });
        }
        if room.fixed_topic && !global_operator && !room.is_operator(key) {
            return Err(Error::NotOperator {
                sender: sender_nick,
                channel: channel.to_owned(),
            });
        }
        room.topic = topic.to_owned();
        let msg = MessageQueueItem::from(format!(
            ":{}!u@h TOPIC {} :{}\r\n",
            sender_nick, channel, topic
        ));
        for member in room.members.keys() {
            self.peers[member].send(msg.clone());
        }
        Ok(())
    }

    fn cmd_get_topic(&mut self, key: usize, channel: &str) -> HandlerResult {
        let peer = &self.peers[&key];
        let Some(room) = self.rooms.get(channel) else {
            return Err(Error::NotOnChannel {
                sender: peer.nick.clone(),
                channel: channel.to_owned(),
            });
        };
        if !room.contains_member(key) {
            return Err(Error::NotOnChannel {
                sender: peer.nick.clone(),
                channel: channel.to_owned(),
            });
        }
        if room.topic.is_empty() {
            say!(peer, "331 {} {} :No topic is set", peer.nick, channel);
        } else {
            say!(peer, "332 {} {} :{}", peer.nick, channel, room.topic);
        }
        Ok(())
    }

    fn cmd_oper(&mut self, key: usize, password: &str) -> HandlerResult {
        if password != self.password {
            return Err(Error::IncorrectPassword {
                sender: self.peers[&key].nick.clone(),
            });
        }
        let peer = &self.peers[&key];
        say!(peer, "381 {} :You are now an IRC operator", peer.nick);
        if let Some(peer) = self.peers.get_mut(&key) {
            peer.is_global_operator = true;
        }
        Ok(())
    }

    fn cmd_whois(&mut self, key: usize, nick: &str) -> HandlerResult {
        let sender = &self.peers[&key];
        let Some(&subject_key) = self.nicks.get(nick) else {
            return Err(Error::NoSuchUser {
                sender: sender.nick.clone(),
                target: nick.to_owned(),
            });
        };
        let subject = &self.peers[&subject_key];
        say!(sender, "311 {} 1 2 3 4 :{}", sender.nick_or_star(), subject.real_name);

        let mut channels = String::new();
        for (name, room) in &self.rooms {
            if let Some(modes) = room.members.get(&subject_key) {
                if modes.operator {
                    channels.push('@');
                } else if modes.voice {
                    channels.push('+');
                }
                channels.push_str(name);
                channels.push(' ');
            }
        }
        if !channels.is_empty() {
            say!(sender, "319 {} 1 :{}", sender.nick, channels);
        }
        say!(sender, "312 {} 1 2 3", sender.nick);
        if !subject.away.is_empty() {
            say!(sender, "301 {} {} :{}", sender.nick, nick, subject.away);
        }
        if subject.is_global_operator {
            say!(sender, "313 {} {} :is an IRC operator", sender.nick, nick);
        }
        say!(sender, "318 {} 1 :End of WHOIS list", sender.nick);
        Ok(())
    }

    fn cmd_quit(&mut self, key: usize, reason: &str) -> HandlerResult {
        let reason = if reason.is_empty() { "Client Quit" } else { reason };
        self.quit_rooms(key, reason);
        Err(Error::Quitting {
            reason: reason.to_owned(),
        })
    }
}
