use std::collections::BTreeMap;

/// Modes applied to peers on a per-room basis.
#[derive(Clone, Copy, Default)]
pub struct MemberModes {
    pub operator: bool,
    pub voice: bool,
}

impl MemberModes {
    pub fn symbol(self) -> Option<char> {
        if self.operator {
            Some('@')
        } else if self.voice {
            Some('+')
        } else {
            None
        }
    }
}

/// Room data.
#[derive(Default)]
pub struct Channel {
    /// Room members and their membership modes, keyed by peer key. Keys are
    /// assigned monotonically, so iteration order is stable and, for rooms
    /// that only grow, join order.
    pub members: BTreeMap<usize, MemberModes>,

    /// The topic; empty means unset.
    pub topic: String,

    /// Only operators and voiced members may speak.
    pub moderated: bool,

    /// Only operators may change the topic.
    pub fixed_topic: bool,
}

impl Channel {
    /// Adds a member; the first member of a room becomes its operator.
    pub fn add_member(&mut self, key: usize) {
        let modes = MemberModes {
            operator: self.members.is_empty(),
            voice: false,
        };
        self.members.insert(key, modes);
    }

    pub fn remove_member(&mut self, key: usize) {
        self.members.remove(&key);
    }

    pub fn contains_member(&self, key: usize) -> bool {
        self.members.contains_key(&key)
    }

    pub fn is_operator(&self, key: usize) -> bool {
        self.members.get(&key).is_some_and(|modes| modes.operator)
    }

    /// Whether the member may speak here, not counting global-operator
    /// privilege, which bypasses this check entirely.
    pub fn can_talk(&self, key: usize) -> bool {
        if self.moderated {
            self.members
                .get(&key)
                .is_some_and(|modes| modes.operator || modes.voice)
        } else {
            true
        }
    }

    /// The room's mode string: `+` followed by the set flags.
    pub fn modes(&self) -> String {
        let mut modes = String::from("+");
        if self.moderated {
            modes.push('m');
        }
        if self.fixed_topic {
            modes.push('t');
        }
        modes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_member_is_operator() {
        let mut room = Channel::default();
        room.add_member(7);
        room.add_member(9);
        assert!(room.is_operator(7));
        assert!(!room.is_operator(9));
    }

    #[test]
    fn moderation_gates_speech_on_op_or_voice() {
        let mut room = Channel::default();
        room.add_member(1);
        room.add_member(2);
        assert!(room.can_talk(2));
        room.moderated = true;
        assert!(room.can_talk(1));
        assert!(!room.can_talk(2));
        room.members.get_mut(&2).unwrap().voice = true;
        assert!(room.can_talk(2));
    }

    #[test]
    fn mode_string_lists_set_flags() {
        let mut room = Channel::default();
        assert_eq!(room.modes(), "+");
        room.moderated = true;
        assert_eq!(room.modes(), "+m");
        room.fixed_topic = true;
        assert_eq!(room.modes(), "+mt");
    }
}
