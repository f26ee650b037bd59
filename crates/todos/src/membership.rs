//! The todo/user relation table.
//!
//! The association is stored one way only, as `(todo, user)` pairs owned by the
//! todo side. Both directions are answered from the same set, so the inverse
//! view can never drift from the owning side.

use std::collections::BTreeSet;

use austin_core::{MemberId, TodoId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memberships {
    pairs: BTreeSet<(TodoId, MemberId)>,
}

impl Memberships {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the pair was already linked.
    pub fn link(&mut self, todo: TodoId, member: MemberId) -> bool {
        self.pairs.insert((todo, member))
    }

    /// Users assigned to `todo`, ascending.
    pub fn members_of(&self, todo: TodoId) -> Vec<MemberId> {
        self.pairs
            .range((todo, MemberId::new(i64::MIN))..=(todo, MemberId::new(i64::MAX)))
            .map(|(_, m)| *m)
            .collect()
    }

    /// Todos `member` is assigned to, ascending.
    pub fn owners_of(&self, member: MemberId) -> Vec<TodoId> {
        self.pairs
            .iter()
            .filter(|(_, m)| *m == member)
            .map(|(t, _)| *t)
            .collect()
    }

    /// Replace every user assigned to `todo` with `members`.
    pub fn replace_members(&mut self, todo: TodoId, members: impl IntoIterator<Item = MemberId>) {
        self.remove_owner(todo);
        for member in members {
            self.link(todo, member);
        }
    }

    /// Drop every pair owned by `todo`. Returns the number of pairs removed.
    pub fn remove_owner(&mut self, todo: TodoId) -> usize {
        let before = self.pairs.len();
        self.pairs.retain(|(t, _)| *t != todo);
        before - self.pairs.len()
    }

    /// Drop every pair referencing `member`. Returns the number of pairs removed.
    pub fn remove_member(&mut self, member: MemberId) -> usize {
        let before = self.pairs.len();
        self.pairs.retain(|(_, m)| *m != member);
        before - self.pairs.len()
    }
}
