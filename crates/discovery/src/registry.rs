//! Concurrent registry of known members

use std::sync::Arc;

use dashmap::DashMap;

use crate::member::Member;

/// Concurrent store of members keyed by id.
///
/// Every operation is atomic for its key. There are no multi-key
/// transactions, and `list` is a snapshot that may interleave with writes.
/// Clones share the same underlying map.
#[derive(Clone, Debug, Default)]
pub struct MemberRegistry {
    members: Arc<DashMap<String, Member>>,
}

impl MemberRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `member.id`
    pub fn upsert(&self, member: Member) {
        self.members.insert(member.id.clone(), member);
    }

    /// Remove the entry for `id`, returning it if present
    pub fn remove(&self, id: &str) -> Option<Member> {
        self.members.remove(id).map(|(_, member)| member)
    }

    /// Look up a member by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Member> {
        self.members.get(id).map(|entry| entry.value().clone())
    }

    /// Snapshot of all members, in no particular order
    #[must_use]
    pub fn list(&self) -> Vec<Member> {
        self.members
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Whether a member with `id` is present
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.members.contains_key(id)
    }

    /// Number of members
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Forget every member
    pub fn clear(&self) {
        self.members.clear();
    }
}
