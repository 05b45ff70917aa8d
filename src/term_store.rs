use crate::{enode::CanonicalKey, id::NodeId, utils::IndexMap};

/// Monotonic id allocator plus the hashcons mapping. Owned jointly
/// with [`crate::egraph::EGraph`], which drives `intern`'s canonicalization
/// (it needs live `find` access that this type intentionally does not own).
#[derive(Debug, Clone, Default)]
pub struct TermStore {
    next_id: u32,
    hashcons: IndexMap<CanonicalKey, NodeId>,
}

impl TermStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hashcons_len(&self) -> usize {
        self.hashcons.len()
    }

    /// Looks up a canonical key in the hashcons, returning the e-class id
    /// that already contains an e-node with that key, if any.
    pub fn lookup(&self, key: &CanonicalKey) -> Option<NodeId> {
        self.hashcons.get(key).copied()
    }

    pub fn insert(&mut self, key: CanonicalKey, id: NodeId) -> Option<NodeId> {
        self.hashcons.insert(key, id)
    }

    pub fn remove(&mut self, key: &CanonicalKey) -> Option<NodeId> {
        self.hashcons.shift_remove(key)
    }

    /// Allocates and returns the next dense id. Ids are never freed.
    pub fn alloc_id(&mut self) -> NodeId {
        let id = NodeId::new(self.next_id as usize);
        self.next_id += 1;
        id
    }

    /// Ordered snapshot of the hashcons table, sorted by key.
    pub fn sorted_entries(&self) -> Vec<(&CanonicalKey, NodeId)> {
        let mut entries: Vec<_> = self.hashcons.iter().map(|(k, &v)| (k, v)).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}
