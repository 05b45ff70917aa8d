use crate::{
    enode::{CanonicalKey, ENode},
    id::NodeId,
    utils::IndexMap,
};

/// Discriminates parent-map entries: the parent's *canonical* class id
/// together with the parent enode's canonical key. Two parent records
/// with equal `ParentKey`s are the same logical parent and must be
/// deduplicated by value, not by reference identity.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ParentKey {
    pub parent_id: NodeId,
    pub key: CanonicalKey,
}

#[derive(Clone, Debug)]
pub struct ParentRecord {
    pub parent_id: NodeId,
    pub enode: ENode,
}

/// An e-class, keyed by its canonical id.
#[derive(Clone, Debug)]
pub struct EClass {
    pub id: NodeId,
    /// Raw (not canonicalized) member e-nodes, in insertion order.
    pub nodes: Vec<ENode>,
    /// Parent entries, deduplicated by [`ParentKey`].
    pub parents: IndexMap<ParentKey, ParentRecord>,
    /// Whether this class is currently queued for repair (Deferred only).
    pub in_worklist: bool,
}

impl EClass {
    pub fn new(id: NodeId, node: ENode) -> Self {
        EClass {
            id,
            nodes: vec![node],
            parents: IndexMap::default(),
            in_worklist: false,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Absorbs `other` (the losing class of a union) into `self`.
    pub(crate) fn absorb(&mut self, mut other: EClass) {
        self.nodes.append(&mut other.nodes);
        for (key, rec) in other.parents {
            self.parents.entry(key).or_insert(rec);
        }
        self.in_worklist = self.in_worklist || other.in_worklist;
    }
}
