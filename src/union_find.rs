use crate::{error::Error, id::NodeId};

/// Disjoint-set over [`NodeId`]s with path compression and union by rank.
///
/// `find` on an id this structure never saw fails with
/// [`Error::UnknownId`]; `union` on two already-equivalent ids is a no-op
/// that still returns the (unchanged) canonical id.
#[derive(Debug, Clone, Default)]
pub struct UnionFind {
    parent: Vec<u32>,
    rank: Vec<u32>,
}

impl UnionFind {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Allocates a fresh singleton set, returning its id. Ids are assigned
    /// densely, so this must be called in the same order `TermStore`
    /// allocates ids.
    pub fn make_set(&mut self) -> NodeId {
        let id = NodeId::new(self.parent.len());
        self.parent.push(id.val() as u32);
        self.rank.push(0);
        id
    }

    fn check(&self, id: NodeId) -> Result<(), Error> {
        if id.val() >= self.parent.len() {
            Err(Error::UnknownId(id))
        } else {
            Ok(())
        }
    }

    /// Finds the canonical id of `id`'s set, compressing the path as it goes.
    pub fn find(&mut self, id: NodeId) -> NodeId {
        self.try_find(id).expect("unknown id passed to find")
    }

    /// Fallible variant of [`UnionFind::find`] used at API boundaries where
    /// an unknown id must fail-fast rather than panic.
    pub fn try_find(&mut self, id: NodeId) -> Result<NodeId, Error> {
        self.check(id)?;
        let mut cur = id.val();
        while self.parent[cur] as usize != cur {
            cur = self.parent[cur] as usize;
        }
        let root = cur;

        // second pass: path compression
        let mut cur = id.val();
        while self.parent[cur] as usize != root {
            let next = self.parent[cur] as usize;
            self.parent[cur] = root as u32;
            cur = next;
        }
        Ok(NodeId::new(root))
    }

    /// Read-only find: does not compress paths, safe to call without `&mut`.
    pub fn find_const(&self, id: NodeId) -> NodeId {
        let mut cur = id.val();
        while self.parent[cur] as usize != cur {
            cur = self.parent[cur] as usize;
        }
        NodeId::new(cur)
    }

    pub fn equiv(&mut self, a: NodeId, b: NodeId) -> bool {
        self.find(a) == self.find(b)
    }

    /// Unions the sets containing `a` and `b`, returning the new root.
    /// Idempotent if `a` and `b` are already equivalent.
    pub fn union(&mut self, a: NodeId, b: NodeId) -> NodeId {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return ra;
        }

        let (winner, loser) = match self.rank[ra.val()].cmp(&self.rank[rb.val()]) {
            std::cmp::Ordering::Less => (rb, ra),
            std::cmp::Ordering::Greater => (ra, rb),
            std::cmp::Ordering::Equal => {
                self.rank[ra.val()] += 1;
                (ra, rb)
            }
        };
        self.parent[loser.val()] = winner.val() as u32;
        winner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_is_idempotent() {
        let mut uf = UnionFind::new();
        let ids: Vec<_> = (0..5).map(|_| uf.make_set()).collect();
        uf.union(ids[0], ids[1]);
        uf.union(ids[1], ids[2]);
        for &id in &ids[..3] {
            let root = uf.find(id);
            assert_eq!(uf.find(root), root);
        }
    }

    #[test]
    fn union_on_equivalent_ids_is_noop() {
        let mut uf = UnionFind::new();
        let a = uf.make_set();
        let b = uf.make_set();
        uf.union(a, b);
        let before = uf.find(a);
        let root = uf.union(a, b);
        assert_eq!(root, before);
    }

    #[test]
    fn unknown_id_fails_fast() {
        let mut uf = UnionFind::new();
        let a = uf.make_set();
        let bogus = NodeId::from(a.val() + 1);
        assert_eq!(uf.try_find(bogus), Err(Error::UnknownId(bogus)));
    }
}
