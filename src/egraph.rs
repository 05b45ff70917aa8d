use log::trace;

use crate::{
    eclass::{EClass, ParentKey, ParentRecord},
    enode::{CanonicalKey, ENode},
    id::NodeId,
    term_store::TermStore,
    union_find::UnionFind,
    utils::{IndexMap, IndexSet},
};

/// Which invariant-maintenance strategy an [`EGraph`] uses. Both strategies
/// share every type and `add`/`find`; they differ only in `merge`'s tail and
/// in whether `rebuild` does any work.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Eager upward merging: congruence is restored before `merge` returns.
    Naive,
    /// Worklist + repair: congruence is restored only on `rebuild`.
    #[default]
    Deferred,
}

/// The e-graph: union-find + hash-consed term store + e-class table,
/// maintained under one of two equivalent invariant-maintenance strategies.
#[derive(Clone, Debug)]
pub struct EGraph {
    strategy: Strategy,
    uf: UnionFind,
    store: TermStore,
    classes: IndexMap<NodeId, EClass>,
    worklist: IndexSet<NodeId>,
    /// E-nodes newly created by `add` since the last `drain_added`. Feeds
    /// `add`-diff-event reporting; never read by anything else in here.
    added_log: Vec<(NodeId, ENode)>,
}

/// A single entry of [`EGraph::check_congruence`]: two or more distinct
/// e-classes whose member e-nodes canonicalize to the same key, which
/// should be impossible once the congruence invariant holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CongruenceViolation {
    pub key: CanonicalKey,
    pub classes: Vec<NodeId>,
}

/// A single entry of [`EGraph::check_hashcons`]: an e-node whose canonical
/// key does not map back to its own containing class in the hashcons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashconsViolation {
    pub key: CanonicalKey,
    pub expected: NodeId,
    pub actual: Option<NodeId>,
}

impl EGraph {
    pub fn new(strategy: Strategy) -> Self {
        EGraph {
            strategy,
            uf: UnionFind::new(),
            store: TermStore::new(),
            classes: IndexMap::default(),
            worklist: IndexSet::default(),
            added_log: vec![],
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Delegates to the union-find.
    pub fn find(&mut self, id: NodeId) -> NodeId {
        self.uf.find(id)
    }

    /// Total number of ids ever allocated (by either `add` or `make_set`),
    /// including ones later merged away. Ids are dense and start at zero, so
    /// `0..len()` enumerates every allocated id.
    pub fn len(&self) -> usize {
        self.uf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uf.is_empty()
    }

    /// Read-only canonicalization; does not compress paths. Safe to use
    /// from contexts holding only `&self` (diagnostics, snapshotting).
    pub fn canon_id(&self, id: NodeId) -> NodeId {
        self.uf.find_const(id)
    }

    pub fn number_of_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn total_number_of_nodes(&self) -> usize {
        self.classes.values().map(EClass::len).sum()
    }

    pub fn worklist_len(&self) -> usize {
        self.worklist.len()
    }

    /// Sorted snapshot of the pending Deferred worklist. Always empty for a
    /// Naive e-graph, since Naive never populates it.
    pub fn worklist_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.worklist.iter().copied().collect();
        ids.sort();
        ids
    }

    /// Takes every e-node `add` has created since the last call, paired
    /// with the class id it landed in. Used to report `add`-diff events;
    /// callers that don't care about diffing can ignore this entirely.
    pub fn drain_added(&mut self) -> Vec<(NodeId, ENode)> {
        std::mem::take(&mut self.added_log)
    }

    /// Ascending-canonical-id iterator over e-classes. Callers must never
    /// rely on the underlying map's own order.
    pub fn classes(&self) -> impl Iterator<Item = &EClass> {
        let mut ids: Vec<NodeId> = self.classes.keys().copied().collect();
        ids.sort();
        ids.into_iter().map(move |id| &self.classes[&id])
    }

    pub fn class(&self, id: NodeId) -> Option<&EClass> {
        self.classes.get(&id)
    }

    /// Canonicalizes args, does a hashcons lookup, and either returns the
    /// existing containing class or allocates a fresh singleton class and
    /// wires up parent pointers on every child class.
    pub fn add(&mut self, enode: ENode) -> NodeId {
        let canon_args: crate::enode::Args =
            enode.args.iter().map(|&a| self.uf.find(a)).collect();
        let key = CanonicalKey {
            op: enode.op,
            args: canon_args.clone(),
        };

        if let Some(existing) = self.store.lookup(&key) {
            return self.uf.find(existing);
        }

        let id = self.store.alloc_id();
        let made = self.uf.make_set();
        debug_assert_eq!(id, made, "TermStore and UnionFind id allocation diverged");

        let raw = enode.clone();
        trace!("add: {} -> {:?}", id, raw);
        self.classes.insert(id, EClass::new(id, enode));
        self.store.insert(key.clone(), id);
        self.added_log.push((id, raw.clone()));

        for &child in canon_args.iter() {
            if let Some(child_class) = self.classes.get_mut(&child) {
                child_class
                    .parents
                    .entry(ParentKey {
                        parent_id: id,
                        key: key.clone(),
                    })
                    .or_insert_with(|| ParentRecord {
                        parent_id: id,
                        enode: raw.clone(),
                    });
            }
        }

        id
    }

    /// No-op if `a` and `b` already share a class. Otherwise unions them,
    /// fuses the loser's nodes/parents into the winner, and either repairs
    /// congruence immediately (Naive) or queues the winner for later
    /// repair (Deferred).
    pub fn merge(&mut self, a: NodeId, b: NodeId) -> NodeId {
        let ra = self.uf.find(a);
        let rb = self.uf.find(b);
        if ra == rb {
            return ra;
        }

        let new_root = self.uf.union(ra, rb);
        let loser = if new_root == ra { rb } else { ra };

        let loser_class = self
            .classes
            .shift_remove(&loser)
            .expect("loser class must exist before union");
        self.classes
            .get_mut(&new_root)
            .expect("winner class must exist")
            .absorb(loser_class);

        match self.strategy {
            Strategy::Deferred => {
                self.worklist.insert(new_root);
                if let Some(class) = self.classes.get_mut(&new_root) {
                    class.in_worklist = true;
                }
            }
            Strategy::Naive => self.repair_class(new_root),
        }

        new_root
    }

    /// Naive's immediate upward merging and Deferred's per-worklist-entry
    /// repair share this routine. The difference between the two
    /// strategies is purely *when* it runs: once per `merge` call (Naive)
    /// or once per deduplicated worklist entry (Deferred, via
    /// [`EGraph::rebuild`]).
    fn repair_class(&mut self, id: NodeId) {
        let id = self.uf.find(id);
        let parents = match self.classes.get_mut(&id) {
            Some(class) => std::mem::take(&mut class.parents),
            None => return,
        };

        // a) drop every stale hashcons entry this class's parents used to own.
        for old_key in parents.keys() {
            self.store.remove(&old_key.key);
        }

        // b) re-canonicalize every parent record and bucket by its new key.
        let mut buckets: IndexMap<CanonicalKey, Vec<ParentRecord>> = IndexMap::default();
        for rec in parents.into_values() {
            let canon_enode = rec.enode.map_args(|a| self.uf.find(a));
            let canon_parent_id = self.uf.find(rec.parent_id);
            let new_key = CanonicalKey {
                op: canon_enode.op,
                args: canon_enode.args,
            };
            buckets
                .entry(new_key)
                .or_default()
                .push(ParentRecord {
                    parent_id: canon_parent_id,
                    enode: rec.enode,
                });
        }

        // c) any bucket with more than one distinct canonical parent id is a
        //    congruence conflict: merge those parents (this may recurse and
        //    push further ids onto the worklist under Deferred).
        for recs in buckets.values() {
            let mut ids: Vec<NodeId> = recs.iter().map(|r| self.uf.find(r.parent_id)).collect();
            ids.sort();
            ids.dedup();
            if ids.len() > 1 {
                let first = ids[0];
                for &other in &ids[1..] {
                    self.merge(first, other);
                }
            }
        }

        // d) rebuild the hashcons and this class's parent map, one
        //    representative record per canonical key.
        let id = self.uf.find(id);
        let mut new_parents = IndexMap::default();
        for (key, recs) in buckets {
            let canon_parent = self.uf.find(recs[0].parent_id);
            self.store.insert(key.clone(), canon_parent);
            new_parents.insert(
                ParentKey {
                    parent_id: canon_parent,
                    key: key.clone(),
                },
                ParentRecord {
                    parent_id: canon_parent,
                    enode: recs[0].enode.clone(),
                },
            );
        }
        if let Some(class) = self.classes.get_mut(&id) {
            for (k, v) in new_parents {
                class.parents.entry(k).or_insert(v);
            }
        }
    }

    /// Deferred-only. Drains the worklist, deduplicating by canonical id
    /// (the key efficiency of the deferred strategy), and repairs each
    /// distinct class. Returns the number of classes repaired. For Naive
    /// this is a declared no-op so callers may call it uniformly and
    /// snapshot emission remains symmetric.
    pub fn rebuild(&mut self) -> usize {
        if self.strategy == Strategy::Naive {
            return 0;
        }

        let mut repairs = 0;
        while !self.worklist.is_empty() {
            let drained: Vec<NodeId> = self.worklist.drain(..).collect();
            let mut todo: IndexSet<NodeId> = IndexSet::default();
            for id in drained {
                todo.insert(self.uf.find(id));
            }
            for id in todo {
                if let Some(class) = self.classes.get_mut(&id) {
                    class.in_worklist = false;
                }
                self.repair_class(id);
                repairs += 1;
            }
        }
        repairs
    }

    /// Diagnostic only — never mutates. Flags e-nodes with the same
    /// canonical key living in different classes.
    pub fn check_congruence(&self) -> Vec<CongruenceViolation> {
        let mut by_key: IndexMap<CanonicalKey, IndexSet<NodeId>> = IndexMap::default();
        for class in self.classes.values() {
            for node in &class.nodes {
                let key = node.canonical_key(|id| self.uf.find_const(id));
                by_key
                    .entry(key)
                    .or_default()
                    .insert(self.uf.find_const(class.id));
            }
        }
        by_key
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(key, ids)| CongruenceViolation {
                key,
                classes: {
                    let mut v: Vec<_> = ids.into_iter().collect();
                    v.sort();
                    v
                },
            })
            .collect()
    }

    /// Diagnostic only — never mutates. Flags hashcons entries whose key
    /// doesn't map back to the class it's filed under.
    pub fn check_hashcons(&self) -> Vec<HashconsViolation> {
        let mut violations = vec![];
        for class in self.classes.values() {
            let canon_id = self.uf.find_const(class.id);
            for node in &class.nodes {
                let key = node.canonical_key(|id| self.uf.find_const(id));
                let actual = self.store.lookup(&key).map(|id| self.uf.find_const(id));
                if actual != Some(canon_id) {
                    violations.push(HashconsViolation {
                        key,
                        expected: canon_id,
                        actual,
                    });
                }
            }
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn leaf(op: &str) -> ENode {
        ENode::leaf(op)
    }

    fn app(op: &str, args: impl IntoIterator<Item = NodeId>) -> ENode {
        ENode::new(op, args)
    }

    #[test_case(Strategy::Naive; "naive")]
    #[test_case(Strategy::Deferred; "deferred")]
    fn congruence_leaf(strategy: Strategy) {
        let mut eg = EGraph::new(strategy);
        let a = eg.add(leaf("a"));
        let b = eg.add(leaf("b"));
        let fa = eg.add(app("f", [a]));
        let fb = eg.add(app("f", [b]));
        eg.merge(a, b);
        eg.rebuild();

        assert_eq!(eg.find(fa), eg.find(fb));
        assert_eq!(eg.number_of_classes(), 2);
        assert!(eg.check_congruence().is_empty());
        assert!(eg.check_hashcons().is_empty());
    }

    #[test_case(Strategy::Naive; "naive")]
    #[test_case(Strategy::Deferred; "deferred")]
    fn nested_congruence(strategy: Strategy) {
        let mut eg = EGraph::new(strategy);
        let a = eg.add(leaf("a"));
        let b = eg.add(leaf("b"));
        let ga = eg.add(app("g", [a]));
        let gb = eg.add(app("g", [b]));
        let fga = eg.add(app("f", [ga]));
        let fgb = eg.add(app("f", [gb]));
        eg.merge(a, b);
        eg.rebuild();

        assert_eq!(eg.find(ga), eg.find(gb));
        assert_eq!(eg.find(fga), eg.find(fgb));
        assert!(eg.check_congruence().is_empty());
    }

    #[test_case(Strategy::Naive; "naive")]
    #[test_case(Strategy::Deferred; "deferred")]
    fn self_cycle(strategy: Strategy) {
        let mut eg = EGraph::new(strategy);
        let a = eg.add(leaf("a"));
        let fa = eg.add(app("f", [a]));
        eg.merge(a, fa);
        eg.rebuild();

        assert_eq!(eg.find(a), eg.find(fa));
        assert_eq!(eg.number_of_classes(), 1);
        assert!(eg.check_congruence().is_empty());
    }

    #[test_case(Strategy::Naive; "naive")]
    #[test_case(Strategy::Deferred; "deferred")]
    fn batch_merges(strategy: Strategy) {
        let mut eg = EGraph::new(strategy);
        let leaves: Vec<_> = (0..50).map(|i| eg.add(leaf(&format!("l{i}")))).collect();
        let parents: Vec<_> = leaves
            .iter()
            .map(|&l| eg.add(app("f", [l])))
            .collect();
        for &l in &leaves[1..] {
            eg.merge(leaves[0], l);
        }
        eg.rebuild();

        assert_eq!(eg.number_of_classes(), 2);
        let leaf_root = eg.find(leaves[0]);
        for &l in &leaves {
            assert_eq!(eg.find(l), leaf_root);
        }
        let parent_root = eg.find(parents[0]);
        for &p in &parents {
            assert_eq!(eg.find(p), parent_root);
        }
    }

    #[test]
    fn add_same_node_twice_dedupes() {
        let mut eg = EGraph::new(Strategy::Deferred);
        let a = eg.add(leaf("a"));
        let fa1 = eg.add(app("f", [a]));
        let fa2 = eg.add(app("f", [a]));
        assert_eq!(fa1, fa2);
        assert_eq!(eg.number_of_classes(), 2);
    }

    #[test]
    fn merge_self_is_noop() {
        let mut eg = EGraph::new(Strategy::Deferred);
        let a = eg.add(leaf("a"));
        let before = eg.number_of_classes();
        eg.merge(a, a);
        assert_eq!(eg.number_of_classes(), before);
        assert_eq!(eg.worklist_len(), 0);
    }

    #[test]
    fn naive_and_deferred_agree() {
        let mut naive = EGraph::new(Strategy::Naive);
        let mut deferred = EGraph::new(Strategy::Deferred);

        let na = naive.add(leaf("a"));
        let da = deferred.add(leaf("a"));
        let nb = naive.add(leaf("b"));
        let db = deferred.add(leaf("b"));
        let nfa = naive.add(app("f", [na]));
        let dfa = deferred.add(app("f", [da]));
        let _ = naive.add(app("f", [nb]));
        let _ = deferred.add(app("f", [db]));

        naive.merge(na, nb);
        deferred.merge(da, db);
        naive.rebuild();
        deferred.rebuild();

        assert_eq!(naive.number_of_classes(), deferred.number_of_classes());
        assert_eq!(naive.find(nfa), naive.find(naive.find(nfa)));
        assert_eq!(deferred.find(dfa), deferred.find(deferred.find(dfa)));
    }
}
