use std::rc::Rc;

use serde::{Deserialize, Serialize};
use symbol_table::GlobalSymbol;

use crate::{
    eclass::EClass,
    egraph::{EGraph, Strategy},
    enode::ENode,
    id::NodeId,
    timeline::HaltedReason,
};

/// Which phase boundary a [`Snapshot`] was taken at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    Read,
    Write,
    Rebuild,
    Done,
}

/// One e-class as rendered into a snapshot: its canonical id, its member
/// e-nodes and parent links (each rendered as an s-expression string so a
/// frontend never has to re-derive operator names from ids), and whether
/// it's currently queued for repair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotClass {
    pub id: NodeId,
    pub nodes: Vec<String>,
    pub parents: Vec<String>,
    pub in_worklist: bool,
}

/// One entry of the rendered union-find: every id ever allocated, its
/// current canonical id, and whether the two are equal. Merged-away ids
/// stay in this array with `is_canonical: false` rather than disappearing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionFindEntry {
    pub id: NodeId,
    pub canonical: NodeId,
    pub is_canonical: bool,
}

/// A hint for a consumer choosing which term to display for an e-class:
/// the cheapest term [`crate::driver::Extractor`] found rooted at that
/// class, and its cost under the extractor's cost function.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionHint {
    pub class: NodeId,
    pub term: String,
    pub cost: usize,
}

/// A diff event recorded in a snapshot's `metadata`: what changed between
/// this snapshot and the previous one in the same timeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiffEvent {
    Matched {
        rule: GlobalSymbol,
        class: NodeId,
    },
    Merged {
        rule: Option<GlobalSymbol>,
        a: NodeId,
        b: NodeId,
        into: NodeId,
    },
    Added {
        id: NodeId,
        node: String,
    },
}

/// Everything about one point in time that isn't the e-graph state itself:
/// match summaries, invariant-check results, selection hints, and (on the
/// final snapshot) why the run halted.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub diff_events: Vec<DiffEvent>,
    pub congruence_violations: usize,
    pub hashcons_violations: usize,
    pub selection_hints: Vec<SelectionHint>,
    pub elapsed_nanos: Option<u64>,
    pub halted_reason: Option<HaltedReason>,
}

/// An immutable point in a [`crate::timeline::Timeline`]. Array fields are
/// `Rc<[T]>` so that a snapshot unchanged by a given step can share storage
/// with its predecessor instead of being recopied.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: u64,
    pub step_index: usize,
    pub phase: Phase,
    pub implementation: Strategy,
    pub union_find: Rc<[UnionFindEntry]>,
    pub eclasses: Rc<[SnapshotClass]>,
    pub hashcons: Rc<[(String, NodeId)]>,
    pub worklist: Rc<[NodeId]>,
    pub metadata: SnapshotMetadata,
}

/// Builds [`Snapshot`]s from live [`EGraph`] state, reusing the previous
/// snapshot's array `Rc`s whenever a sweep produces byte-identical content.
pub struct SnapshotBuilder {
    next_id: u64,
    step_index: usize,
    previous: Option<Rc<Snapshot>>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        SnapshotBuilder {
            next_id: 0,
            step_index: 0,
            previous: None,
        }
    }

    /// Captures the current e-graph state as a new snapshot, sharing
    /// storage with the previous snapshot wherever the rendered content is
    /// identical.
    pub fn capture(
        &mut self,
        egraph: &EGraph,
        phase: Phase,
        metadata: SnapshotMetadata,
    ) -> Rc<Snapshot> {
        let eclasses = self.render_classes(egraph);
        let hashcons = self.render_hashcons(egraph);
        let worklist = self.render_worklist(egraph);
        let union_find = self.render_union_find(egraph);

        let snapshot = Rc::new(Snapshot {
            id: self.next_id,
            step_index: self.step_index,
            phase,
            implementation: egraph.strategy(),
            union_find,
            eclasses,
            hashcons,
            worklist,
            metadata,
        });

        self.next_id += 1;
        self.step_index += 1;
        self.previous = Some(snapshot.clone());
        snapshot
    }

    fn render_classes(&self, egraph: &EGraph) -> Rc<[SnapshotClass]> {
        let fresh: Vec<SnapshotClass> = egraph
            .classes()
            .map(|class| SnapshotClass {
                id: class.id,
                nodes: render_nodes(class, egraph),
                parents: render_parents(class, egraph),
                in_worklist: class.in_worklist,
            })
            .collect();

        match &self.previous {
            Some(prev) if prev.eclasses.as_ref() == fresh.as_slice() => prev.eclasses.clone(),
            _ => fresh.into(),
        }
    }

    fn render_hashcons(&self, egraph: &EGraph) -> Rc<[(String, NodeId)]> {
        let fresh: Vec<(String, NodeId)> = egraph_sorted_hashcons(egraph);
        match &self.previous {
            Some(prev) if prev.hashcons.as_ref() == fresh.as_slice() => prev.hashcons.clone(),
            _ => fresh.into(),
        }
    }

    fn render_worklist(&self, egraph: &EGraph) -> Rc<[NodeId]> {
        let ids = egraph.worklist_ids();
        match &self.previous {
            Some(prev) if prev.worklist.as_ref() == ids.as_slice() => prev.worklist.clone(),
            _ => ids.into(),
        }
    }

    /// One entry per id ever allocated (`0..egraph.len()`), not just the
    /// currently-canonical ones — a merged-away id must stay visible with
    /// `is_canonical: false` so a consumer can follow its history.
    fn render_union_find(&self, egraph: &EGraph) -> Rc<[UnionFindEntry]> {
        let fresh: Vec<UnionFindEntry> = (0..egraph.len())
            .map(|raw| {
                let id = NodeId::new(raw);
                let canonical = egraph.canon_id(id);
                UnionFindEntry {
                    id,
                    canonical,
                    is_canonical: id == canonical,
                }
            })
            .collect();

        match &self.previous {
            Some(prev) if prev.union_find.as_ref() == fresh.as_slice() => prev.union_find.clone(),
            _ => fresh.into(),
        }
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders one e-node as an s-expression string: `op` alone for a leaf,
/// `op(a, b)` otherwise, with args already canonicalized.
pub(crate) fn render_node_string(node: &ENode, egraph: &EGraph) -> String {
    if node.is_leaf() {
        node.op.to_string()
    } else {
        let args: Vec<String> = node
            .args
            .iter()
            .map(|&a| egraph.canon_id(a).to_string())
            .collect();
        format!("{}({})", node.op, args.join(", "))
    }
}

/// Member e-nodes, sorted by `op` then lexicographically by canonicalized
/// args so two strategies processing the same preset render byte-identical
/// snapshots regardless of internal iteration order.
fn render_nodes(class: &EClass, egraph: &EGraph) -> Vec<String> {
    let mut keyed: Vec<(String, Vec<NodeId>)> = class
        .nodes
        .iter()
        .map(|node| {
            let args: Vec<NodeId> = node.args.iter().map(|&a| egraph.canon_id(a)).collect();
            (node.op.to_string(), args)
        })
        .collect();
    keyed.sort();

    keyed
        .into_iter()
        .map(|(op, args)| {
            if args.is_empty() {
                op
            } else {
                let args: Vec<String> = args.iter().map(NodeId::to_string).collect();
                format!("{}({})", op, args.join(", "))
            }
        })
        .collect()
}

/// Parent links, rendered as `"parent_enode -> canonical_parent_id"` and
/// sorted the same way `render_nodes` is, for the same determinism reason.
fn render_parents(class: &EClass, egraph: &EGraph) -> Vec<String> {
    let mut rendered: Vec<String> = class
        .parents
        .values()
        .map(|record| {
            let parent_id = egraph.canon_id(record.parent_id);
            format!("{} -> {}", render_node_string(&record.enode, egraph), parent_id)
        })
        .collect();
    rendered.sort();
    rendered
}

fn egraph_sorted_hashcons(egraph: &EGraph) -> Vec<(String, NodeId)> {
    let mut entries: Vec<(String, NodeId)> = egraph
        .classes()
        .flat_map(|class| {
            class
                .nodes
                .iter()
                .map(move |node| (render_node_string(node, egraph), class.id))
        })
        .collect();
    entries.sort();
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{egraph::Strategy, enode::ENode};

    #[test]
    fn unchanged_sweep_shares_eclasses_storage() {
        let mut eg = EGraph::new(Strategy::Deferred);
        eg.add(ENode::leaf("a"));
        let mut builder = SnapshotBuilder::new();

        let first = builder.capture(&eg, Phase::Init, SnapshotMetadata::default());
        let second = builder.capture(&eg, Phase::Read, SnapshotMetadata::default());

        assert!(Rc::ptr_eq(&first.eclasses, &second.eclasses));
        assert_eq!(first.id, 0);
        assert_eq!(second.id, 1);
    }

    #[test]
    fn changed_sweep_gets_fresh_storage() {
        let mut eg = EGraph::new(Strategy::Deferred);
        eg.add(ENode::leaf("a"));
        let mut builder = SnapshotBuilder::new();

        let first = builder.capture(&eg, Phase::Init, SnapshotMetadata::default());
        eg.add(ENode::leaf("b"));
        let second = builder.capture(&eg, Phase::Read, SnapshotMetadata::default());

        assert!(!Rc::ptr_eq(&first.eclasses, &second.eclasses));
        assert_eq!(second.eclasses.len(), 2);
    }

    #[test]
    fn union_find_keeps_an_entry_for_every_allocated_id_including_merged_ones() {
        let mut eg = EGraph::new(Strategy::Deferred);
        let a = eg.add(ENode::leaf("a"));
        let b = eg.add(ENode::leaf("b"));
        eg.merge(a, b);
        eg.rebuild();

        let mut builder = SnapshotBuilder::new();
        let snap = builder.capture(&eg, Phase::Init, SnapshotMetadata::default());

        assert_eq!(snap.union_find.len(), 2);
        let canon = eg.canon_id(a);
        let loser = if canon == a { b } else { a };
        let loser_entry = snap.union_find.iter().find(|e| e.id == loser).unwrap();
        assert!(!loser_entry.is_canonical);
        assert_eq!(loser_entry.canonical, canon);
    }

    #[test]
    fn nodes_render_sorted_by_op_then_args() {
        let mut eg = EGraph::new(Strategy::Deferred);
        let b = eg.add(ENode::leaf("b"));
        let a = eg.add(ENode::leaf("a"));
        eg.merge(b, a);
        eg.rebuild();

        let mut builder = SnapshotBuilder::new();
        let snap = builder.capture(&eg, Phase::Init, SnapshotMetadata::default());
        let merged = snap.eclasses.iter().find(|c| c.nodes.len() == 2).unwrap();
        assert_eq!(merged.nodes, vec!["a".to_string(), "b".to_string()]);
    }
}
