use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use symbol_table::GlobalSymbol;

use crate::id::NodeId;

/// Small inline buffer for the common unary/binary-operator case; spills to
/// the heap for wider arities. Mirrors the teacher's use of `smallvec` for
/// e-node operand lists.
pub type Args = SmallVec<[NodeId; 2]>;

/// `{ op, args }`. Two e-nodes are structurally equal when `op` matches
/// and `args` match element-wise, *without* canonicalizing args first;
/// that canonicalized comparison is [`ENode::canonical_key`]'s job.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ENode {
    pub op: GlobalSymbol,
    pub args: Args,
}

impl ENode {
    pub fn new(op: impl Into<GlobalSymbol>, args: impl IntoIterator<Item = NodeId>) -> Self {
        ENode {
            op: op.into(),
            args: args.into_iter().collect(),
        }
    }

    pub fn leaf(op: impl Into<GlobalSymbol>) -> Self {
        ENode::new(op, [])
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    pub fn is_leaf(&self) -> bool {
        self.args.is_empty()
    }

    /// Replaces every argument id by `find(arg)` and returns the resulting
    /// deterministic hashable key.
    pub fn canonical_key(&self, mut find: impl FnMut(NodeId) -> NodeId) -> CanonicalKey {
        CanonicalKey {
            op: self.op,
            args: self.args.iter().map(|&id| find(id)).collect(),
        }
    }

    pub fn map_args(&self, mut f: impl FnMut(NodeId) -> NodeId) -> ENode {
        ENode {
            op: self.op,
            args: self.args.iter().map(|&id| f(id)).collect(),
        }
    }
}

impl fmt::Debug for ENode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.op)
        } else {
            write!(f, "({}", self.op)?;
            for a in &self.args {
                write!(f, " {a}")?;
            }
            write!(f, ")")
        }
    }
}

/// The hashable form of an e-node with every argument already canonicalized.
/// Used both as the hashcons key and as the parent-map key discriminator.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct CanonicalKey {
    pub op: GlobalSymbol,
    pub args: Args,
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.op)
        } else {
            write!(f, "({}", self.op)?;
            for a in &self.args {
                write!(f, " {a}")?;
            }
            write!(f, ")")
        }
    }
}
