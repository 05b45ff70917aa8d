use symbol_table::GlobalSymbol;

use crate::{
    egraph::EGraph,
    error::Result,
    id::NodeId,
    pattern::{instantiate, match_pattern, Pattern, Subst},
};

/// `{ name, lhs, rhs, enabled }`. Disabled rules are skipped by
/// [`crate::driver::SaturationDriver`]'s Read phase.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rewrite {
    pub name: GlobalSymbol,
    pub lhs: Pattern,
    pub rhs: Pattern,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// One (rule, class, substitution) match found during Read.
#[derive(Clone, Debug)]
pub struct Match {
    pub class: NodeId,
    pub subst: Subst,
}

/// What one `Rewrite::apply_one` call actually merged, for diff-event
/// reporting: the rule that fired, the matched class and the instantiated
/// right-hand side's class (both re-canonicalized), and the resulting root.
#[derive(Clone, Copy, Debug)]
pub struct AppliedMerge {
    pub rule: GlobalSymbol,
    pub target: NodeId,
    pub actual: NodeId,
    pub into: NodeId,
}

impl Rewrite {
    /// Searches every e-class for this rule's left-hand side, in
    /// ascending canonical id order, e-nodes in class-local order. Pure
    /// read: never mutates the e-graph.
    pub fn search(&self, egraph: &EGraph) -> Vec<Match> {
        let mut out = vec![];
        for class in egraph.classes() {
            for subst in match_pattern(&self.lhs, class.id, egraph) {
                out.push(Match {
                    class: class.id,
                    subst,
                });
            }
        }
        out
    }

    /// Instantiates this rule's right-hand side under `subst` and merges
    /// the result with the matched class, re-canonicalizing both sides
    /// first since earlier writes in the same iteration may have moved
    /// canonical identities.
    pub fn apply_one(&self, egraph: &mut EGraph, m: &Match) -> Result<Option<AppliedMerge>> {
        let new_id = instantiate(&self.rhs, &m.subst, egraph)?;
        let target = egraph.find(m.class);
        let actual = egraph.find(new_id);
        if target == actual {
            Ok(None)
        } else {
            let into = egraph.merge(target, actual);
            Ok(Some(AppliedMerge {
                rule: self.name,
                target,
                actual,
                into,
            }))
        }
    }
}
