use symbol_table::GlobalSymbol;

use crate::{
    egraph::EGraph,
    enode::ENode,
    id::NodeId,
    rewrite::{AppliedMerge, Match, Rewrite},
    timeline::HaltedReason,
};

/// What a `SaturationDriver::step` call just did, one phase boundary at a
/// time. `Halted` is terminal: the next `step` call returns `None`.
#[derive(Debug)]
pub enum PhaseResult {
    Read { matches: Vec<(GlobalSymbol, Match)> },
    Write { merges: Vec<AppliedMerge>, added: Vec<(NodeId, ENode)> },
    Rebuild { repairs: usize },
    Halted(HaltedReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    Read,
    Write,
    Rebuild,
}

/// Drives one e-graph through repeated Read → Write → Rebuild iterations
/// until saturation, the iteration cap, or cancellation.
///
/// Enumeration order is fixed: rules are tried in the order they appear in
/// the preset, each rule's matches in ascending canonical class-id order
/// (`Rewrite::search`), and a Write phase applies matches in the order
/// Read found them. This is what makes two runs over the same preset and
/// strategy produce byte-identical timelines.
pub struct SaturationDriver {
    egraph: EGraph,
    rewrites: Vec<Rewrite>,
    iteration_cap: usize,
    iterations_completed: usize,
    next: Next,
    pending_matches: Vec<(GlobalSymbol, Match)>,
    halted: Option<HaltedReason>,
    cancel_requested: bool,
}

impl SaturationDriver {
    pub fn new(egraph: EGraph, rewrites: Vec<Rewrite>, iteration_cap: usize) -> Self {
        SaturationDriver {
            egraph,
            rewrites,
            iteration_cap,
            iterations_completed: 0,
            next: Next::Read,
            pending_matches: vec![],
            halted: None,
            cancel_requested: false,
        }
    }

    pub fn egraph(&self) -> &EGraph {
        &self.egraph
    }

    pub fn into_egraph(self) -> EGraph {
        self.egraph
    }

    pub fn halted_reason(&self) -> Option<HaltedReason> {
        self.halted
    }

    pub fn iterations_completed(&self) -> usize {
        self.iterations_completed
    }

    /// Requests a halt at the next phase boundary. Observed at the top of
    /// `step`, so a Write or Rebuild already in flight still completes.
    pub fn request_cancel(&mut self) {
        self.cancel_requested = true;
    }

    /// Advances exactly one phase boundary. Returns `None` once halted —
    /// callers should stop calling `step` after the first `Halted` result.
    pub fn step(&mut self) -> Option<PhaseResult> {
        if self.halted.is_some() {
            return None;
        }
        if self.cancel_requested {
            self.halted = Some(HaltedReason::Canceled);
            return Some(PhaseResult::Halted(HaltedReason::Canceled));
        }

        match self.next {
            Next::Read => self.step_read(),
            Next::Write => self.step_write(),
            Next::Rebuild => self.step_rebuild(),
        }
    }

    fn step_read(&mut self) -> Option<PhaseResult> {
        if self.iterations_completed >= self.iteration_cap {
            self.halted = Some(HaltedReason::IterationCap);
            return Some(PhaseResult::Halted(HaltedReason::IterationCap));
        }

        let mut matches = vec![];
        for rw in self.rewrites.iter().filter(|r| r.enabled) {
            for m in rw.search(&self.egraph) {
                matches.push((rw.name, m));
            }
        }

        if matches.is_empty() {
            self.halted = Some(HaltedReason::Saturated);
            return Some(PhaseResult::Halted(HaltedReason::Saturated));
        }

        self.pending_matches = matches.clone();
        self.next = Next::Write;
        Some(PhaseResult::Read { matches })
    }

    fn step_write(&mut self) -> Option<PhaseResult> {
        let mut merges = vec![];

        for (name, m) in std::mem::take(&mut self.pending_matches) {
            let Some(rw) = self.rewrites.iter().find(|r| r.name == name) else {
                continue;
            };
            if let Ok(Some(applied)) = rw.apply_one(&mut self.egraph, &m) {
                merges.push(applied);
            }
        }

        let added = self.egraph.drain_added();

        if merges.is_empty() && added.is_empty() {
            self.halted = Some(HaltedReason::Saturated);
            return Some(PhaseResult::Halted(HaltedReason::Saturated));
        }

        self.next = Next::Rebuild;
        Some(PhaseResult::Write { merges, added })
    }

    fn step_rebuild(&mut self) -> Option<PhaseResult> {
        let repairs = self.egraph.rebuild();
        self.iterations_completed += 1;
        self.next = Next::Read;
        Some(PhaseResult::Rebuild { repairs })
    }
}

/// A cost model for [`Extractor`], grounded in the teacher's
/// `egraph::run::Extractor`. Costs must be totally ordered and
/// combine monotonically: cheaper children never produce a pricier parent
/// than some other choice of cheaper children would.
pub trait CostFunction {
    type Cost: Ord + Clone;

    fn cost(&mut self, op: GlobalSymbol, child_costs: &[Self::Cost]) -> Self::Cost;
}

/// Node count of the extracted term.
#[derive(Default)]
pub struct AstSize;

impl CostFunction for AstSize {
    type Cost = usize;

    fn cost(&mut self, _op: GlobalSymbol, child_costs: &[usize]) -> usize {
        1 + child_costs.iter().sum::<usize>()
    }
}

/// Depth of the extracted term (longest root-to-leaf path).
#[derive(Default)]
pub struct AstDepth;

impl CostFunction for AstDepth {
    type Cost = usize;

    fn cost(&mut self, _op: GlobalSymbol, child_costs: &[usize]) -> usize {
        1 + child_costs.iter().copied().max().unwrap_or(0)
    }
}

/// Picks the cheapest e-node per e-class by bottom-up fixpoint. Grounded
/// in the teacher's `Extractor`: repeatedly sweeps
/// every class, keeping each class's current-best `(cost, enode)`, until a
/// full sweep improves nothing.
pub struct Extractor<'a, C: CostFunction> {
    egraph: &'a EGraph,
    cost_fn: C,
    best: crate::utils::IndexMap<NodeId, (C::Cost, crate::enode::ENode)>,
}

impl<'a, C: CostFunction> Extractor<'a, C> {
    pub fn new(egraph: &'a EGraph, cost_fn: C) -> Self {
        let mut extractor = Extractor {
            egraph,
            cost_fn,
            best: Default::default(),
        };
        extractor.find_costs();
        extractor
    }

    fn find_costs(&mut self) {
        let mut changed = true;
        while changed {
            changed = false;
            for class in self.egraph.classes() {
                for node in &class.nodes {
                    if let Some(cost) = self.node_total_cost(node) {
                        let better = match self.best.get(&class.id) {
                            Some((prev, _)) => cost < *prev,
                            None => true,
                        };
                        if better {
                            self.best.insert(class.id, (cost, node.clone()));
                            changed = true;
                        }
                    }
                }
            }
        }
    }

    fn node_total_cost(&mut self, node: &crate::enode::ENode) -> Option<C::Cost> {
        let mut child_costs = Vec::with_capacity(node.args.len());
        for &arg in &node.args {
            let canon = self.egraph.canon_id(arg);
            child_costs.push(self.best.get(&canon)?.0.clone());
        }
        Some(self.cost_fn.cost(node.op, &child_costs))
    }

    /// Extracts the cheapest term rooted at `id`'s class, as a fully
    /// expanded s-expression string (`op` alone for a leaf, `op(a, b)`
    /// otherwise) — there is no need for a separate term-tree type here.
    pub fn extract(&self, id: NodeId) -> Option<String> {
        let canon = self.egraph.canon_id(id);
        let (_, node) = self.best.get(&canon)?;
        if node.is_leaf() {
            return Some(node.op.to_string());
        }
        let mut parts = Vec::with_capacity(node.args.len());
        for &arg in &node.args {
            parts.push(self.extract(arg)?);
        }
        Some(format!("{}({})", node.op, parts.join(", ")))
    }

    pub fn best_cost(&self, id: NodeId) -> Option<C::Cost> {
        let canon = self.egraph.canon_id(id);
        self.best.get(&canon).map(|(cost, _)| cost.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{egraph::Strategy, enode::ENode, pattern::Pattern, rewrite::Rewrite};

    fn rw(name: &str, lhs: &str, rhs: &str) -> Rewrite {
        Rewrite {
            name: name.into(),
            lhs: Pattern::parse(lhs).unwrap(),
            rhs: Pattern::parse(rhs).unwrap(),
            enabled: true,
        }
    }

    #[test]
    fn halts_saturated_when_no_rule_matches() {
        let mut eg = EGraph::new(Strategy::Deferred);
        eg.add(ENode::leaf("a"));
        let mut driver = SaturationDriver::new(eg, vec![rw("noop", "nonexistent", "nonexistent")], 100);

        loop {
            match driver.step() {
                Some(PhaseResult::Halted(reason)) => {
                    assert_eq!(reason, HaltedReason::Saturated);
                    break;
                }
                Some(_) => continue,
                None => panic!("step returned None before halting"),
            }
        }
    }

    #[test]
    fn saturates_double_negation() {
        let mut eg = EGraph::new(Strategy::Deferred);
        let a = eg.add(ENode::leaf("a"));
        let na = eg.add(ENode::new("neg", [a]));
        let nna = eg.add(ENode::new("neg", [na]));

        let mut driver = SaturationDriver::new(eg, vec![rw("double-neg", "neg(neg(?x))", "?x")], 20);
        while !matches!(driver.step(), Some(PhaseResult::Halted(_))) {}

        assert_eq!(driver.halted_reason(), Some(HaltedReason::Saturated));
        let eg = driver.egraph();
        assert_eq!(eg.canon_id(a), eg.canon_id(nna));
    }

    #[test]
    fn egg_paper_example_saturates_root_to_a() {
        let mut eg = EGraph::new(Strategy::Deferred);
        let a = eg.add(ENode::leaf("a"));
        let two = eg.add(ENode::leaf("2"));
        let mul = eg.add(ENode::new("*", [a, two]));
        let root = eg.add(ENode::new("/", [mul, two]));

        let rules = vec![
            rw("mul-two-to-shift", "*(?x,2)", "<<(?x,1)"),
            rw("div-self", "/(?x,?x)", "1"),
            rw("mul-one", "*(?x,1)", "?x"),
            rw(
                "div-distributes-over-mul",
                "/(*(?x,?y),?z)",
                "*(?x,/(?y,?z))",
            ),
        ];
        let mut driver = SaturationDriver::new(eg, rules, 50);
        while !matches!(driver.step(), Some(PhaseResult::Halted(_))) {}

        assert_eq!(driver.halted_reason(), Some(HaltedReason::Saturated));
        let eg = driver.egraph();
        assert_eq!(eg.canon_id(root), eg.canon_id(a));
    }

    #[test]
    fn iteration_cap_halts_a_strictly_growing_rule() {
        let mut eg = EGraph::new(Strategy::Deferred);
        eg.add(ENode::leaf("a"));
        let mut driver = SaturationDriver::new(eg, vec![rw("grow", "?x", "succ(?x)")], 5);

        let mut boundaries = 0;
        loop {
            match driver.step() {
                Some(PhaseResult::Rebuild { .. }) => boundaries += 1,
                Some(PhaseResult::Halted(reason)) => {
                    assert_eq!(reason, HaltedReason::IterationCap);
                    break;
                }
                Some(_) => continue,
                None => panic!("step returned None before halting"),
            }
        }
        assert_eq!(boundaries, 5);
        assert_eq!(driver.iterations_completed(), 5);
    }

    #[test]
    fn cancel_is_observed_at_the_next_boundary() {
        let mut eg = EGraph::new(Strategy::Deferred);
        eg.add(ENode::leaf("a"));
        let mut driver = SaturationDriver::new(eg, vec![rw("grow", "?x", "succ(?x)")], 1000);
        driver.request_cancel();
        assert!(matches!(
            driver.step(),
            Some(PhaseResult::Halted(HaltedReason::Canceled))
        ));
        assert_eq!(driver.step().map(|_| ()), None);
    }

    #[test]
    fn extractor_prefers_the_smaller_term() {
        let mut eg = EGraph::new(Strategy::Deferred);
        let a = eg.add(ENode::leaf("a"));
        let fa = eg.add(ENode::new("f", [a]));
        let gfa = eg.add(ENode::new("g", [fa]));
        eg.merge(a, gfa);
        eg.rebuild();

        let extractor = Extractor::new(&eg, AstSize);
        assert_eq!(extractor.best_cost(a), Some(1));
        assert_eq!(extractor.extract(a), Some("a".to_string()));
    }
}
