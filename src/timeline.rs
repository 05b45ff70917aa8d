use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::snapshot::Snapshot;

/// Why a [`crate::driver::SaturationDriver`] stopped. Not an error: driver
/// halts are reported here, never through `Result::Err`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltedReason {
    /// A Read phase produced zero matches, or a Write phase produced no
    /// merges and added no nodes: the e-graph is at a fixed point.
    Saturated,
    /// `iteration_cap` was reached before saturation.
    IterationCap,
    /// The `cancel` flag was observed at a phase boundary.
    Canceled,
}

/// `{ preset_id, implementation, states, halted_reason }`.
/// Append-only: snapshots are published in the order they were produced
/// and are never retracted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Timeline {
    pub preset_id: String,
    pub implementation: crate::egraph::Strategy,
    pub states: Vec<Rc<Snapshot>>,
    pub halted_reason: Option<HaltedReason>,
}

impl Timeline {
    pub fn new(preset_id: impl Into<String>, implementation: crate::egraph::Strategy) -> Self {
        Timeline {
            preset_id: preset_id.into(),
            implementation,
            states: vec![],
            halted_reason: None,
        }
    }

    pub fn push(&mut self, snapshot: Rc<Snapshot>) {
        self.states.push(snapshot);
    }

    pub fn last(&self) -> Option<&Rc<Snapshot>> {
        self.states.last()
    }

    pub fn is_halted(&self) -> bool {
        self.halted_reason.is_some()
    }
}
