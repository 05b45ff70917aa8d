use symbol_table::GlobalSymbol;
use thiserror::Error;

use crate::id::NodeId;

/// Every way a core operation can fail-fast on a contract violation,
/// a validation failure, or (surfaced only via [`crate::Timeline::halted_reason`]
/// in ordinary operation) a driver halt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// `find`/`add` was asked about an id this e-graph never allocated.
    /// A contract violation: it indicates a caller bug, never recoverable.
    #[error("unknown node id: {0}")]
    UnknownId(NodeId),

    /// A preset failed validation before any snapshot was produced. The
    /// engine state is left untouched (empty) when this is raised.
    #[error("preset validation failed: {0}")]
    PresetValidation(String),

    /// A rewrite's right-hand side referenced a variable its left-hand
    /// side never bound.
    #[error("unbound pattern variable: {0}")]
    UnboundPatternVariable(GlobalSymbol),

    /// The driver hit `iteration_cap` before reaching saturation.
    #[error("iteration cap of {0} exceeded")]
    IterationCapExceeded(usize),

    /// The driver observed the cancellation flag at a phase boundary.
    #[error("run canceled")]
    Canceled,
}

pub type Result<T> = std::result::Result<T, Error>;
