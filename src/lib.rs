//! Equality-saturation core: a union-find, a hash-consed e-graph with two
//! interchangeable congruence-maintenance strategies, a pattern/e-matching
//! engine, a saturation driver, and a deterministic snapshot timeline.
//!
//! [`Core`] is the crate's single entry point: load a [`Preset`], then
//! either [`Core::run_until_halt`] or [`Core::step`] through it one phase
//! boundary at a time and read back a [`Timeline`] of [`Snapshot`]s.

mod core;
mod driver;
mod eclass;
mod egraph;
mod enode;
mod error;
mod id;
mod pattern;
mod preset;
mod rewrite;
mod snapshot;
mod term_store;
mod timeline;
mod union_find;
mod utils;

pub use crate::core::Core;
pub use driver::{AstDepth, AstSize, CostFunction, Extractor, PhaseResult, SaturationDriver};
pub use eclass::EClass;
pub use egraph::{CongruenceViolation, EGraph, HashconsViolation, Strategy};
pub use enode::{Args, CanonicalKey, ENode};
pub use error::{Error, Result};
pub use id::NodeId;
pub use pattern::{instantiate, match_pattern, Pattern, Subst};
pub use preset::{Loaded, Options, Preset, PresetLoader, Visualization};
pub use rewrite::{AppliedMerge, Match, Rewrite};
pub use snapshot::{
    DiffEvent, Phase, SelectionHint, Snapshot, SnapshotBuilder, SnapshotClass, SnapshotMetadata,
    UnionFindEntry,
};
pub use term_store::TermStore;
pub use timeline::{HaltedReason, Timeline};
pub use union_find::UnionFind;
