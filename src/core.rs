use std::rc::Rc;

use crate::{
    driver::{AstSize, Extractor, PhaseResult, SaturationDriver},
    error::{Error, Result},
    preset::{Loaded, Preset, PresetLoader},
    snapshot::{render_node_string, DiffEvent, Phase, SelectionHint, Snapshot, SnapshotBuilder, SnapshotMetadata},
    timeline::{HaltedReason, Timeline},
};

/// The crate's single public entry point, analogous to the teacher's
/// `Runner` facade (`egraph/run.rs`): `load_preset`, `run_until_halt`,
/// `step`, `get_timeline`.
pub struct Core {
    driver: Option<SaturationDriver>,
    builder: SnapshotBuilder,
    timeline: Timeline,
}

impl Default for Core {
    fn default() -> Self {
        Self::new()
    }
}

impl Core {
    pub fn new() -> Self {
        Core {
            driver: None,
            builder: SnapshotBuilder::new(),
            timeline: Timeline::new("", Default::default()),
        }
    }

    /// Validates and seeds a fresh e-graph, resetting any prior run's
    /// timeline. Engine state is left untouched (empty) if validation
    /// fails.
    pub fn load_preset(&mut self, preset: &Preset) -> Result<()> {
        let Loaded {
            egraph,
            rewrites,
            options,
            ..
        } = PresetLoader::load(preset)?;

        self.builder = SnapshotBuilder::new();
        self.timeline = Timeline::new(preset.id.clone(), options.default_impl);

        let init = self
            .builder
            .capture(&egraph, Phase::Init, SnapshotMetadata::default());
        self.timeline.push(init);

        self.driver = Some(SaturationDriver::new(egraph, rewrites, options.iteration_cap));
        Ok(())
    }

    /// Advances exactly one phase boundary, publishing the resulting
    /// snapshot, and returns it — `None` once halted or before any preset
    /// has been loaded.
    pub fn step(&mut self) -> Option<Rc<Snapshot>> {
        let driver = self.driver.as_mut()?;
        let result = driver.step()?;

        let (phase, metadata) = match &result {
            PhaseResult::Read { matches } => (
                Phase::Read,
                SnapshotMetadata {
                    diff_events: matches
                        .iter()
                        .map(|(rule, m)| DiffEvent::Matched {
                            rule: *rule,
                            class: m.class,
                        })
                        .collect(),
                    ..Default::default()
                },
            ),
            PhaseResult::Write { merges, added } => {
                let egraph = driver.egraph();
                let mut diff_events: Vec<DiffEvent> = merges
                    .iter()
                    .map(|applied| DiffEvent::Merged {
                        rule: Some(applied.rule),
                        a: applied.target,
                        b: applied.actual,
                        into: applied.into,
                    })
                    .collect();
                diff_events.extend(added.iter().map(|(id, node)| DiffEvent::Added {
                    id: *id,
                    node: render_node_string(node, egraph),
                }));
                (Phase::Write, SnapshotMetadata { diff_events, ..Default::default() })
            }
            PhaseResult::Rebuild { .. } => (Phase::Rebuild, SnapshotMetadata::default()),
            PhaseResult::Halted(reason) => {
                self.timeline.halted_reason = Some(*reason);
                (
                    Phase::Done,
                    SnapshotMetadata {
                        halted_reason: Some(*reason),
                        ..Default::default()
                    },
                )
            }
        };

        let egraph = driver.egraph();
        let mut metadata = metadata;
        metadata.congruence_violations = egraph.check_congruence().len();
        metadata.hashcons_violations = egraph.check_hashcons().len();

        let extractor = Extractor::new(egraph, AstSize);
        metadata.selection_hints = egraph
            .classes()
            .filter_map(|class| {
                Some(SelectionHint {
                    class: class.id,
                    term: extractor.extract(class.id)?,
                    cost: extractor.best_cost(class.id)?,
                })
            })
            .collect();

        let snapshot = self.builder.capture(egraph, phase, metadata);
        self.timeline.push(snapshot.clone());
        Some(snapshot)
    }

    /// Steps until the driver reports a [`HaltedReason`], returning the
    /// finished [`Timeline`].
    pub fn run_until_halt(&mut self) -> Result<Timeline> {
        if self.driver.is_none() {
            return Err(Error::PresetValidation(
                "run_until_halt called before load_preset".into(),
            ));
        }
        while self.step().is_some() {
            if self.timeline.is_halted() {
                break;
            }
        }
        Ok(self.timeline.clone())
    }

    pub fn get_timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn halted_reason(&self) -> Option<HaltedReason> {
        self.timeline.halted_reason
    }

    /// Requests cancellation at the next phase boundary.
    pub fn cancel(&mut self) {
        if let Some(driver) = &mut self.driver {
            driver.request_cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Pattern;
    use crate::rewrite::Rewrite;

    fn rw(name: &str, lhs: &str, rhs: &str) -> Rewrite {
        Rewrite {
            name: name.into(),
            lhs: Pattern::parse(lhs).unwrap(),
            rhs: Pattern::parse(rhs).unwrap(),
            enabled: true,
        }
    }

    fn egg_paper_preset() -> Preset {
        Preset {
            id: "egg-paper".into(),
            label: "egg paper example".into(),
            description: "".into(),
            root: Pattern::parse("/(*(a,2),2)").unwrap(),
            initial_leaves: vec![],
            rewrites: vec![
                rw("mul-two-to-shift", "*(?x,2)", "<<(?x,1)"),
                rw("div-self", "/(?x,?x)", "1"),
                rw("mul-one", "*(?x,1)", "?x"),
                rw(
                    "div-distributes-over-mul",
                    "/(*(?x,?y),?z)",
                    "*(?x,/(?y,?z))",
                ),
            ],
            options: Default::default(),
            visualization: None,
        }
    }

    #[test]
    fn egg_paper_example_saturates_root_to_a() {
        let mut core = Core::new();
        let preset = egg_paper_preset();
        core.load_preset(&preset).unwrap();
        let timeline = core.run_until_halt().unwrap();

        assert_eq!(timeline.halted_reason, Some(HaltedReason::Saturated));
        assert!(timeline.states.len() >= 2);
    }

    #[test]
    fn load_preset_rejects_invalid_preset_without_mutating_prior_run() {
        let mut core = Core::new();
        core.load_preset(&egg_paper_preset()).unwrap();
        let before = core.get_timeline().states.len();

        let mut bad = egg_paper_preset();
        bad.rewrites.push(rw("dup", "x", "x"));
        bad.rewrites.push(rw("dup", "y", "y"));
        assert!(core.load_preset(&bad).is_err());

        assert_eq!(core.get_timeline().states.len(), before);
    }

    #[test]
    fn step_returns_none_before_any_preset_is_loaded() {
        let mut core = Core::new();
        assert!(core.step().is_none());
    }
}
