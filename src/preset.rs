use serde::{Deserialize, Serialize};
use symbol_table::GlobalSymbol;

use crate::{
    egraph::{EGraph, Strategy},
    enode::ENode,
    error::{Error, Result},
    id::NodeId,
    pattern::{rhs_vars_bound_by_lhs, Pattern},
    rewrite::Rewrite,
    utils::{IndexMap, IndexSet},
};

fn default_impl() -> Strategy {
    Strategy::Deferred
}

fn default_iteration_cap() -> usize {
    250
}

/// `{ default_impl, iteration_cap }`. The core's only configuration
/// surface — there is no env/file layer since the core accepts presets as
/// in-memory values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    #[serde(default = "default_impl")]
    pub default_impl: Strategy,
    #[serde(default = "default_iteration_cap")]
    pub iteration_cap: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            default_impl: default_impl(),
            iteration_cap: default_iteration_cap(),
        }
    }
}

/// `{ auto_play, highlight_nodes }`. Pure hint data for a consumer's
/// rendering layer; the core never reads it back.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visualization {
    #[serde(default)]
    pub auto_play: bool,
    #[serde(default)]
    pub highlight_nodes: Vec<u32>,
}

/// `Preset := { id, label, description, root, rewrites, options?,
/// visualization? }`, plus an optional `initial_leaves` ingestion hint:
/// leaf operators named here are seeded first, in order, so a preset can
/// pin which leaves get the lowest ids before the rest of `root` is walked.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub label: String,
    pub description: String,
    pub root: Pattern,
    #[serde(default)]
    pub initial_leaves: Vec<String>,
    pub rewrites: Vec<Rewrite>,
    #[serde(default)]
    pub options: Options,
    #[serde(default)]
    pub visualization: Option<Visualization>,
}

/// Result of loading a [`Preset`]: a seeded e-graph, the root's canonical
/// id, and the rule/option data the driver needs.
pub struct Loaded {
    pub egraph: EGraph,
    pub root: NodeId,
    pub rewrites: Vec<Rewrite>,
    pub options: Options,
}

/// Validates a preset, then seeds an [`EGraph`] by walking `root`
/// depth-first, adding leaves before parents.
pub struct PresetLoader;

impl PresetLoader {
    pub fn load(preset: &Preset) -> Result<Loaded> {
        validate(preset)?;

        let mut egraph = EGraph::new(preset.options.default_impl);
        for name in &preset.initial_leaves {
            egraph.add(ENode::leaf(name.as_str()));
        }
        let root = seed(&preset.root, &mut egraph);

        log::debug!(
            "loaded preset {:?}: {} rules, {} classes seeded",
            preset.id,
            preset.rewrites.len(),
            egraph.number_of_classes()
        );

        Ok(Loaded {
            egraph,
            root,
            rewrites: preset.rewrites.clone(),
            options: preset.options,
        })
    }
}

fn seed(pattern: &Pattern, egraph: &mut EGraph) -> NodeId {
    match pattern {
        Pattern::Var(name) => egraph.add(ENode::leaf(*name)),
        Pattern::Node { op, args } => {
            let ids: Vec<NodeId> = args.iter().map(|a| seed(a, egraph)).collect();
            egraph.add(ENode::new(*op, ids))
        }
    }
}

fn validate(preset: &Preset) -> Result<()> {
    check_var_names(&preset.root)?;

    let mut seen_names: IndexSet<GlobalSymbol> = IndexSet::default();
    for rw in &preset.rewrites {
        if !seen_names.insert(rw.name) {
            return Err(Error::PresetValidation(format!(
                "duplicate rule name: {}",
                rw.name
            )));
        }
        check_var_names(&rw.lhs)?;
        check_var_names(&rw.rhs)?;
        rhs_vars_bound_by_lhs(&rw.lhs, &rw.rhs).map_err(|v| {
            Error::PresetValidation(format!(
                "rule {} references unbound variable {v} in its right-hand side",
                rw.name
            ))
        })?;
    }

    let mut arities: IndexMap<GlobalSymbol, usize> = IndexMap::default();
    check_arity(&preset.root, &mut arities)?;
    for rw in &preset.rewrites {
        check_arity(&rw.lhs, &mut arities)?;
        check_arity(&rw.rhs, &mut arities)?;
    }

    Ok(())
}

fn check_var_names(pattern: &Pattern) -> Result<()> {
    match pattern {
        Pattern::Var(name) => {
            let s = name.to_string();
            let rest = s.strip_prefix('?');
            let valid = matches!(rest, Some(body) if !body.is_empty()
                && body.chars().all(|c| c.is_alphanumeric() || c == '_'));
            if !valid {
                return Err(Error::PresetValidation(format!(
                    "illegal pattern variable name: {s:?}"
                )));
            }
            Ok(())
        }
        Pattern::Node { args, .. } => {
            for a in args {
                check_var_names(a)?;
            }
            Ok(())
        }
    }
}

fn check_arity(pattern: &Pattern, arities: &mut IndexMap<GlobalSymbol, usize>) -> Result<()> {
    if let Pattern::Node { op, args } = pattern {
        match arities.get(op) {
            Some(&prev) if prev != args.len() => {
                return Err(Error::PresetValidation(format!(
                    "operator {op} used with arity {prev} elsewhere but {} here",
                    args.len()
                )));
            }
            _ => {
                arities.insert(*op, args.len());
            }
        }
        for a in args {
            check_arity(a, arities)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rw(name: &str, lhs: &str, rhs: &str) -> Rewrite {
        Rewrite {
            name: name.into(),
            lhs: Pattern::parse(lhs).unwrap(),
            rhs: Pattern::parse(rhs).unwrap(),
            enabled: true,
        }
    }

    fn base_preset() -> Preset {
        Preset {
            id: "demo".into(),
            label: "Demo".into(),
            description: "".into(),
            root: Pattern::parse("f(a)").unwrap(),
            initial_leaves: vec![],
            rewrites: vec![],
            options: Options::default(),
            visualization: None,
        }
    }

    #[test]
    fn loads_and_seeds_the_root_term() {
        let preset = base_preset();
        let loaded = PresetLoader::load(&preset).unwrap();
        assert_eq!(loaded.egraph.number_of_classes(), 2);
    }

    #[test]
    fn rejects_unbound_rhs_variable() {
        let mut preset = base_preset();
        preset.rewrites = vec![rw("bad", "?x", "?y")];
        assert!(matches!(
            PresetLoader::load(&preset),
            Err(Error::PresetValidation(_))
        ));
    }

    #[test]
    fn rejects_duplicate_rule_names() {
        let mut preset = base_preset();
        preset.rewrites = vec![rw("same", "a", "b"), rw("same", "b", "a")];
        assert!(matches!(
            PresetLoader::load(&preset),
            Err(Error::PresetValidation(_))
        ));
    }

    #[test]
    fn rejects_illegal_variable_name() {
        let mut preset = base_preset();
        preset.root = Pattern::var("?");
        assert!(matches!(
            PresetLoader::load(&preset),
            Err(Error::PresetValidation(_))
        ));
    }

    #[test]
    fn rejects_inconsistent_arity() {
        let mut preset = base_preset();
        preset.root = Pattern::node("f", [Pattern::leaf("a"), Pattern::leaf("b")]);
        preset.rewrites = vec![rw("shrink", "f(?x)", "?x")];
        assert!(matches!(
            PresetLoader::load(&preset),
            Err(Error::PresetValidation(_))
        ));
    }

    #[test]
    fn initial_leaves_get_seeded_first() {
        let mut preset = base_preset();
        preset.initial_leaves = vec!["a".into()];
        let loaded = PresetLoader::load(&preset).unwrap();
        // "a" was pre-seeded, so walking root's leaf "a" must hashcons onto
        // the same class rather than allocating a second one.
        assert_eq!(loaded.egraph.number_of_classes(), 2);
    }
}
