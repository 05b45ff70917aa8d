use std::fmt;

use indexmap::IndexSet as OrderedSet;
use log::trace;
use serde::{de::Deserializer, ser::Serializer, Deserialize, Serialize};
use symbol_table::GlobalSymbol;

use crate::{
    egraph::EGraph,
    enode::ENode,
    error::{Error, Result},
    id::NodeId,
    utils::IndexMap,
};

/// A variable literal or a structural form. Variables are plain strings
/// with a leading `?`; there is deliberately no separate syntactic node
/// for them.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    Var(GlobalSymbol),
    Node { op: GlobalSymbol, args: Vec<Pattern> },
}

/// Wire form: a bare string (`"?x"` or a literal op) or `{ op, args }`.
/// Distinguishing `Var` from a literal leaf is done by the leading `?`,
/// not by JSON shape, so this can't be a plain derive.
#[derive(Deserialize)]
#[serde(untagged)]
enum PatternWire {
    Str(String),
    Node { op: String, args: Vec<Pattern> },
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match PatternWire::deserialize(deserializer)? {
            PatternWire::Str(s) if s.starts_with('?') => Pattern::var(s),
            PatternWire::Str(s) => Pattern::leaf(s),
            PatternWire::Node { op, args } => Pattern::node(op, args),
        })
    }
}

impl Serialize for Pattern {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        match self {
            Pattern::Var(v) => serializer.serialize_str(&v.to_string()),
            Pattern::Node { op, args } if args.is_empty() => {
                serializer.serialize_str(&op.to_string())
            }
            Pattern::Node { op, args } => {
                let mut s = serializer.serialize_struct("Pattern", 2)?;
                s.serialize_field("op", &op.to_string())?;
                s.serialize_field("args", args)?;
                s.end()
            }
        }
    }
}

impl Pattern {
    pub fn leaf(op: impl Into<GlobalSymbol>) -> Self {
        Pattern::Node {
            op: op.into(),
            args: vec![],
        }
    }

    pub fn node(op: impl Into<GlobalSymbol>, args: impl IntoIterator<Item = Pattern>) -> Self {
        Pattern::Node {
            op: op.into(),
            args: args.into_iter().collect(),
        }
    }

    pub fn var(name: impl Into<GlobalSymbol>) -> Self {
        Pattern::Var(name.into())
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Pattern::Var(_))
    }

    /// Every variable mentioned in this pattern, first-occurrence order.
    pub fn vars(&self) -> Vec<GlobalSymbol> {
        let mut out = vec![];
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut Vec<GlobalSymbol>) {
        match self {
            Pattern::Var(v) => {
                if !out.contains(v) {
                    out.push(*v);
                }
            }
            Pattern::Node { args, .. } => args.iter().for_each(|a| a.collect_vars(out)),
        }
    }

    /// Parses `"?x"` or a literal op, or `{ op, args }` written as an
    /// s-expression `(op arg0 arg1 ...)`. This is the string front door the
    /// teacher's `Pattern: FromStr` convention inspires.
    pub fn parse(src: &str) -> Result<Pattern> {
        let tokens = tokenize(src);
        let mut pos = 0;
        let pat = parse_one(&tokens, &mut pos)
            .ok_or_else(|| Error::PresetValidation(format!("empty pattern: {src:?}")))?;
        if pos != tokens.len() {
            return Err(Error::PresetValidation(format!(
                "trailing input in pattern: {src:?}"
            )));
        }
        Ok(pat)
    }
}

fn tokenize(src: &str) -> Vec<String> {
    let mut tokens = vec![];
    let mut chars = src.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '(' | ')' | ',' => {
                tokens.push(c.to_string());
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            _ => {
                let mut tok = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | ',') {
                        break;
                    }
                    tok.push(c);
                    chars.next();
                }
                tokens.push(tok);
            }
        }
    }
    tokens
}

fn parse_one(tokens: &[String], pos: &mut usize) -> Option<Pattern> {
    let tok = tokens.get(*pos)?;
    if tok == "(" {
        *pos += 1;
        let op = tokens.get(*pos)?.clone();
        *pos += 1;
        let mut args = vec![];
        loop {
            match tokens.get(*pos).map(String::as_str) {
                Some(")") => {
                    *pos += 1;
                    break;
                }
                Some(",") => {
                    *pos += 1;
                }
                Some(_) => args.push(parse_one(tokens, pos)?),
                None => return None,
            }
        }
        Some(Pattern::node(op, args))
    } else {
        *pos += 1;
        if let Some(name) = tok.strip_prefix('?') {
            Some(Pattern::var(format!("?{name}")))
        } else {
            Some(Pattern::leaf(tok.clone()))
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Var(v) => write!(f, "{v}"),
            Pattern::Node { op, args } if args.is_empty() => write!(f, "{op}"),
            Pattern::Node { op, args } => {
                write!(f, "{op}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{a:?}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Variable name → bound canonical id.
pub type Subst = IndexMap<GlobalSymbol, NodeId>;

/// A pattern matches an e-class by recursively matching each e-node in
/// that class; structural forms inner-join substitutions across their
/// argument patterns, and a variable reused within one pattern must bind
/// consistently.
pub fn match_pattern(pattern: &Pattern, class_id: NodeId, egraph: &EGraph) -> Vec<Subst> {
    match_into(pattern, class_id, egraph, &Subst::default())
}

fn match_into(pattern: &Pattern, class_id: NodeId, egraph: &EGraph, base: &Subst) -> Vec<Subst> {
    let class_id = egraph.canon_id(class_id);
    match pattern {
        Pattern::Var(v) => match base.get(v) {
            Some(&bound) if bound == class_id => vec![base.clone()],
            Some(_) => vec![],
            None => {
                let mut s = base.clone();
                s.insert(*v, class_id);
                vec![s]
            }
        },
        Pattern::Node { op, args } => {
            let class = match egraph.class(class_id) {
                Some(c) => c,
                None => return vec![],
            };
            let mut out = vec![];
            for node in class.nodes.iter() {
                if node.op != *op || node.arity() != args.len() {
                    continue;
                }
                out.extend(match_node_args(args, node, egraph, base));
            }
            out
        }
    }
}

fn match_node_args(
    pats: &[Pattern],
    node: &ENode,
    egraph: &EGraph,
    base: &Subst,
) -> Vec<Subst> {
    let mut frontier = vec![base.clone()];
    for (pat, &child) in pats.iter().zip(node.args.iter()) {
        let mut next = vec![];
        for s in &frontier {
            next.extend(match_into(pat, child, egraph, s));
        }
        frontier = next;
        if frontier.is_empty() {
            break;
        }
    }
    frontier
}

/// Recursively `add`s e-nodes, substituting variables by their bound ids.
/// Rejects an RHS that mentions a variable the LHS never bound — fresh
/// RHS variables are unsupported.
pub fn instantiate(pattern: &Pattern, subst: &Subst, egraph: &mut EGraph) -> Result<NodeId> {
    match pattern {
        Pattern::Var(v) => subst
            .get(v)
            .copied()
            .ok_or(Error::UnboundPatternVariable(*v)),
        Pattern::Node { op, args } => {
            let mut ids = Vec::with_capacity(args.len());
            for a in args {
                ids.push(instantiate(a, subst, egraph)?);
            }
            let id = egraph.add(ENode::new(*op, ids));
            trace!("instantiate {pattern:?} under {subst:?} -> {id}");
            Ok(id)
        }
    }
}

/// Checks that every variable `rhs` references is bound by `lhs`, without
/// touching an e-graph. Used at preset-load time.
pub fn rhs_vars_bound_by_lhs(lhs: &Pattern, rhs: &Pattern) -> std::result::Result<(), GlobalSymbol> {
    let bound: OrderedSet<GlobalSymbol> = lhs.vars().into_iter().collect();
    for v in rhs.vars() {
        if !bound.contains(&v) {
            return Err(v);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::egraph::Strategy;

    #[test]
    fn parses_sexpr_pattern() {
        let pat = Pattern::parse("*(?x,2)").unwrap();
        assert_eq!(pat, Pattern::node("*", [Pattern::var("?x"), Pattern::leaf("2")]));
    }

    #[test]
    fn matches_variable_against_every_node() {
        let mut eg = EGraph::new(Strategy::Deferred);
        let a = eg.add(ENode::leaf("a"));
        let pat = Pattern::var("?x");
        let substs = match_pattern(&pat, a, &eg);
        assert_eq!(substs.len(), 1);
        assert_eq!(substs[0][&GlobalSymbol::from("?x")], a);
    }

    #[test]
    fn repeated_variable_must_bind_consistently() {
        let mut eg = EGraph::new(Strategy::Deferred);
        let a = eg.add(ENode::leaf("a"));
        let b = eg.add(ENode::leaf("b"));
        let same = eg.add(ENode::new("pair", [a, a]));
        let diff = eg.add(ENode::new("pair", [a, b]));

        let pat = Pattern::node("pair", [Pattern::var("?x"), Pattern::var("?x")]);
        assert_eq!(match_pattern(&pat, same, &eg).len(), 1);
        assert!(match_pattern(&pat, diff, &eg).is_empty());
    }

    #[test]
    fn instantiate_rejects_unbound_rhs_var() {
        let mut eg = EGraph::new(Strategy::Deferred);
        let subst = Subst::default();
        let rhs = Pattern::var("?z");
        assert!(matches!(
            instantiate(&rhs, &subst, &mut eg),
            Err(Error::UnboundPatternVariable(_))
        ));
    }
}
