//! This module contains the reachability engine, which matches the constructs
//! an execution visits against a user-supplied pattern.
//!
//! A pattern is a sequence of terms separated by `;`, each of which is a
//! choice between atoms separated by `+`. An atom names constructs of the
//! program, and may be negated with `!` to forbid those constructs from that
//! point of the pattern onwards, or guarded by a condition in parentheses that
//! must hold when the construct is matched.
//!
//! ```text
//! ingress.acl; !ingress.drop; egress.rewrite(hdr.ipv4.ttl != 8w0)
//! ```
//!
//! Patterns are compiled against a [`Dcg`], and every problem with a pattern
//! is reported when it is compiled rather than during exploration. That
//! includes conditions, which must be boolean and may only read variables
//! that [`VariableTypes`] knows about.

pub mod check;
pub mod lexer;
pub mod parser;

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;

use crate::{
    error::{
        located::Locatable,
        pattern::{Error, Result},
    },
    graph::Dcg,
    ir::{expr::Expr, NodeId},
    pattern::parser::{Atom, PatternAst},
};

pub use check::VariableTypes;

/// One position of a compiled pattern.
#[derive(Clone, Debug, PartialEq)]
struct Step {
    /// The nodes that match at this position, with the condition attached to
    /// the atom that named them.
    expected: BTreeMap<NodeId, Option<Expr>>,

    /// The pattern text that the position was compiled from.
    label: String,
}

/// Nodes forbidden once the engine has reached position `from`.
#[derive(Clone, Debug, PartialEq)]
struct Forbidden {
    from:  usize,
    nodes: BTreeSet<NodeId>,
}

/// The progress of a single trace through a pattern.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct EngineState {
    /// The node that most recently matched.
    pub previous: Option<NodeId>,

    /// The index of the next position of the pattern to match.
    pub position: usize,
}

/// The result of offering a node to the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The node is forbidden, and the trace that visited it is invalid.
    Forbidden,

    /// The node is the one that matched most recently, and is matched again
    /// without advancing.
    Revisit,

    /// The node matched the next position, which the engine advanced past.
    Advance { condition: Option<Expr> },

    /// The node is not relevant to the pattern yet.
    Skip,
}

impl Outcome {
    /// Checks whether the node matched the pattern.
    #[must_use]
    pub fn matched(&self) -> bool {
        matches!(self, Self::Revisit | Self::Advance { .. })
    }

    /// Gets the condition that must hold for the match to stand, if any.
    #[must_use]
    pub fn condition(&self) -> Option<&Expr> {
        match self {
            Self::Advance { condition } => condition.as_ref(),
            _ => None,
        }
    }
}

/// A compiled reachability pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct ReachabilityEngine {
    steps:     Vec<Step>,
    forbidden: Vec<Forbidden>,
}

impl ReachabilityEngine {
    /// Compiles `pattern` against the names and edges of `dcg`, checking its
    /// conditions against the variables in `vars`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the pattern is malformed, names a construct the
    /// graph does not know about, has a condition that is not a well-typed
    /// boolean over declared variables, requires and forbids the same
    /// construct at the same position, or requires a sequence of constructs
    /// that no execution can visit in order.
    pub fn compile(pattern: &str, dcg: &Dcg, vars: &dyn VariableTypes) -> Result<Self> {
        let ast = parser::parse(pattern)?;
        for atom in ast.terms.iter().flat_map(|term| &term.atoms) {
            if let Some(condition) = &atom.condition {
                check::check_condition(condition, vars).locate(atom.offset)?;
            }
        }
        let engine = Self::from_ast(&ast, dcg)?;
        log::debug!(
            "Compiled pattern {pattern:?} into {} positions and {} forbidden sets",
            engine.steps.len(),
            engine.forbidden.len()
        );
        Ok(engine)
    }

    fn from_ast(ast: &PatternAst, dcg: &Dcg) -> Result<Self> {
        let resolve = |atom: &Atom| -> Result<BTreeSet<NodeId>> {
            let nodes = dcg.name_index().lookup(&atom.name);
            if nodes.is_empty() {
                return Err(Error::UnknownName {
                    name: atom.name.clone(),
                }
                .locate(atom.offset));
            }
            Ok(nodes)
        };

        let mut steps: Vec<Step> = Vec::new();
        let mut forbidden: Vec<Forbidden> = Vec::new();
        let mut offsets = Vec::new();

        for term in &ast.terms {
            let position = steps.len();
            let (negated, required): (Vec<&Atom>, Vec<&Atom>) =
                term.atoms.iter().partition(|a| a.negated);

            for atom in negated {
                forbidden.push(Forbidden {
                    from:  position,
                    nodes: resolve(atom)?,
                });
            }
            if required.is_empty() {
                continue;
            }

            let mut expected = BTreeMap::new();
            for &atom in &required {
                let nodes = resolve(atom)?;
                if forbidden
                    .iter()
                    .any(|f| f.from <= position && !f.nodes.is_disjoint(&nodes))
                {
                    return Err(Error::Contradiction {
                        name: atom.name.clone(),
                    }
                    .locate(atom.offset));
                }
                for node in nodes {
                    expected.entry(node).or_insert_with(|| atom.condition.clone());
                }
            }
            let label = required.iter().map(|a| a.name.as_str()).join("+");
            steps.push(Step { expected, label });
            offsets.push(required[0].offset);
        }

        for (pair, offset) in steps.windows(2).zip(offsets.iter().skip(1)) {
            let [from, to] = pair else { continue };
            let from_nodes = from.expected.keys().copied().collect();
            let to_nodes = to.expected.keys().copied().collect();
            if !dcg.is_any_reachable(&from_nodes, &to_nodes) {
                return Err(Error::UnreachableSequence {
                    from: from.label.clone(),
                    to:   to.label.clone(),
                }
                .locate(*offset));
            }
        }

        Ok(Self { steps, forbidden })
    }

    /// Gets the state at the start of the pattern.
    #[must_use]
    pub fn initial_state(&self) -> EngineState {
        EngineState::default()
    }

    /// Gets the number of positions in the pattern.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Checks whether `node` is forbidden in `state`.
    #[must_use]
    pub fn is_forbidden(&self, state: &EngineState, node: NodeId) -> bool {
        self.forbidden
            .iter()
            .any(|f| f.from <= state.position && f.nodes.contains(&node))
    }

    /// Offers `node` to the engine in `state`, advancing `state` if the node
    /// matches the next position of the pattern.
    pub fn next(&self, state: &mut EngineState, node: NodeId) -> Outcome {
        if self.is_forbidden(state, node) {
            return Outcome::Forbidden;
        }
        if state.previous == Some(node) {
            return Outcome::Revisit;
        }
        let Some(condition) = self
            .steps
            .get(state.position)
            .and_then(|step| step.expected.get(&node))
        else {
            return Outcome::Skip;
        };

        state.position += 1;
        state.previous = Some(node);
        Outcome::Advance {
            condition: condition.clone(),
        }
    }

    /// Checks whether every position of the pattern has been matched.
    #[must_use]
    pub fn is_complete(&self, state: &EngineState) -> bool {
        state.position >= self.steps.len()
    }

    /// Offers each of `nodes` to the engine in turn, starting from the initial
    /// state.
    ///
    /// Returns [`None`] if any of the nodes is forbidden, and otherwise the
    /// final state together with the conditions of the matched atoms.
    #[must_use]
    pub fn replay(
        &self,
        nodes: impl IntoIterator<Item = NodeId>,
    ) -> Option<(EngineState, Vec<Expr>)> {
        let mut state = self.initial_state();
        let mut conditions = Vec::new();
        for node in nodes {
            match self.next(&mut state, node) {
                Outcome::Forbidden => return None,
                Outcome::Advance {
                    condition: Some(condition),
                } => conditions.push(condition),
                _ => (),
            }
        }
        Some((state, conditions))
    }
}
