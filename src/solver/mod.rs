//! The interface between the evaluator and constraint solving.
//!
//! The evaluator consults a [`Solver`] to decide whether newly forked path
//! constraints are satisfiable. Three solvers ship with the crate:
//!
//! - [`Z3Solver`], which decides bit-vector constraints of any width with z3
//!   and is the one to use by default.
//! - [`EnumerationSolver`], a decision procedure for small domains, which
//!   gives up with [`SolverResult::Unknown`] once the search space gets too
//!   large. The z3 solver uses it as a fast path.
//! - [`DeferredSolver`], which optimistically reports every constraint as
//!   satisfiable and leaves the decision to whoever consumes the states.

pub mod enumerate;
pub mod eval;
pub mod smt;

use std::{collections::BTreeMap, fmt::Debug};

pub use enumerate::EnumerationSolver;
pub use smt::Z3Solver;

use crate::ir::expr::{Expr, SymbolicVar, Value};

/// An assignment of concrete values to symbolic variables.
///
/// Variables without an assignment are taken to be zero.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Model {
    values: BTreeMap<SymbolicVar, Value>,
}

impl Model {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `value` to `var`.
    pub fn assign(&mut self, var: SymbolicVar, value: Value) {
        self.values.insert(var, value);
    }

    /// Gets the value of `var` in the model.
    #[must_use]
    pub fn value_of(&self, var: &SymbolicVar) -> Value {
        self.values
            .get(var)
            .copied()
            .unwrap_or_else(|| var.ty.nth_value(0))
    }

    /// Looks up the variable called `name`, if it has an assignment.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.values
            .iter()
            .find(|(var, _)| var.name.as_ref() == name)
            .map(|(_, value)| *value)
    }

    /// Iterates over the assigned variables in order.
    pub fn iter(&self) -> impl Iterator<Item = (&SymbolicVar, &Value)> {
        self.values.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The answer of a solver for a constraint.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SolverResult {
    /// The constraint is satisfiable, witnessed by the model.
    Sat(Model),

    Unsat,

    /// The solver could not decide the constraint.
    Unknown,
}

impl SolverResult {
    #[must_use]
    pub fn is_sat(&self) -> bool {
        matches!(self, Self::Sat(_))
    }

    #[must_use]
    pub fn is_unsat(&self) -> bool {
        matches!(self, Self::Unsat)
    }
}

/// A decision procedure for path constraints.
pub trait Solver: Debug {
    /// Checks whether the boolean `constraint` is satisfiable.
    fn check(&self, constraint: &Expr) -> SolverResult;
}

/// A solver that never rules out any constraint.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeferredSolver;

impl Solver for DeferredSolver {
    fn check(&self, constraint: &Expr) -> SolverResult {
        if constraint.is_false() {
            SolverResult::Unsat
        } else {
            SolverResult::Sat(Model::default())
        }
    }
}
