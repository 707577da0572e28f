//! A solver that decides constraints by propagating equalities and then
//! enumerating the remaining search space.

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::{
    constant::DEFAULT_ENUMERATION_LIMIT,
    ir::expr::{BinaryOp, Expr, ExprKind, SymbolicVar, Type, UnaryOp, Value},
    solver::{
        eval::{eval, satisfies},
        Model,
        Solver,
        SolverResult,
    },
};

/// Decides constraints over finite domains.
///
/// Top-level conjuncts that fix a variable to a constant or equate two
/// variables are propagated first. The remaining constraint is then checked
/// against every assignment of its free variables, provided there are at most
/// `limit` of them.
#[derive(Clone, Copy, Debug)]
pub struct EnumerationSolver {
    limit: u128,
}

impl EnumerationSolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of assignments the solver will try.
    #[must_use]
    pub fn with_limit(mut self, limit: u128) -> Self {
        self.limit = limit;
        self
    }
}

impl Default for EnumerationSolver {
    fn default() -> Self {
        let limit = DEFAULT_ENUMERATION_LIMIT;
        Self { limit }
    }
}

impl Solver for EnumerationSolver {
    fn check(&self, constraint: &Expr) -> SolverResult {
        let mut conjuncts = vec![];
        flatten_conjunction(constraint, &mut conjuncts);

        let Some(substitution) = propagate(&mut conjuncts) else {
            return SolverResult::Unsat;
        };
        let residual = Expr::all(conjuncts);
        let free = residual.vars().into_iter().collect_vec();

        let Some(space) = free
            .iter()
            .try_fold(1u128, |acc, var| acc.checked_mul(var.ty.domain_size()))
            .filter(|space| *space <= self.limit)
        else {
            log::trace!("Giving up on constraint over {} free variables", free.len());
            return SolverResult::Unknown;
        };

        for index in 0..space {
            let model = decode(&free, index);
            if satisfies(&residual, &model) {
                return SolverResult::Sat(complete(model, &substitution));
            }
        }

        SolverResult::Unsat
    }
}

/// Splits `expr` into its top-level conjuncts.
fn flatten_conjunction(expr: &Expr, out: &mut Vec<Expr>) {
    match expr.kind() {
        ExprKind::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => {
            flatten_conjunction(left, out);
            flatten_conjunction(right, out);
        }
        _ => out.push(expr.clone()),
    }
}

/// Gets the binding that `conjunct` forces, if it has the shape of one.
fn forced_binding(conjunct: &Expr) -> Option<(SymbolicVar, Expr)> {
    match conjunct.kind() {
        ExprKind::Var(var) if var.ty == Type::Bool => Some((var.clone(), Expr::bool(true))),
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand,
        } => match operand.kind() {
            ExprKind::Var(var) if var.ty == Type::Bool => {
                Some((var.clone(), Expr::bool(false)))
            }
            _ => None,
        },
        ExprKind::Binary {
            op: BinaryOp::Eq,
            left,
            right,
        } => match (left.kind(), right.kind()) {
            (ExprKind::Var(x), ExprKind::Var(y)) if x != y && x.ty == y.ty => {
                Some((x.clone(), right.clone()))
            }
            (ExprKind::Var(var), _) if has_type(right, var.ty) => {
                Some((var.clone(), right.clone()))
            }
            (_, ExprKind::Var(var)) if has_type(left, var.ty) => {
                Some((var.clone(), left.clone()))
            }
            _ => None,
        },
        _ => None,
    }
}

fn has_type(expr: &Expr, ty: Type) -> bool {
    match expr.as_value() {
        Some(Value::Bool(_)) => ty == Type::Bool,
        Some(Value::Bits { width, .. }) => ty == Type::Bits(width),
        None => false,
    }
}

fn substitute(expr: &Expr, var: &SymbolicVar, value: &Expr) -> Expr {
    expr.transform(&mut |e| match e.kind() {
        ExprKind::Var(v) if v == var => Some(value.clone()),
        _ => None,
    })
}

/// Eliminates every variable that the conjuncts force to a constant or to
/// another variable.
///
/// Returns [`None`] if a conjunct folds to `false`, and otherwise the
/// eliminated variables along with what they were replaced by.
fn propagate(conjuncts: &mut Vec<Expr>) -> Option<BTreeMap<SymbolicVar, Expr>> {
    let mut substitution: BTreeMap<SymbolicVar, Expr> = BTreeMap::new();
    loop {
        conjuncts.retain(|c| !c.is_true());
        if conjuncts.iter().any(Expr::is_false) {
            return None;
        }
        let Some((var, value)) = conjuncts.iter().find_map(forced_binding) else {
            return Some(substitution);
        };

        for conjunct in conjuncts.iter_mut() {
            *conjunct = substitute(conjunct, &var, &value);
        }
        for bound in substitution.values_mut() {
            *bound = substitute(bound, &var, &value);
        }
        substitution.insert(var, value);
    }
}

/// Builds the `index`th assignment of `vars`, read as a mixed-radix number.
fn decode(vars: &[SymbolicVar], mut index: u128) -> Model {
    let mut model = Model::new();
    for var in vars {
        let size = var.ty.domain_size();
        let digit = if size == u128::MAX { index } else { index % size };
        model.assign(var.clone(), var.ty.nth_value(digit));
        index = if size == u128::MAX { 0 } else { index / size };
    }
    model
}

/// Extends `model` with the values of the eliminated variables.
fn complete(mut model: Model, substitution: &BTreeMap<SymbolicVar, Expr>) -> Model {
    for (var, value) in substitution {
        let value = eval(value, &model).unwrap_or_else(|| var.ty.nth_value(0));
        model.assign(var.clone(), value);
    }
    model
}
