//! A solver that decides constraints with z3 over fixed-width bit-vectors.
//!
//! Constraints are translated term by term, so the bit-vector semantics of
//! [`Value::binary`] carry over: operands of differing widths are
//! zero-extended to the wider of the two, and arithmetic results are
//! truncated to the width of the left operand.

use derivative::Derivative;
use z3::{
    ast::{Ast, Bool, BV},
    Config,
    Context,
    SatResult,
};

use crate::{
    constant::{DEFAULT_FAST_PATH_LIMIT, DEFAULT_SOLVER_TIMEOUT_MS},
    ir::expr::{BinaryOp, Expr, ExprKind, SymbolicVar, Type, UnaryOp, Value},
    solver::{EnumerationSolver, Model, Solver, SolverResult},
};

/// Decides constraints with z3.
///
/// Constraints over small domains are first handed to an
/// [`EnumerationSolver`], which answers them without going through z3.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Z3Solver {
    #[derivative(Debug = "ignore")]
    context: Context,

    fast_path: Option<EnumerationSolver>,
}

impl Z3Solver {
    /// Creates a solver that gives up on a query after
    /// [`DEFAULT_SOLVER_TIMEOUT_MS`] milliseconds.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_SOLVER_TIMEOUT_MS)
    }

    #[must_use]
    pub fn with_timeout(timeout_ms: u64) -> Self {
        let mut config = Config::new();
        config.set_model_generation(true);
        config.set_timeout_msec(timeout_ms);
        let context = Context::new(&config);
        let fast_path = Some(EnumerationSolver::new().with_limit(DEFAULT_FAST_PATH_LIMIT));
        Self { context, fast_path }
    }

    /// Sends every constraint to z3, skipping the enumeration fast path.
    #[must_use]
    pub fn without_fast_path(mut self) -> Self {
        self.fast_path = None;
        self
    }

    /// Reads the values of `vars` out of a satisfying z3 model.
    fn model<'ctx>(
        &'ctx self,
        vars: impl IntoIterator<Item = SymbolicVar>,
        found: &z3::Model<'ctx>,
    ) -> Model {
        let mut model = Model::new();
        for var in vars {
            let value = match var.ty {
                Type::Bool => found
                    .eval(&Bool::new_const(&self.context, var.name.as_ref()), true)
                    .and_then(|b| b.as_bool())
                    .map(Value::Bool),
                Type::Bits(width) => {
                    let bv = BV::new_const(&self.context, var.name.as_ref(), u32::from(width));
                    bits_value(found, &bv, width)
                }
            };
            match value {
                Some(value) => model.assign(var, value),
                None => log::trace!("No value for {} in the z3 model", var.name),
            }
        }
        model
    }
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for Z3Solver {
    fn check(&self, constraint: &Expr) -> SolverResult {
        if let Some(fast_path) = &self.fast_path {
            match fast_path.check(constraint) {
                SolverResult::Unknown => (),
                decided => return decided,
            }
        }

        let Some(Term::Bool(assertion)) = translate(&self.context, constraint) else {
            log::debug!("Cannot translate {constraint} for z3");
            return SolverResult::Unknown;
        };
        let solver = z3::Solver::new(&self.context);
        solver.assert(&assertion);

        match solver.check() {
            SatResult::Sat => match solver.get_model() {
                Some(found) => SolverResult::Sat(self.model(constraint.vars(), &found)),
                None => SolverResult::Unknown,
            },
            SatResult::Unsat => SolverResult::Unsat,
            SatResult::Unknown => {
                log::debug!("z3 could not decide {constraint}");
                SolverResult::Unknown
            }
        }
    }
}

/// A translated expression, sorted by its type.
enum Term<'ctx> {
    Bool(Bool<'ctx>),
    Bits(BV<'ctx>),
}

/// Translates the value `expr` into z3.
///
/// Returns [`None`] if the expression is not a value or is ill-typed.
fn translate<'ctx>(ctx: &'ctx Context, expr: &Expr) -> Option<Term<'ctx>> {
    let term = match expr.kind() {
        ExprKind::Bool(b) => Term::Bool(Bool::from_bool(ctx, *b)),
        ExprKind::Constant { value, width } => Term::Bits(constant(ctx, *value, *width)?),
        ExprKind::Var(var) => match var.ty {
            Type::Bool => Term::Bool(Bool::new_const(ctx, var.name.as_ref())),
            Type::Bits(0) => return None,
            Type::Bits(width) => {
                Term::Bits(BV::new_const(ctx, var.name.as_ref(), u32::from(width)))
            }
        },
        ExprKind::Unary { op, operand } => match (op, translate(ctx, operand)?) {
            (UnaryOp::Not, Term::Bool(b)) => Term::Bool(b.not()),
            (UnaryOp::Complement, Term::Bits(bv)) => Term::Bits(bv.bvnot()),
            (UnaryOp::Negate, Term::Bits(bv)) => Term::Bits(bv.bvneg()),
            _ => return None,
        },
        ExprKind::Binary { op, left, right } => {
            binary(ctx, *op, translate(ctx, left)?, translate(ctx, right)?)?
        }
        ExprKind::Mux {
            cond,
            then,
            otherwise,
        } => {
            let Term::Bool(cond) = translate(ctx, cond)? else {
                return None;
            };
            match (translate(ctx, then)?, translate(ctx, otherwise)?) {
                (Term::Bool(t), Term::Bool(o)) => Term::Bool(cond.ite(&t, &o)),
                (Term::Bits(t), Term::Bits(o)) if t.get_size() == o.get_size() => {
                    Term::Bits(cond.ite(&t, &o))
                }
                _ => return None,
            }
        }
        ExprKind::Path(_) | ExprKind::Hole(_) | ExprKind::Call(_) => return None,
    };
    Some(term)
}

fn binary<'ctx>(
    ctx: &'ctx Context,
    op: BinaryOp,
    left: Term<'ctx>,
    right: Term<'ctx>,
) -> Option<Term<'ctx>> {
    use BinaryOp as B;
    let term = match (left, right) {
        (Term::Bool(l), Term::Bool(r)) => Term::Bool(match op {
            B::And | B::BitAnd => Bool::and(ctx, &[&l, &r]),
            B::Or | B::BitOr => Bool::or(ctx, &[&l, &r]),
            B::Eq => l._eq(&r),
            B::Ne | B::BitXor => l._eq(&r).not(),
            _ => return None,
        }),
        (Term::Bits(l), Term::Bits(r)) => {
            let result_width = l.get_size();
            let width = result_width.max(r.get_size());
            let l = widen(l, width);
            let r = widen(r, width);
            let bits = |bv: BV<'ctx>| Term::Bits(narrow(bv, width, result_width));
            match op {
                B::Add => bits(l.bvadd(&r)),
                B::Sub => bits(l.bvsub(&r)),
                B::Mul => bits(l.bvmul(&r)),
                B::BitAnd => bits(l.bvand(&r)),
                B::BitOr => bits(l.bvor(&r)),
                B::BitXor => bits(l.bvxor(&r)),
                B::Shl => bits(l.bvshl(&r)),
                B::Shr => bits(l.bvlshr(&r)),
                B::Eq => Term::Bool(l._eq(&r)),
                B::Ne => Term::Bool(l._eq(&r).not()),
                B::Lt => Term::Bool(l.bvult(&r)),
                B::Le => Term::Bool(l.bvule(&r)),
                B::Gt => Term::Bool(l.bvugt(&r)),
                B::Ge => Term::Bool(l.bvuge(&r)),
                B::And | B::Or => return None,
            }
        }
        _ => return None,
    };
    Some(term)
}

/// Builds a bit-vector constant of up to 128 bits from 64-bit halves.
#[allow(clippy::cast_possible_truncation)]
fn constant(ctx: &Context, value: u128, width: u16) -> Option<BV<'_>> {
    let width = u32::from(width);
    if width == 0 {
        return None;
    }
    let low = BV::from_u64(ctx, value as u64, 64);
    if width <= 64 {
        return Some(narrow(low, 64, width));
    }
    let high = BV::from_u64(ctx, (value >> 64) as u64, 64);
    Some(narrow(high.concat(&low), 128, width))
}

fn widen(bv: BV<'_>, width: u32) -> BV<'_> {
    let size = bv.get_size();
    if size < width {
        bv.zero_ext(width - size)
    } else {
        bv
    }
}

fn narrow(bv: BV<'_>, from: u32, to: u32) -> BV<'_> {
    if to < from {
        bv.extract(to - 1, 0)
    } else {
        bv
    }
}

/// Reads the value of the `width`-bit `bv` in `model`, 64 bits at a time.
fn bits_value<'ctx>(model: &z3::Model<'ctx>, bv: &BV<'ctx>, width: u16) -> Option<Value> {
    let size = u32::from(width);
    let low = model.eval(&bv.extract(size.min(64) - 1, 0), true)?.as_u64()?;
    let high = if size > 64 {
        model.eval(&bv.extract(size - 1, 64), true)?.as_u64()?
    } else {
        0
    };
    Some(Value::bits((u128::from(high) << 64) | u128::from(low), width))
}

#[cfg(test)]
mod test {
    use crate::{
        ir::expr::{BinaryOp, Expr, Type, Value},
        solver::{eval::satisfies, smt::Z3Solver, Solver, SolverResult},
    };

    #[test]
    fn decides_comparisons_on_wide_fields() -> anyhow::Result<()> {
        let solver = Z3Solver::new();
        let x = Expr::var("x", Type::Bits(32));
        let above = Expr::binary(BinaryOp::Gt, x.clone(), Expr::constant(5, 32));

        let SolverResult::Sat(model) = solver.check(&above) else {
            anyhow::bail!("Constraint should be satisfiable");
        };
        assert!(satisfies(&above, &model));

        let both = Expr::and(above.clone(), Expr::not(above));
        assert!(solver.check(&both).is_unsat());

        Ok(())
    }

    #[test]
    fn wraps_arithmetic_at_the_operand_width() -> anyhow::Result<()> {
        let solver = Z3Solver::new().without_fast_path();
        let x = Expr::var("x", Type::Bits(16));
        let constraint = Expr::eq(
            Expr::binary(BinaryOp::Add, x, Expr::constant(1, 16)),
            Expr::constant(0, 16),
        );

        let SolverResult::Sat(model) = solver.check(&constraint) else {
            anyhow::bail!("Constraint should be satisfiable");
        };
        assert_eq!(model.get("x"), Some(Value::bits(0xffff, 16)));

        Ok(())
    }

    #[test]
    fn reads_back_values_wider_than_64_bits() -> anyhow::Result<()> {
        let solver = Z3Solver::new().without_fast_path();
        let x = Expr::var("x", Type::Bits(96));
        let big = (1u128 << 80) + 7;
        let constraint = Expr::eq(x, Expr::constant(big, 96));

        let SolverResult::Sat(model) = solver.check(&constraint) else {
            anyhow::bail!("Constraint should be satisfiable");
        };
        assert_eq!(model.get("x"), Some(Value::bits(big, 96)));

        Ok(())
    }

    #[test]
    fn matches_constant_folding_of_oversized_shifts() {
        let solver = Z3Solver::new().without_fast_path();
        let x = Expr::var("x", Type::Bits(8));
        let shifted = Expr::binary(BinaryOp::Shl, x, Expr::constant(9, 8));
        let nonzero = Expr::binary(BinaryOp::Ne, shifted, Expr::constant(0, 8));
        assert!(solver.check(&nonzero).is_unsat());
    }

    #[test]
    fn untranslatable_constraints_are_unknown() {
        let solver = Z3Solver::new().without_fast_path();
        let read = Expr::eq(Expr::path("hdr.h.f"), Expr::constant(1, 8));
        assert_eq!(solver.check(&read), SolverResult::Unknown);
    }
}
