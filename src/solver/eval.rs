//! Concrete evaluation of symbolic values under a model.

use crate::{
    ir::expr::{Expr, ExprKind, Value},
    solver::Model,
};

/// Evaluates `expr` under `model`.
///
/// Returns [`None`] if the expression is not a value, or if an operator is
/// applied to operands of the wrong type.
#[must_use]
pub fn eval(expr: &Expr, model: &Model) -> Option<Value> {
    match expr.kind() {
        ExprKind::Bool(_) | ExprKind::Constant { .. } => expr.as_value(),
        ExprKind::Var(var) => Some(model.value_of(var)),
        ExprKind::Unary { op, operand } => eval(operand, model)?.unary(*op),
        ExprKind::Binary { op, left, right } => {
            let left = eval(left, model)?;
            let right = eval(right, model)?;
            left.binary(*op, right)
        }
        ExprKind::Mux {
            cond,
            then,
            otherwise,
        } => match eval(cond, model)? {
            Value::Bool(true) => eval(then, model),
            Value::Bool(false) => eval(otherwise, model),
            Value::Bits { .. } => None,
        },
        ExprKind::Path(_) | ExprKind::Hole(_) | ExprKind::Call(_) => None,
    }
}

/// Checks whether `model` satisfies the boolean `constraint`.
#[must_use]
pub fn satisfies(constraint: &Expr, model: &Model) -> bool {
    eval(constraint, model) == Some(Value::Bool(true))
}

#[cfg(test)]
mod test {
    use crate::{
        ir::expr::{BinaryOp, Expr, SymbolicVar, Type, Value},
        solver::{
            eval::{eval, satisfies},
            Model,
        },
    };

    #[test]
    fn evaluates_under_the_model() {
        let x = SymbolicVar::new("x", Type::Bits(8));
        let mut model = Model::new();
        model.assign(x.clone(), Value::bits(3, 8));

        let expr = Expr::binary(
            BinaryOp::Add,
            Expr::new(crate::ir::expr::ExprKind::Var(x)),
            Expr::constant(42, 8),
        );
        assert_eq!(eval(&expr, &model), Some(Value::bits(45, 8)));
    }

    #[test]
    fn reads_are_not_evaluable() {
        assert_eq!(eval(&Expr::path("hdr.h.f"), &Model::new()), None);
        assert!(!satisfies(&Expr::path("b"), &Model::new()));
    }
}
