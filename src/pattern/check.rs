//! Type checking of the conditions attached to pattern atoms.

use crate::{
    error::pattern::Error,
    ir::{
        expr::{BinaryOp, Expr, ExprKind, Type, UnaryOp},
        Program,
    },
};

/// The declared variables that pattern conditions may read.
pub trait VariableTypes {
    /// Gets the type of the variable at the fully-qualified `path`, if it is
    /// declared.
    fn type_of(&self, path: &str) -> Option<Type>;
}

/// Header fields and validity bits only.
impl VariableTypes for Program {
    fn type_of(&self, path: &str) -> Option<Type> {
        self.field_type(path)
    }
}

/// Checks that `condition` is a well-typed boolean over declared variables.
///
/// # Errors
///
/// Returns [`Err`] if the condition reads an undeclared variable, applies an
/// operator to operands of the wrong types, or is not boolean.
pub fn check_condition(condition: &Expr, vars: &dyn VariableTypes) -> Result<(), Error> {
    match type_of(condition, vars)? {
        Type::Bool => Ok(()),
        Type::Bits(_) => Err(Error::NonBooleanCondition {
            condition: condition.to_string(),
        }),
    }
}

fn type_of(expr: &Expr, vars: &dyn VariableTypes) -> Result<Type, Error> {
    use BinaryOp as B;
    let ill_typed = || Error::IllTypedCondition {
        expr: expr.to_string(),
    };

    match expr.kind() {
        ExprKind::Bool(_) => Ok(Type::Bool),
        ExprKind::Constant { width, .. } => Ok(Type::Bits(*width)),
        ExprKind::Var(var) => Ok(var.ty),
        ExprKind::Path(path) => vars.type_of(path).ok_or_else(|| Error::UnknownVariable {
            name: path.to_string(),
        }),
        ExprKind::Unary { op, operand } => match (op, type_of(operand, vars)?) {
            (UnaryOp::Not, Type::Bool) => Ok(Type::Bool),
            (UnaryOp::Complement | UnaryOp::Negate, ty @ Type::Bits(_)) => Ok(ty),
            _ => Err(ill_typed()),
        },
        ExprKind::Binary { op, left, right } => {
            let left = type_of(left, vars)?;
            let right = type_of(right, vars)?;
            match (op, left, right) {
                (B::And | B::Or | B::BitAnd | B::BitOr | B::BitXor, Type::Bool, Type::Bool) => {
                    Ok(Type::Bool)
                }
                (B::Eq | B::Ne, _, _) if left == right => Ok(Type::Bool),
                (B::Lt | B::Le | B::Gt | B::Ge, Type::Bits(_), _) if left == right => {
                    Ok(Type::Bool)
                }
                (B::Shl | B::Shr, Type::Bits(_), Type::Bits(_)) => Ok(left),
                (B::Add | B::Sub | B::Mul | B::BitAnd | B::BitOr | B::BitXor, Type::Bits(_), _)
                    if left == right =>
                {
                    Ok(left)
                }
                _ => Err(ill_typed()),
            }
        }
        ExprKind::Mux {
            cond,
            then,
            otherwise,
        } => {
            let then = type_of(then, vars)?;
            match (type_of(cond, vars)?, type_of(otherwise, vars)?) {
                (Type::Bool, otherwise) if otherwise == then => Ok(then),
                _ => Err(ill_typed()),
            }
        }
        ExprKind::Hole(_) | ExprKind::Call(_) => Err(ill_typed()),
    }
}
