//! This module contains the expression representation shared by the program
//! IR and by the symbolic values that the evaluator builds from it.
//!
//! # Values
//!
//! An expression is a _value_ (see [`Expr::is_value`]) when it cannot be
//! reduced any further by the evaluator. Constants and symbolic variables are
//! values, as are pure operators whose operands are all values. Reads of
//! program variables, continuation holes and calls are never values.
//!
//! # Folding
//!
//! All of the smart constructors on [`Expr`] fold constant operands, so a
//! value built from constants is always a single constant.

use std::{collections::BTreeSet, fmt, rc::Rc};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{constant::MAXIMUM_BIT_WIDTH, ir::NodeId};

/// The type of names used throughout the IR.
pub type Name = Rc<str>;

/// The types of values that expressions can take.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Type {
    /// A boolean.
    Bool,

    /// An unsigned bit-vector of the given width.
    Bits(u16),
}

impl Type {
    /// Gets the number of distinct values inhabiting the type, saturating at
    /// [`u128::MAX`].
    #[must_use]
    pub fn domain_size(self) -> u128 {
        match self {
            Self::Bool => 2,
            Self::Bits(width) if width >= MAXIMUM_BIT_WIDTH => u128::MAX,
            Self::Bits(width) => 1u128 << width,
        }
    }

    /// Gets the `index`th value of the type, in ascending order.
    #[must_use]
    pub fn nth_value(self, index: u128) -> Value {
        match self {
            Self::Bool => Value::Bool(index != 0),
            Self::Bits(width) => Value::bits(index, width),
        }
    }
}

/// Computes the mask for a bit-vector of `width` bits.
#[must_use]
pub fn mask(width: u16) -> u128 {
    if width >= MAXIMUM_BIT_WIDTH {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

/// A symbolic variable, standing for an unknown value of its type.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SymbolicVar {
    pub name: Name,
    pub ty:   Type,
}

impl SymbolicVar {
    /// Constructs a new symbolic variable called `name` of type `ty`.
    #[must_use]
    pub fn new(name: impl Into<Name>, ty: Type) -> Self {
        let name = name.into();
        Self { name, ty }
    }
}

/// The parameter of a continuation, standing for the value that the suspended
/// sub-computation will produce.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Hole(pub u32);

/// A concrete value.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Value {
    Bool(bool),
    Bits { value: u128, width: u16 },
}

impl Value {
    /// Constructs a bit-vector value, truncating `value` to `width` bits.
    #[must_use]
    pub fn bits(value: u128, width: u16) -> Self {
        Self::Bits {
            value: value & mask(width),
            width,
        }
    }

    /// Applies the unary operator `op` to the value.
    #[must_use]
    pub fn unary(self, op: UnaryOp) -> Option<Self> {
        match (op, self) {
            (UnaryOp::Not, Self::Bool(b)) => Some(Self::Bool(!b)),
            (UnaryOp::Complement, Self::Bits { value, width }) => Some(Self::bits(!value, width)),
            (UnaryOp::Negate, Self::Bits { value, width }) => {
                Some(Self::bits(value.wrapping_neg(), width))
            }
            _ => None,
        }
    }

    /// Applies the binary operator `op` to the value and `other`.
    ///
    /// Returns [`None`] if the operator is not defined on the operand types.
    #[must_use]
    pub fn binary(self, op: BinaryOp, other: Self) -> Option<Self> {
        use BinaryOp as B;
        match (self, other) {
            (Self::Bool(l), Self::Bool(r)) => match op {
                B::And | B::BitAnd => Some(Self::Bool(l && r)),
                B::Or | B::BitOr => Some(Self::Bool(l || r)),
                B::Eq => Some(Self::Bool(l == r)),
                B::Ne | B::BitXor => Some(Self::Bool(l != r)),
                _ => None,
            },
            (Self::Bits { value: l, width }, Self::Bits { value: r, .. }) => {
                let bits = |v: u128| Some(Self::bits(v, width));
                let shift = |amount: u128, f: fn(u128, u32) -> u128| match u32::try_from(amount) {
                    Ok(amount) if amount < u32::from(width) => bits(f(l, amount)),
                    _ => bits(0),
                };
                match op {
                    B::Add => bits(l.wrapping_add(r)),
                    B::Sub => bits(l.wrapping_sub(r)),
                    B::Mul => bits(l.wrapping_mul(r)),
                    B::BitAnd => bits(l & r),
                    B::BitOr => bits(l | r),
                    B::BitXor => bits(l ^ r),
                    B::Shl => shift(r, |v, s| v << s),
                    B::Shr => shift(r, |v, s| v >> s),
                    B::Eq => Some(Self::Bool(l == r)),
                    B::Ne => Some(Self::Bool(l != r)),
                    B::Lt => Some(Self::Bool(l < r)),
                    B::Le => Some(Self::Bool(l <= r)),
                    B::Gt => Some(Self::Bool(l > r)),
                    B::Ge => Some(Self::Bool(l >= r)),
                    B::And | B::Or => None,
                }
            }
            _ => None,
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(b) => Expr::bool(b),
            Value::Bits { value, width } => Expr::constant(value, width),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Bits { value, width } => write!(f, "{width}w{value}"),
        }
    }
}

/// Unary operators.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum UnaryOp {
    /// Logical negation of a boolean.
    Not,

    /// Bitwise complement of a bit-vector.
    Complement,

    /// Two's complement negation of a bit-vector.
    Negate,
}

/// Binary operators.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// Gets the operator's textual representation.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

/// Which of the results of applying a table an apply expression produces.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TableResult {
    /// Whether the lookup hit.
    Hit,

    /// Whether the lookup missed.
    Miss,

    /// The action that ran, as a constant identifying the action's node.
    ActionRun,
}

/// Method and extern calls.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Call {
    /// Applies a table.
    TableApply { table: NodeId, result: TableResult },

    /// A table application whose key expressions have been pulled out of the
    /// table declaration so that they can be evaluated.
    TableMatch {
        table:  NodeId,
        keys:   Rc<[Expr]>,
        result: TableResult,
    },

    /// Invokes an action directly.
    Action { action: NodeId, args: Rc<[Expr]> },

    /// Extracts a header instance from the input packet.
    Extract { header: Name },

    /// Emits a header instance into the output packet.
    Emit { header: Name },

    /// Checks the validity of a header instance.
    IsValid { header: Name },

    /// Marks a header instance as valid.
    SetValid { header: Name },

    /// Marks a header instance as invalid.
    SetInvalid { header: Name },

    /// Reads an element of a register array.
    RegisterRead { register: Name, index: Expr, ty: Type },

    /// Writes an element of a register array.
    RegisterWrite { register: Name, index: Expr, value: Expr },

    /// Any other extern, which the evaluator does not model.
    Extern { name: Name, args: Rc<[Expr]> },
}

impl Call {
    /// Gets the operands that must be evaluated before the call can be made,
    /// in evaluation order.
    #[must_use]
    pub fn operands(&self) -> Vec<Expr> {
        match self {
            Self::TableMatch { keys: exprs, .. }
            | Self::Action { args: exprs, .. }
            | Self::Extern { args: exprs, .. } => exprs.to_vec(),
            Self::RegisterRead { index, .. } => vec![index.clone()],
            Self::RegisterWrite { index, value, .. } => vec![index.clone(), value.clone()],
            Self::TableApply { .. }
            | Self::Extract { .. }
            | Self::Emit { .. }
            | Self::IsValid { .. }
            | Self::SetValid { .. }
            | Self::SetInvalid { .. } => vec![],
        }
    }

    /// Rebuilds the call with its operands replaced by `operands`, which must
    /// be in the order produced by [`Self::operands`].
    #[must_use]
    pub fn with_operands(&self, mut operands: Vec<Expr>) -> Self {
        match self {
            Self::TableMatch { table, result, .. } => Self::TableMatch {
                table:  *table,
                keys:   operands.into(),
                result: *result,
            },
            Self::Action { action, .. } => Self::Action {
                action: *action,
                args:   operands.into(),
            },
            Self::Extern { name, .. } => Self::Extern {
                name: name.clone(),
                args: operands.into(),
            },
            Self::RegisterRead { register, ty, index } => Self::RegisterRead {
                register: register.clone(),
                index:    operands.pop().unwrap_or_else(|| index.clone()),
                ty:       *ty,
            },
            Self::RegisterWrite {
                register,
                index,
                value,
            } => {
                let new_value = operands.pop().unwrap_or_else(|| value.clone());
                let new_index = operands.pop().unwrap_or_else(|| index.clone());
                Self::RegisterWrite {
                    register: register.clone(),
                    index:    new_index,
                    value:    new_value,
                }
            }
            _ => self.clone(),
        }
    }

    /// Gets a short textual name for the kind of call.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::TableApply { .. } | Self::TableMatch { .. } => "apply".into(),
            Self::Action { .. } => "action".into(),
            Self::Extract { .. } => "extract".into(),
            Self::Emit { .. } => "emit".into(),
            Self::IsValid { .. } => "isValid".into(),
            Self::SetValid { .. } => "setValid".into(),
            Self::SetInvalid { .. } => "setInvalid".into(),
            Self::RegisterRead { .. } => "read".into(),
            Self::RegisterWrite { .. } => "write".into(),
            Self::Extern { name, .. } => format!("extern {name}"),
        }
    }
}

/// The structure of an expression.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum ExprKind {
    /// A boolean literal.
    Bool(bool),

    /// A bit-vector literal.
    Constant { value: u128, width: u16 },

    /// A read of the program variable at the dotted `Path`.
    Path(Name),

    /// A symbolic variable.
    Var(SymbolicVar),

    /// The parameter of a continuation.
    Hole(Hole),

    Unary { op: UnaryOp, operand: Expr },

    Binary { op: BinaryOp, left: Expr, right: Expr },

    /// A conditional value.
    Mux { cond: Expr, then: Expr, otherwise: Expr },

    Call(Call),
}

/// A reference-counted expression tree.
///
/// Cloning an expression is O(1) and shares the tree.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Expr(Rc<ExprKind>);

impl Expr {
    /// Wraps `kind` into an expression without folding it.
    #[must_use]
    pub fn new(kind: ExprKind) -> Self {
        Self(Rc::new(kind))
    }

    #[must_use]
    pub fn bool(value: bool) -> Self {
        Self::new(ExprKind::Bool(value))
    }

    /// Constructs a bit-vector constant, truncating `value` to `width` bits.
    #[must_use]
    pub fn constant(value: u128, width: u16) -> Self {
        Self::new(ExprKind::Constant {
            value: value & mask(width),
            width,
        })
    }

    #[must_use]
    pub fn path(path: impl Into<Name>) -> Self {
        Self::new(ExprKind::Path(path.into()))
    }

    #[must_use]
    pub fn var(name: impl Into<Name>, ty: Type) -> Self {
        Self::new(ExprKind::Var(SymbolicVar::new(name, ty)))
    }

    #[must_use]
    pub fn hole(hole: Hole) -> Self {
        Self::new(ExprKind::Hole(hole))
    }

    #[must_use]
    pub fn call(call: Call) -> Self {
        Self::new(ExprKind::Call(call))
    }

    /// Constructs the application of `op` to `operand`, folding where
    /// possible.
    #[must_use]
    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        if let Some(folded) = operand.as_value().and_then(|v| v.unary(op)) {
            return folded.into();
        }
        if op == UnaryOp::Not {
            if let ExprKind::Unary {
                op: UnaryOp::Not,
                operand: inner,
            } = operand.kind()
            {
                return inner.clone();
            }
        }
        Self::new(ExprKind::Unary { op, operand })
    }

    /// Constructs the application of `op` to `left` and `right`, folding where
    /// possible.
    #[must_use]
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        if let (Some(l), Some(r)) = (left.as_value(), right.as_value()) {
            if let Some(folded) = l.binary(op, r) {
                return folded.into();
            }
        }
        match op {
            BinaryOp::And => match (left.as_bool(), right.as_bool()) {
                (Some(false), _) | (_, Some(false)) => return Self::bool(false),
                (Some(true), _) => return right,
                (_, Some(true)) => return left,
                _ => (),
            },
            BinaryOp::Or => match (left.as_bool(), right.as_bool()) {
                (Some(true), _) | (_, Some(true)) => return Self::bool(true),
                (Some(false), _) => return right,
                (_, Some(false)) => return left,
                _ => (),
            },
            BinaryOp::Eq if left == right && left.is_value() => return Self::bool(true),
            BinaryOp::Ne if left == right && left.is_value() => return Self::bool(false),
            _ => (),
        }
        Self::new(ExprKind::Binary { op, left, right })
    }

    /// Constructs a conditional value, folding where possible.
    #[must_use]
    pub fn mux(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        match cond.as_bool() {
            Some(true) => then,
            Some(false) => otherwise,
            None if then == otherwise => then,
            None => Self::new(ExprKind::Mux {
                cond,
                then,
                otherwise,
            }),
        }
    }

    #[must_use]
    pub fn not(operand: Expr) -> Self {
        Self::unary(UnaryOp::Not, operand)
    }

    #[must_use]
    pub fn and(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::And, left, right)
    }

    #[must_use]
    pub fn or(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Or, left, right)
    }

    #[must_use]
    pub fn eq(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Eq, left, right)
    }

    /// Constructs the conjunction of all of `exprs`, which is `true` when
    /// there are none.
    #[must_use]
    pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Self {
        exprs.into_iter().fold(Self::bool(true), Self::and)
    }

    /// Constructs the disjunction of all of `exprs`, which is `false` when
    /// there are none.
    #[must_use]
    pub fn any(exprs: impl IntoIterator<Item = Expr>) -> Self {
        exprs.into_iter().fold(Self::bool(false), Self::or)
    }

    /// Gets the structure of the expression.
    #[must_use]
    pub fn kind(&self) -> &ExprKind {
        &self.0
    }

    /// Gets the expression as a concrete value, if it is a literal.
    #[must_use]
    pub fn as_value(&self) -> Option<Value> {
        match self.kind() {
            ExprKind::Bool(b) => Some(Value::Bool(*b)),
            ExprKind::Constant { value, width } => Some(Value::Bits {
                value: *value,
                width: *width,
            }),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self.kind() {
            ExprKind::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_true(&self) -> bool {
        self.as_bool() == Some(true)
    }

    #[must_use]
    pub fn is_false(&self) -> bool {
        self.as_bool() == Some(false)
    }

    /// Checks if the expression is fully reduced.
    #[must_use]
    pub fn is_value(&self) -> bool {
        match self.kind() {
            ExprKind::Bool(_) | ExprKind::Constant { .. } | ExprKind::Var(_) => true,
            ExprKind::Unary { .. } | ExprKind::Binary { .. } | ExprKind::Mux { .. } => {
                self.operands().iter().all(Expr::is_value)
            }
            ExprKind::Path(_) | ExprKind::Hole(_) | ExprKind::Call(_) => false,
        }
    }

    /// Gets the operands of the expression that are evaluated before the
    /// expression itself, in left-to-right evaluation order.
    #[must_use]
    pub fn operands(&self) -> Vec<Expr> {
        match self.kind() {
            ExprKind::Unary { operand, .. } => vec![operand.clone()],
            ExprKind::Binary { left, right, .. } => vec![left.clone(), right.clone()],
            ExprKind::Mux {
                cond,
                then,
                otherwise,
            } => vec![cond.clone(), then.clone(), otherwise.clone()],
            ExprKind::Call(call) => call.operands(),
            _ => vec![],
        }
    }

    /// Rebuilds the expression with its operands replaced by `operands`,
    /// folding the result.
    #[must_use]
    pub fn with_operands(&self, operands: Vec<Expr>) -> Self {
        if let ExprKind::Call(call) = self.kind() {
            return Self::call(call.with_operands(operands));
        }
        let mut operands = operands.into_iter();
        let mut next = |current: &Expr| operands.next().unwrap_or_else(|| current.clone());
        match self.kind() {
            ExprKind::Unary { op, operand } => Self::unary(*op, next(operand)),
            ExprKind::Binary { op, left, right } => {
                let left = next(left);
                let right = next(right);
                Self::binary(*op, left, right)
            }
            ExprKind::Mux {
                cond,
                then,
                otherwise,
            } => {
                let cond = next(cond);
                let then = next(then);
                let otherwise = next(otherwise);
                Self::mux(cond, then, otherwise)
            }
            _ => self.clone(),
        }
    }

    /// Rebuilds the expression with the operand at `index` replaced by
    /// `operand`.
    #[must_use]
    pub fn with_operand(&self, index: usize, operand: Expr) -> Self {
        let mut operands = self.operands();
        if let Some(slot) = operands.get_mut(index) {
            *slot = operand;
        }
        self.with_operands(operands)
    }

    /// Rebuilds the expression bottom-up, replacing every sub-expression for
    /// which `f` returns [`Some`] by the returned expression.
    ///
    /// Replacements are not themselves traversed.
    #[must_use]
    pub fn transform(&self, f: &mut impl FnMut(&Expr) -> Option<Expr>) -> Self {
        if let Some(replacement) = f(self) {
            return replacement;
        }
        let operands = self.operands();
        if operands.is_empty() {
            return self.clone();
        }
        let new_operands = operands.iter().map(|o| o.transform(f)).collect_vec();
        if new_operands == operands {
            self.clone()
        } else {
            self.with_operands(new_operands)
        }
    }

    /// Replaces every occurrence of `hole` by `value`.
    #[must_use]
    pub fn substitute_hole(&self, hole: Hole, value: &Expr) -> Self {
        self.transform(&mut |e| match e.kind() {
            ExprKind::Hole(h) if *h == hole => Some(value.clone()),
            _ => None,
        })
    }

    /// Collects the symbolic variables occurring in the expression into `out`.
    pub fn collect_vars(&self, out: &mut BTreeSet<SymbolicVar>) {
        match self.kind() {
            ExprKind::Var(var) => {
                out.insert(var.clone());
            }
            _ => self.operands().iter().for_each(|o| o.collect_vars(out)),
        }
    }

    /// Gets the symbolic variables occurring in the expression, in order.
    #[must_use]
    pub fn vars(&self) -> BTreeSet<SymbolicVar> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }

    /// Checks if evaluating the expression makes a method or extern call.
    #[must_use]
    pub fn has_call(&self) -> bool {
        matches!(self.kind(), ExprKind::Call(_)) || self.operands().iter().any(Expr::has_call)
    }

    /// Checks if the expression contains a continuation hole.
    #[must_use]
    pub fn has_hole(&self) -> bool {
        matches!(self.kind(), ExprKind::Hole(_)) || self.operands().iter().any(Expr::has_hole)
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Self::bool(value)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Bool(b) => write!(f, "{b}"),
            ExprKind::Constant { value, width } => write!(f, "{width}w{value}"),
            ExprKind::Path(path) => write!(f, "{path}"),
            ExprKind::Var(var) => write!(f, "{}", var.name),
            ExprKind::Hole(Hole(h)) => write!(f, "?{h}"),
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Not => write!(f, "!{operand}"),
                UnaryOp::Complement => write!(f, "~{operand}"),
                UnaryOp::Negate => write!(f, "-{operand}"),
            },
            ExprKind::Binary { op, left, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            ExprKind::Mux {
                cond,
                then,
                otherwise,
            } => write!(f, "({cond} ? {then} : {otherwise})"),
            ExprKind::Call(call) => {
                let args = call.operands().iter().join(", ");
                write!(f, "{}({args})", call.label())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::ir::expr::{BinaryOp, Call, Expr, ExprKind, Hole, Type, Value};

    #[test]
    fn folds_constant_arithmetic() {
        let sum = Expr::binary(
            BinaryOp::Add,
            Expr::constant(250, 8),
            Expr::constant(10, 8),
        );
        assert_eq!(sum, Expr::constant(4, 8));
    }

    #[test]
    fn keeps_symbolic_operations_as_values() {
        let sum = Expr::binary(
            BinaryOp::Add,
            Expr::constant(42, 8),
            Expr::var("x", Type::Bits(8)),
        );
        assert!(sum.is_value());
        assert!(matches!(sum.kind(), ExprKind::Binary { .. }));
    }

    #[test]
    fn reads_and_holes_are_not_values() {
        assert!(!Expr::path("hdr.h.f").is_value());
        assert!(!Expr::hole(Hole(0)).is_value());
        let sum = Expr::binary(BinaryOp::Add, Expr::constant(1, 8), Expr::path("x"));
        assert!(!sum.is_value());
    }

    #[test]
    fn short_circuits_boolean_connectives() {
        let x = Expr::var("b", Type::Bool);
        assert_eq!(Expr::and(Expr::bool(true), x.clone()), x);
        assert!(Expr::and(x.clone(), Expr::bool(false)).is_false());
        assert!(Expr::or(x.clone(), Expr::bool(true)).is_true());
        assert_eq!(Expr::not(Expr::not(x.clone())), x);
    }

    #[test]
    fn substituting_a_hole_folds_the_result() {
        let hole = Hole(3);
        let expr = Expr::binary(BinaryOp::Add, Expr::constant(1, 8), Expr::hole(hole));
        let result = expr.substitute_hole(hole, &Expr::constant(2, 8));
        assert_eq!(result, Expr::constant(3, 8));
    }

    #[test]
    fn shifts_past_the_width_produce_zero() {
        let value = Value::bits(0xff, 8).binary(BinaryOp::Shl, Value::bits(9, 8));
        assert_eq!(value, Some(Value::bits(0, 8)));
    }

    #[test]
    fn finds_nested_calls() {
        let call = Expr::call(Call::SetValid {
            header: "hdr.h".into(),
        });
        let mux = Expr::mux(Expr::var("b", Type::Bool), call, Expr::bool(false));
        assert!(mux.has_call());
        assert!(!Expr::and(Expr::var("b", Type::Bool), Expr::path("x")).has_call());
    }

    #[test]
    fn displays_expressions() {
        let expr = Expr::binary(BinaryOp::Add, Expr::constant(42, 8), Expr::path("hdr.h.f"));
        assert_eq!(expr.to_string(), "(8w42 + hdr.h.f)");
    }
}
