//! Reified computations: bodies of commands, the continuations that suspend
//! them, and the stack frames that hold those continuations.

use std::{collections::BTreeMap, fmt};

use im::Vector;
use serde::{Deserialize, Serialize};

use crate::{
    ir::{
        expr::{Expr, Hole},
        statement::Statement,
    },
    namespace::NamespaceContext,
};

/// A single unit of pending work.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Cmd {
    /// A statement to execute.
    Stmt(Statement),

    /// An expression to evaluate for its effects, discarding its value.
    Expr(Expr),

    /// An expression whose value is the result of the enclosing body.
    Return(Expr),
}

impl Cmd {
    /// Gets the sub-expressions that must be reduced before the command
    /// itself can be, in evaluation order.
    #[must_use]
    pub fn operands(&self) -> Vec<Expr> {
        match self {
            Self::Stmt(stmt) => stmt.operands(),
            Self::Expr(expr) | Self::Return(expr) => expr.operands(),
        }
    }

    /// Rebuilds the command with the operand at `index` replaced by
    /// `operand`.
    #[must_use]
    pub fn with_operand(&self, index: usize, operand: Expr) -> Self {
        match self {
            Self::Stmt(stmt) => Self::Stmt(stmt.with_operand(index, operand)),
            Self::Expr(expr) => Self::Expr(expr.with_operand(index, operand)),
            Self::Return(expr) => Self::Return(expr.with_operand(index, operand)),
        }
    }

    /// Replaces `hole` by `value` within the command.
    #[must_use]
    pub fn substitute_hole(&self, hole: Hole, value: &Expr) -> Self {
        match self {
            Self::Stmt(stmt) => Self::Stmt(stmt.substitute_hole(hole, value)),
            Self::Expr(expr) => Self::Expr(expr.substitute_hole(hole, value)),
            Self::Return(expr) => Self::Return(expr.substitute_hole(hole, value)),
        }
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stmt(stmt) => match stmt.id() {
                Some(id) => write!(f, "{} {id}", stmt.kind().label()),
                None => write!(f, "{}", stmt.kind().label()),
            },
            Self::Expr(expr) => write!(f, "{expr}"),
            Self::Return(expr) => write!(f, "return {expr}"),
        }
    }
}

/// An ordered sequence of commands.
pub type Body = Vector<Cmd>;

/// Checks whether `body` has been fully evaluated.
///
/// A body is done when it is empty, or when all that is left of it is a
/// returned value.
#[must_use]
pub fn is_done(body: &Body) -> bool {
    match body.head() {
        None => true,
        Some(Cmd::Return(value)) => body.len() == 1 && value.is_value(),
        Some(_) => false,
    }
}

/// The rest of a computation, as a function of the value of a hole.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Continuation {
    /// The hole the body is waiting on, if it expects a value.
    pub parameter: Option<Hole>,
    pub body:      Body,
}

impl Continuation {
    /// Creates a continuation that resumes with `body` without needing a
    /// value.
    #[must_use]
    pub fn resume(body: Body) -> Self {
        Self {
            parameter: None,
            body,
        }
    }

    /// Creates a continuation that resumes with `body` once `parameter` is
    /// supplied.
    #[must_use]
    pub fn awaiting(parameter: Hole, body: Body) -> Self {
        Self {
            parameter: Some(parameter),
            body,
        }
    }

    /// Supplies `value` to the continuation, producing the body to resume
    /// with.
    ///
    /// Returns [`None`] if the continuation expects a value and none was
    /// given.
    #[must_use]
    pub fn apply(&self, value: Option<&Expr>) -> Option<Body> {
        match (self.parameter, value) {
            (None, _) => Some(self.body.clone()),
            (Some(hole), Some(value)) => Some(
                self.body
                    .iter()
                    .map(|cmd| cmd.substitute_hole(hole, value))
                    .collect(),
            ),
            (Some(_), None) => None,
        }
    }
}

/// The kinds of non-local control transfer.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum SignalKind {
    /// Exits the pipeline.
    Exit,

    /// Rejects the packet from within a parser.
    Reject,

    /// Returns from the enclosing action or control.
    Return,
}

/// A suspended computation on the continuation stack.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackFrame {
    pub continuation: Continuation,

    /// The scope to restore when the frame is resumed.
    pub namespaces: NamespaceContext,

    /// Where to resume when a signal of a given kind is raised while the
    /// frame is on the stack.
    pub handlers: BTreeMap<SignalKind, Continuation>,
}

impl StackFrame {
    #[must_use]
    pub fn new(continuation: Continuation, namespaces: NamespaceContext) -> Self {
        let handlers = BTreeMap::new();
        Self {
            continuation,
            namespaces,
            handlers,
        }
    }

    /// Adds a handler for `kind` to the frame.
    #[must_use]
    pub fn with_handler(mut self, kind: SignalKind, handler: Continuation) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    #[must_use]
    pub fn handles(&self, kind: SignalKind) -> bool {
        self.handlers.contains_key(&kind)
    }
}

#[cfg(test)]
mod test {
    use im::vector;

    use crate::{
        ir::expr::{BinaryOp, Expr, Hole},
        vm::continuation::{is_done, Cmd, Continuation},
    };

    #[test]
    fn applying_substitutes_the_parameter() -> anyhow::Result<()> {
        let hole = Hole(0);
        let continuation = Continuation::awaiting(
            hole,
            vector![Cmd::Return(Expr::binary(
                BinaryOp::Add,
                Expr::constant(42, 8),
                Expr::hole(hole)
            ))],
        );

        let body = continuation
            .apply(Some(&Expr::constant(1, 8)))
            .ok_or_else(|| anyhow::anyhow!("Continuation should accept a value"))?;
        assert_eq!(body, vector![Cmd::Return(Expr::constant(43, 8))]);
        assert!(is_done(&body));

        Ok(())
    }

    #[test]
    fn awaiting_continuations_require_a_value() {
        let continuation = Continuation::awaiting(Hole(0), vector![]);
        assert!(continuation.apply(None).is_none());
    }

    #[test]
    fn unreduced_returns_are_not_done() {
        assert!(is_done(&vector![]));
        assert!(!is_done(&vector![Cmd::Return(Expr::path("x"))]));
    }

    #[test]
    fn returned_values_with_work_after_them_are_not_done() {
        let value = Cmd::Return(Expr::constant(1, 8));
        assert!(is_done(&vector![value.clone()]));
        assert!(!is_done(&vector![value, Cmd::Expr(Expr::path("x"))]));
    }
}
