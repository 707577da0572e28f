//! Statements of the program IR, along with the internal statements that the
//! evaluator uses to drive parsers.

use std::rc::Rc;

use crate::ir::{
    expr::{Expr, Hole, Name},
    NodeId,
};

/// A statement, optionally identified by the program node it was declared as.
///
/// Statements that carry an identifier are recorded in the execution trace
/// when they are stepped.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Statement {
    id:   Option<NodeId>,
    kind: Rc<StatementKind>,
}

impl Statement {
    /// Constructs an anonymous statement.
    #[must_use]
    pub fn new(kind: StatementKind) -> Self {
        Self {
            id:   None,
            kind: Rc::new(kind),
        }
    }

    /// Constructs a statement declared as the node `id`.
    #[must_use]
    pub fn with_id(id: NodeId, kind: StatementKind) -> Self {
        Self {
            id:   Some(id),
            kind: Rc::new(kind),
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<NodeId> {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> &StatementKind {
        &self.kind
    }

    /// Rebuilds the statement with a new kind, keeping its identity.
    #[must_use]
    pub fn rebuild(&self, kind: StatementKind) -> Self {
        Self {
            id:   self.id,
            kind: Rc::new(kind),
        }
    }

    /// Gets the expressions that must be reduced to values before the
    /// statement can take effect, in evaluation order.
    #[must_use]
    pub fn operands(&self) -> Vec<Expr> {
        match self.kind() {
            StatementKind::Assign { value, .. } => vec![value.clone()],
            StatementKind::If { cond, .. } => vec![cond.clone()],
            StatementKind::Switch { subject, .. } => vec![subject.clone()],
            StatementKind::Return(Some(value)) => vec![value.clone()],
            StatementKind::Transition { keys, .. } => keys.to_vec(),
            _ => vec![],
        }
    }

    /// Rebuilds the statement with the operand at `index` replaced by
    /// `operand`.
    #[must_use]
    pub fn with_operand(&self, index: usize, operand: Expr) -> Self {
        let kind = match self.kind() {
            StatementKind::Assign { target, .. } => StatementKind::Assign {
                target: target.clone(),
                value:  operand,
            },
            StatementKind::If {
                then, otherwise, ..
            } => StatementKind::If {
                cond:      operand,
                then:      then.clone(),
                otherwise: otherwise.clone(),
            },
            StatementKind::Switch { cases, .. } => StatementKind::Switch {
                subject: operand,
                cases:   cases.clone(),
            },
            StatementKind::Return(Some(_)) => StatementKind::Return(Some(operand)),
            StatementKind::Transition { state, keys } => {
                let mut keys = keys.to_vec();
                if let Some(slot) = keys.get_mut(index) {
                    *slot = operand;
                }
                StatementKind::Transition {
                    state: *state,
                    keys:  keys.into(),
                }
            }
            _ => return self.clone(),
        };
        self.rebuild(kind)
    }

    /// Replaces `hole` by `value` in the operands of the statement.
    ///
    /// Nested statements are never suspended, so only operands are visited.
    #[must_use]
    pub fn substitute_hole(&self, hole: Hole, value: &Expr) -> Self {
        self.operands()
            .into_iter()
            .enumerate()
            .filter(|(_, op)| op.has_hole())
            .fold(self.clone(), |stmt, (ix, op)| {
                stmt.with_operand(ix, op.substitute_hole(hole, value))
            })
    }
}

/// The kinds of statement.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum StatementKind {
    Empty,

    Block(Rc<[Statement]>),

    /// Assigns `value` to the variable at the dotted path `target`.
    Assign { target: Name, value: Expr },

    /// Evaluates an expression for its effects.
    Call(Expr),

    If {
        cond:      Expr,
        then:      Statement,
        otherwise: Option<Statement>,
    },

    /// Selects a case by comparing the subject against the case labels.
    ///
    /// A case without a body falls through to the next case that has one.
    Switch {
        subject: Expr,
        cases:   Rc<[SwitchCase]>,
    },

    /// Exits the pipeline.
    Exit,

    /// Returns from the enclosing action.
    Return(Option<Expr>),

    /// Applies the table or executes the control block at the node.
    Apply(NodeId),

    /// Enters a parser state.
    EnterState(NodeId),

    /// Performs the transition of a parser state once its select keys have
    /// been evaluated.
    Transition { state: NodeId, keys: Rc<[Expr]> },
}

impl StatementKind {
    /// Gets a name for the kind of statement, for diagnostics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Block(_) => "block",
            Self::Assign { .. } => "assignment",
            Self::Call(_) => "call",
            Self::If { .. } => "if",
            Self::Switch { .. } => "switch",
            Self::Exit => "exit",
            Self::Return(_) => "return",
            Self::Apply(_) => "apply",
            Self::EnterState(_) => "state entry",
            Self::Transition { .. } => "transition",
        }
    }
}

/// A case of a switch statement.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SwitchCase {
    pub label: SwitchLabel,
    pub body:  Option<Statement>,
}

/// The labels that switch cases can match on.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum SwitchLabel {
    /// Matches when the subject is the action-run result of a table and the
    /// given action ran.
    Action(NodeId),

    /// Matches when the subject equals the value.
    Value(Expr),

    Default,
}

#[cfg(test)]
mod test {
    use crate::ir::{
        expr::{BinaryOp, Expr, Hole},
        statement::{Statement, StatementKind},
    };

    #[test]
    fn substitutes_holes_in_operands_only() {
        let hole = Hole(1);
        let stmt = Statement::new(StatementKind::Assign {
            target: "meta.x".into(),
            value:  Expr::binary(BinaryOp::Add, Expr::hole(hole), Expr::constant(1, 8)),
        });
        let result = stmt.substitute_hole(hole, &Expr::constant(1, 8));
        assert_eq!(result.operands(), vec![Expr::constant(2, 8)]);
    }

    #[test]
    fn replaces_indexed_transition_keys() {
        let stmt = Statement::new(StatementKind::Transition {
            state: crate::ir::NodeId::new(0),
            keys:  vec![Expr::path("a"), Expr::path("b")].into(),
        });
        let result = stmt.with_operand(1, Expr::constant(3, 4));
        assert_eq!(result.operands(), vec![Expr::path("a"), Expr::constant(3, 4)]);
    }
}
