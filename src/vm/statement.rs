//! Execution of statements whose operands are all values.

use std::rc::Rc;

use im::Vector;

use crate::{
    constant::ACTION_RUN_WIDTH,
    error::{
        located::Locatable,
        execution::{Error, Result},
    },
    ir::{
        expr::{Call, Expr, TableResult, Value},
        statement::{Statement, StatementKind, SwitchCase, SwitchLabel},
        NodeId,
        NodeKind,
    },
    vm::{
        certain,
        continuation::{Cmd, Continuation, SignalKind, StackFrame},
        state::ExecutionState,
        target::{MatchConstruct, NoMatchPolicy},
        Candidate,
        Evaluator,
    },
};

/// Schedules `stmt` to run before the rest of the body.
fn prepend(state: &mut ExecutionState, stmt: Statement) {
    state.body.push_front(Cmd::Stmt(stmt));
}

impl Evaluator {
    pub(super) fn execute(
        &self,
        mut state: ExecutionState,
        stmt: &Statement,
    ) -> Result<Vec<Candidate>> {
        if let Some(id) = stmt.id() {
            self.enter(&mut state, id);
        }

        match stmt.kind() {
            StatementKind::Empty => Ok(vec![certain(state)]),
            StatementKind::Block(stmts) => {
                for inner in stmts.iter().rev() {
                    prepend(&mut state, inner.clone());
                }
                Ok(vec![certain(state)])
            }
            StatementKind::Assign { target, value } => {
                let target = state.namespaces.resolve_path(target);
                state.env.insert(target, value.clone());
                Ok(vec![certain(state)])
            }
            StatementKind::Call(expr) => {
                state.body.push_front(Cmd::Expr(expr.clone()));
                Ok(vec![certain(state)])
            }
            StatementKind::If {
                cond,
                then,
                otherwise,
            } => self.branch_if(state, stmt.id(), cond, then, otherwise.as_ref()),
            StatementKind::Switch { subject, cases } => {
                Ok(self.branch_switch(&state, stmt.id(), subject, cases))
            }
            StatementKind::Exit => Ok(vec![certain(self.raise(state, SignalKind::Exit))]),
            StatementKind::Return(_) => Ok(vec![certain(self.raise(state, SignalKind::Return))]),
            StatementKind::Apply(block) => self.apply_block(state, *block).map(|s| vec![certain(s)]),
            StatementKind::EnterState(parser_state) => self
                .enter_state(state, *parser_state)
                .map(|s| vec![certain(s)]),
            StatementKind::Transition {
                state: parser_state,
                keys,
            } => self.transition(state, *parser_state, keys),
        }
    }

    fn branch_if(
        &self,
        mut state: ExecutionState,
        node: Option<NodeId>,
        cond: &Expr,
        then: &Statement,
        otherwise: Option<&Statement>,
    ) -> Result<Vec<Candidate>> {
        match cond.as_value() {
            Some(Value::Bool(true)) => {
                prepend(&mut state, then.clone());
                Ok(vec![certain(state)])
            }
            Some(Value::Bool(false)) => {
                if let Some(otherwise) = otherwise {
                    prepend(&mut state, otherwise.clone());
                }
                Ok(vec![certain(state)])
            }
            Some(Value::Bits { .. }) => Err(Error::TypeMismatch {
                expected: "boolean",
                found:    cond.to_string(),
            }
            .locate(self.location(&state))),
            None => {
                let mut taken = state.clone();
                Self::record_branch(&mut taken, node, cond);
                prepend(&mut taken, then.clone());

                let negated = Expr::not(cond.clone());
                let mut skipped = state;
                Self::record_branch(&mut skipped, node, &negated);
                if let Some(otherwise) = otherwise {
                    prepend(&mut skipped, otherwise.clone());
                }

                Ok(vec![(cond.clone(), taken), (negated, skipped)])
            }
        }
    }

    /// Branches on the first case of a switch whose label matches `subject`.
    ///
    /// Cases without a body fall through to the next case that has one.
    fn branch_switch(
        &self,
        state: &ExecutionState,
        node: Option<NodeId>,
        subject: &Expr,
        cases: &Rc<[SwitchCase]>,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::with_capacity(cases.len() + 1);
        let mut earlier = Expr::bool(false);
        let mut has_default = false;

        for (ix, case) in cases.iter().enumerate() {
            let matched = match &case.label {
                SwitchLabel::Action(action) => Expr::eq(
                    subject.clone(),
                    Expr::constant(u128::from(action.index()), ACTION_RUN_WIDTH),
                ),
                SwitchLabel::Value(value) => Expr::eq(subject.clone(), value.clone()),
                SwitchLabel::Default => Expr::bool(true),
            };
            let condition = Expr::and(matched.clone(), Expr::not(earlier.clone()));
            earlier = Expr::or(earlier, matched);

            let mut next = state.clone();
            Self::record_branch(&mut next, node, &condition);
            if let Some(body) = cases[ix..].iter().find_map(|c| c.body.clone()) {
                prepend(&mut next, body);
            }
            candidates.push((condition, next));

            if case.label == SwitchLabel::Default {
                has_default = true;
                break;
            }
        }

        let policy = self.config.target.no_match_policy(MatchConstruct::Switch);
        if !has_default && policy == NoMatchPolicy::Branch {
            let condition = Expr::not(earlier);
            let mut next = state.clone();
            Self::record_branch(&mut next, node, &condition);
            candidates.push((condition, next));
        }

        candidates
    }

    /// Runs the table, control, parser or pipeline at `block`.
    fn apply_block(&self, mut state: ExecutionState, block: NodeId) -> Result<ExecutionState> {
        let kind = &self
            .program
            .node(block)
            .ok_or_else(|| Error::NoSuchNode { node: block.index() }.locate(block.index()))?
            .kind;

        if let NodeKind::Table(_) = kind {
            state.body.push_front(Cmd::Expr(Expr::call(Call::TableApply {
                table:  block,
                result: TableResult::Hit,
            })));
            return Ok(state);
        }

        let rest = std::mem::take(&mut state.body);
        let frame = StackFrame::new(Continuation::resume(rest.clone()), state.namespaces.clone());
        match kind {
            NodeKind::Control(_) => {
                let decl = self.control(block)?;
                let frame = frame.with_handler(SignalKind::Return, Continuation::resume(rest));
                self.push_frame(&mut state, frame)?;
                state.body = decl.body.iter().cloned().map(Cmd::Stmt).collect();
            }
            NodeKind::Parser(_) => {
                let decl = self.parser(block)?;
                let frame = match &self.config.target.parser_error {
                    Some(path) => {
                        let mut handler = rest;
                        handler.push_front(Cmd::Stmt(Statement::new(StatementKind::Assign {
                            target: path.clone(),
                            value:  Expr::bool(true),
                        })));
                        frame.with_handler(SignalKind::Reject, Continuation::resume(handler))
                    }
                    None => frame,
                };
                self.push_frame(&mut state, frame)?;
                state.body = Vector::unit(Cmd::Stmt(Statement::new(
                    StatementKind::EnterState(decl.start),
                )));
            }
            NodeKind::Pipeline(pipeline) => {
                self.push_frame(&mut state, frame)?;
                state.body = pipeline
                    .blocks
                    .iter()
                    .map(|b| Cmd::Stmt(Statement::new(StatementKind::Apply(*b))))
                    .collect();
            }
            _ => {
                return Err(Error::UnexpectedNodeKind {
                    node:     block.index(),
                    expected: "table, control, parser or pipeline",
                }
                .locate(block.index()))
            }
        }

        self.enter(&mut state, block);
        state.namespaces = self.program.namespace(block);
        Ok(state)
    }
}
