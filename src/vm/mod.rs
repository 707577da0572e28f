//! This module contains the small-step symbolic evaluator.
//!
//! The [`Evaluator`] is a pure transition function over
//! [`ExecutionState`]s. Each call to [`Evaluator::step`] advances a state by
//! one reduction and returns the resulting [`Branch`]es, each guarded by a
//! condition that excludes all of its siblings. The evaluator never decides
//! which state to step next; that is left to whoever drives it.

pub mod continuation;
pub mod env;
mod expression;
mod parser;
pub mod state;
mod statement;
mod table;
pub mod target;

use std::rc::Rc;

use derivative::Derivative;
use im::Vector;

use crate::{
    constant::{
        DEFAULT_MAXIMUM_STACK_DEPTH,
        DEFAULT_PERMISSIVE_ERRORS_ENABLED,
        DEFAULT_SOLVE_EAGERLY,
        VALIDITY_FIELD,
    },
    error::{
        located::Locatable,
        execution::{Error, LocatedError, Result},
    },
    ir::{
        expr::{BinaryOp, Expr, ExprKind, Type},
        statement::{Statement, StatementKind},
        ActionDecl,
        ControlDecl,
        NodeId,
        NodeKind,
        ParserDecl,
        ParserState,
        Program,
        TableDecl,
    },
    pattern::VariableTypes,
    solver::{Solver, SolverResult},
    vm::{
        continuation::{is_done, Cmd, Continuation, SignalKind, StackFrame},
        state::{ExecutionState, TraceEvent},
        target::{MetadataInit, TargetInfo},
    },
};

/// A successor of a stepped state.
#[derive(Clone, Debug, PartialEq)]
pub struct Branch {
    /// The condition under which this successor is taken.
    ///
    /// It has already been conjoined into the successor's path constraint.
    pub constraint: Expr,

    pub next_state: ExecutionState,
}

/// Why a would-be successor was not returned as a branch.
#[derive(Clone, Debug, PartialEq)]
pub enum DiscardReason {
    /// The solver could not decide whether the branch is feasible.
    SolverUnknown { constraint: Expr },

    /// The state reached a construct that the evaluator does not implement,
    /// and the evaluator is in permissive mode.
    Unimplemented(LocatedError),
}

/// A would-be successor that was dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct Discarded {
    pub reason: DiscardReason,

    /// The state the branch would have continued with.
    pub state: ExecutionState,
}

/// The full result of stepping a state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepOutcome {
    pub branches:  Vec<Branch>,
    pub discarded: Vec<Discarded>,
}

/// A successor before its feasibility has been checked.
pub(crate) type Candidate = (Expr, ExecutionState);

/// Wraps `state` as a successor that is always taken.
pub(crate) fn certain(state: ExecutionState) -> Candidate {
    (Expr::bool(true), state)
}

/// Puts the value that a head command reduced to back in place.
///
/// Values of commands run for their effects are discarded.
pub(crate) fn resume(state: &mut ExecutionState, slot: &Cmd, value: Expr) {
    match slot {
        Cmd::Return(_) => state.body.push_front(Cmd::Return(value)),
        Cmd::Expr(_) if !value.is_value() => state.body.push_front(Cmd::Expr(value)),
        Cmd::Expr(_) | Cmd::Stmt(_) => (),
    }
}

/// The small-step symbolic evaluator for a program.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Evaluator {
    #[derivative(Debug = "ignore")]
    program: Rc<Program>,

    config: Config,

    solver: Rc<dyn Solver>,
}

impl Evaluator {
    /// Creates an evaluator for `program`, consulting `solver` to decide the
    /// feasibility of new branches.
    #[must_use]
    pub fn new(program: Rc<Program>, config: Config, solver: Rc<dyn Solver>) -> Self {
        Self {
            program,
            config,
            solver,
        }
    }

    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gets the type of the variable at the fully-qualified `path`, if the
    /// program or the target declares one.
    ///
    /// Besides header fields and validity bits this knows the target's
    /// metadata, its parser error variable, and action parameters qualified
    /// by the name of their action.
    #[must_use]
    pub fn variable_type(&self, path: &str) -> Option<Type> {
        if let Some(ty) = self.program.field_type(path) {
            return Some(ty);
        }
        let target = &self.config.target;
        if let Some(var) = target.metadata.iter().find(|v| v.path.as_ref() == path) {
            return Some(var.ty);
        }
        if target.parser_error.as_deref() == Some(path) {
            return Some(Type::Bool);
        }
        let (action, param) = path.rsplit_once('.')?;
        self.program.nodes().find_map(|(_, node)| match &node.kind {
            NodeKind::Action(decl) if node.name.as_ref() == action => decl
                .params
                .iter()
                .find(|p| p.name.as_ref() == param)
                .map(|p| p.ty),
            _ => None,
        })
    }

    /// Creates the state at the program's entry.
    ///
    /// The state applies each block of the entry pipeline in order. Header
    /// instances start out invalid and target metadata starts out as the
    /// target describes.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the program has no entry, or if its entry is not a
    /// pipeline.
    pub fn initial_state(&self) -> Result<ExecutionState> {
        let entry = self
            .program
            .entry()
            .ok_or_else(|| Error::MissingEntry.locate(0))?;
        let NodeKind::Pipeline(pipeline) = &self.node(entry)?.kind else {
            return Err(Error::UnexpectedNodeKind {
                node:     entry.index(),
                expected: "pipeline",
            }
            .locate(entry.index()));
        };

        let mut state = ExecutionState::new(
            pipeline
                .blocks
                .iter()
                .map(|block| Cmd::Stmt(Statement::new(StatementKind::Apply(*block)))),
        );
        for header in self.program.headers() {
            state.env.insert(format!("{header}.{VALIDITY_FIELD}"), Expr::bool(false));
        }
        let target = &self.config.target;
        for var in &target.metadata {
            let value = match (var.init, var.ty) {
                (MetadataInit::Zero, Type::Bool) => Expr::bool(false),
                (MetadataInit::Zero, Type::Bits(width)) => Expr::constant(0, width),
                (MetadataInit::Symbolic, ty) => Expr::var(var.path.clone(), ty),
            };
            state.env.insert(var.path.clone(), value);
        }
        if let Some(path) = &target.parser_error {
            state.env.insert(path.clone(), Expr::bool(false));
        }
        self.enter(&mut state, entry);

        Ok(state)
    }

    /// Advances `state` by a single reduction.
    ///
    /// Returns no branches for a terminal state. Branches are returned in
    /// source order, and their constraints are pairwise mutually exclusive.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the state cannot be advanced, except for
    /// unimplemented constructs in permissive mode, which drop the state
    /// instead.
    pub fn step(&self, state: &ExecutionState) -> Result<Vec<Branch>> {
        self.step_with_diagnostics(state).map(|outcome| outcome.branches)
    }

    /// Advances `state` by a single reduction, also reporting the successors
    /// that were dropped along the way.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] under the same conditions as [`Self::step`].
    pub fn step_with_diagnostics(&self, state: &ExecutionState) -> Result<StepOutcome> {
        let mut outcome = StepOutcome::default();
        let candidates = match self.successors(state) {
            Ok(candidates) => candidates,
            Err(error) if self.config.permissive_errors && error.payload.is_unimplemented() => {
                log::debug!("Dropping state that hit an unimplemented construct: {error}");
                outcome.discarded.push(Discarded {
                    reason: DiscardReason::Unimplemented(error),
                    state:  state.clone(),
                });
                return Ok(outcome);
            }
            Err(error) => return Err(error),
        };

        for (constraint, next_state) in candidates {
            self.admit(constraint, next_state, &mut outcome);
        }

        Ok(outcome)
    }

    /// Constrains `state` further by the boolean `condition`.
    ///
    /// Program variables in the condition are read from the state. Returns
    /// [`None`] if the condition cannot hold in the state.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the condition reads a variable that is not defined.
    pub fn assume(
        &self,
        state: &ExecutionState,
        condition: &Expr,
    ) -> Result<Option<ExecutionState>> {
        let mut next = state.clone();
        let mut failure = None;
        let resolved = condition.transform(&mut |expr| match expr.kind() {
            ExprKind::Path(path) => match self.read(&mut next, path) {
                Ok(value) => Some(value),
                Err(error) => {
                    failure.get_or_insert(error);
                    Some(expr.clone())
                }
            },
            _ => None,
        });
        if let Some(error) = failure {
            return Err(error);
        }

        let path_constraint = Expr::and(next.path_constraint.clone(), resolved);
        if path_constraint.is_false() {
            return Ok(None);
        }
        if self.config.solve_eagerly && !self.solver.check(&path_constraint).is_sat() {
            return Ok(None);
        }
        next.path_constraint = path_constraint;
        Ok(Some(next))
    }

    /// Computes the unchecked successors of `state`.
    fn successors(&self, state: &ExecutionState) -> Result<Vec<Candidate>> {
        if is_done(&state.body) {
            if state.stack.is_empty() {
                return Ok(vec![]);
            }
            return self.pop_frame(state.clone()).map(|s| vec![certain(s)]);
        }

        let mut state = state.clone();
        let Some(head) = state.body.pop_front() else {
            return Ok(vec![]);
        };
        log::trace!("Stepping {head} at depth {}", state.stack.len());

        // A value returned with work still after it is discarded.
        if let Cmd::Return(value) = &head {
            if value.is_value() {
                return Ok(vec![certain(state)]);
            }
        }

        if let Some(candidates) = Self::short_circuit(&state, &head) {
            return Ok(candidates);
        }

        let operands = head.operands();
        if let Some(index) = operands.iter().position(|o| !o.is_value()) {
            return self
                .decompose(state, &head, index, operands[index].clone())
                .map(|s| vec![certain(s)]);
        }

        match &head {
            Cmd::Stmt(stmt) => self.execute(state, stmt),
            Cmd::Expr(expr) | Cmd::Return(expr) => self.reduce(state, &head, expr),
        }
    }

    /// Forks on the condition of a conditional or a boolean connective at the
    /// head, continuing each side with only the operand it selects.
    ///
    /// Applies once the condition is a value and one of the
    /// remaining operands makes a call, so that the effects of an operand
    /// happen only on paths that evaluate it. Other operands are reduced in
    /// place without forking.
    fn short_circuit(state: &ExecutionState, head: &Cmd) -> Option<Vec<Candidate>> {
        let (Cmd::Expr(expr) | Cmd::Return(expr)) = head else {
            return None;
        };
        let (cond, taken, skipped) = match expr.kind() {
            ExprKind::Mux {
                cond,
                then,
                otherwise,
            } => (cond, then.clone(), otherwise.clone()),
            ExprKind::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => (left, right.clone(), Expr::bool(false)),
            ExprKind::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => (left, Expr::bool(true), right.clone()),
            _ => return None,
        };
        if !cond.is_value() || !(taken.has_call() || skipped.has_call()) {
            return None;
        }

        let continue_with = |condition: Expr, operand: Expr| {
            let mut next = state.clone();
            Self::record_branch(&mut next, state.last_node, &condition);
            next.body.push_front(match head {
                Cmd::Return(_) => Cmd::Return(operand),
                _ => Cmd::Expr(operand),
            });
            (condition, next)
        };
        Some(vec![
            continue_with(cond.clone(), taken),
            continue_with(Expr::not(cond.clone()), skipped),
        ])
    }

    /// Suspends `head` in a new frame to evaluate its operand at `index`.
    fn decompose(
        &self,
        mut state: ExecutionState,
        head: &Cmd,
        index: usize,
        operand: Expr,
    ) -> Result<ExecutionState> {
        let hole = state.fresh_hole();
        let mut body = std::mem::take(&mut state.body);
        body.push_front(head.with_operand(index, Expr::hole(hole)));
        let frame = StackFrame::new(
            Continuation::awaiting(hole, body),
            state.namespaces.clone(),
        );
        self.push_frame(&mut state, frame)?;
        state.body = Vector::unit(Cmd::Return(operand));
        Ok(state)
    }

    /// Resumes the topmost frame with the value of the finished body.
    fn pop_frame(&self, mut state: ExecutionState) -> Result<ExecutionState> {
        let value = state.result().cloned();
        let Some(frame) = state.stack.pop_back() else {
            return Ok(state);
        };
        let body = frame
            .continuation
            .apply(value.as_ref())
            .ok_or_else(|| Error::MissingReturnValue.locate(self.location(&state)))?;
        state.body = body;
        state.namespaces = frame.namespaces;
        Ok(state)
    }

    pub(crate) fn push_frame(&self, state: &mut ExecutionState, frame: StackFrame) -> Result<()> {
        let requested = state.stack.len() + 1;
        if requested > self.config.maximum_stack_depth {
            return Err(Error::StackDepthExceeded { requested }.locate(self.location(state)));
        }
        state.stack.push_back(frame);
        Ok(())
    }

    /// Transfers control to the innermost handler for `kind`.
    ///
    /// If no frame handles the signal, the state becomes terminal.
    pub(crate) fn raise(&self, mut state: ExecutionState, kind: SignalKind) -> ExecutionState {
        let handler = state
            .stack
            .iter()
            .rposition(|frame| frame.handles(kind))
            .and_then(|ix| {
                let frame = state.stack.get(ix)?.clone();
                let handler = frame.handlers.get(&kind)?.clone();
                Some((ix, frame.namespaces, handler))
            });

        match handler {
            Some((ix, namespaces, handler)) => {
                state.stack.truncate(ix);
                state.body = handler.body;
                state.namespaces = namespaces;
            }
            None => {
                log::trace!("Signal {kind:?} ended execution");
                state.body = Vector::new();
                state.stack = Vector::new();
                state.record(TraceEvent::Signal { kind });
            }
        }

        state
    }

    /// Turns a candidate into a branch, unless its path constraint is
    /// infeasible or undecidable.
    ///
    /// An undecidable candidate is not taken. It is reported in
    /// `outcome.discarded` with a diagnostic appended to its trace.
    fn admit(&self, constraint: Expr, mut state: ExecutionState, outcome: &mut StepOutcome) {
        if constraint.is_true() {
            outcome.branches.push(Branch {
                constraint,
                next_state: state,
            });
            return;
        }

        let path_constraint = Expr::and(state.path_constraint.clone(), constraint.clone());
        if path_constraint.is_false() {
            log::debug!("Pruned branch under {constraint}");
            return;
        }
        if self.config.solve_eagerly {
            match self.solver.check(&path_constraint) {
                SolverResult::Sat(_) => (),
                SolverResult::Unsat => {
                    log::debug!("Pruned infeasible branch under {constraint}");
                    return;
                }
                SolverResult::Unknown => {
                    log::warn!("Discarding branch the solver could not decide under {constraint}");
                    state.path_constraint = path_constraint;
                    state.record(TraceEvent::Diagnostic {
                        message: format!("Solver could not decide {constraint}"),
                    });
                    outcome.discarded.push(Discarded {
                        reason: DiscardReason::SolverUnknown { constraint },
                        state,
                    });
                    return;
                }
            }
        }

        state.path_constraint = path_constraint;
        outcome.branches.push(Branch {
            constraint,
            next_state: state,
        });
    }

    /// Records that `state` entered the construct `node`.
    pub(crate) fn enter(&self, state: &mut ExecutionState, node: NodeId) {
        let Some(decl) = self.program.node(node) else {
            return;
        };
        state.record(TraceEvent::Node {
            node,
            name: decl.name.to_string(),
        });
        state.last_node = Some(node);
        if self.config.target.is_coverable(&decl.kind) {
            state.covered.insert(node);
        }
    }

    /// Records a branch taken at `node` under `condition`.
    pub(crate) fn record_branch(state: &mut ExecutionState, node: Option<NodeId>, condition: &Expr) {
        state.record(TraceEvent::Branch {
            node,
            condition: condition.to_string(),
        });
    }

    /// Reads the variable at `path`, resolving it in the state's scope.
    ///
    /// Fields of header instances that were never written hold an arbitrary
    /// value, which is fixed on first read.
    pub(crate) fn read(&self, state: &mut ExecutionState, path: &str) -> Result<Expr> {
        let path = state.namespaces.resolve_path(path);
        self.read_resolved(state, &path)
    }

    pub(crate) fn read_resolved(&self, state: &mut ExecutionState, path: &str) -> Result<Expr> {
        if let Some(value) = state.env.get(path) {
            return Ok(value);
        }
        let Some(ty) = self.program.field_type(path) else {
            return Err(Error::UndefinedVariable {
                name: path.to_string(),
            }
            .locate(self.location(state)));
        };
        let value = state.fresh_var(path, ty);
        state.env.insert(path, value.clone());
        Ok(value)
    }

    /// Gets the location to attach to errors raised while stepping `state`.
    pub(crate) fn location(&self, state: &ExecutionState) -> u32 {
        state.last_node.map_or(0, NodeId::index)
    }

    fn node(&self, id: NodeId) -> Result<&crate::ir::Node> {
        self.program
            .node(id)
            .ok_or_else(|| Error::NoSuchNode { node: id.index() }.locate(id.index()))
    }

    fn unexpected<T>(id: NodeId, expected: &'static str) -> Result<T> {
        Err(Error::UnexpectedNodeKind {
            node: id.index(),
            expected,
        }
        .locate(id.index()))
    }

    pub(crate) fn table(&self, id: NodeId) -> Result<&TableDecl> {
        match &self.node(id)?.kind {
            NodeKind::Table(decl) => Ok(decl),
            _ => Self::unexpected(id, "table"),
        }
    }

    pub(crate) fn action(&self, id: NodeId) -> Result<&ActionDecl> {
        match &self.node(id)?.kind {
            NodeKind::Action(decl) => Ok(decl),
            _ => Self::unexpected(id, "action"),
        }
    }

    pub(crate) fn control(&self, id: NodeId) -> Result<&ControlDecl> {
        match &self.node(id)?.kind {
            NodeKind::Control(decl) => Ok(decl),
            _ => Self::unexpected(id, "control"),
        }
    }

    pub(crate) fn parser(&self, id: NodeId) -> Result<&ParserDecl> {
        match &self.node(id)?.kind {
            NodeKind::Parser(decl) => Ok(decl),
            _ => Self::unexpected(id, "parser"),
        }
    }

    pub(crate) fn parser_state(&self, id: NodeId) -> Result<&ParserState> {
        match &self.node(id)?.kind {
            NodeKind::ParserState(decl) => Ok(decl),
            _ => Self::unexpected(id, "parser state"),
        }
    }
}

impl VariableTypes for Evaluator {
    fn type_of(&self, path: &str) -> Option<Type> {
        self.variable_type(path)
    }
}

/// The configuration of the evaluator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Whether a state that reaches an unimplemented construct is dropped
    /// rather than failing the step.
    ///
    /// Defaults to [`DEFAULT_PERMISSIVE_ERRORS_ENABLED`].
    pub permissive_errors: bool,

    /// Whether the path constraint of every new branch is checked with the
    /// solver as the branch is created.
    ///
    /// When this is disabled, only branches whose constraints fold to `false`
    /// are pruned, and the caller must check satisfiability before relying
    /// on a state.
    ///
    /// Defaults to [`DEFAULT_SOLVE_EAGERLY`].
    pub solve_eagerly: bool,

    /// The maximum number of frames on the continuation stack.
    ///
    /// Defaults to [`DEFAULT_MAXIMUM_STACK_DEPTH`].
    pub maximum_stack_depth: usize,

    pub target: TargetInfo,
}

impl Config {
    /// Sets the permissive errors configuration parameter to `value`.
    #[must_use]
    pub fn with_permissive_errors(mut self, value: bool) -> Self {
        self.permissive_errors = value;
        self
    }

    /// Sets the `solve_eagerly` config parameter to `value`.
    #[must_use]
    pub fn with_solve_eagerly(mut self, value: bool) -> Self {
        self.solve_eagerly = value;
        self
    }

    /// Sets the `maximum_stack_depth` config parameter to `value`.
    #[must_use]
    pub fn with_maximum_stack_depth(mut self, value: usize) -> Self {
        self.maximum_stack_depth = value;
        self
    }

    /// Sets the target information to `target`.
    #[must_use]
    pub fn with_target(mut self, target: TargetInfo) -> Self {
        self.target = target;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        let permissive_errors = DEFAULT_PERMISSIVE_ERRORS_ENABLED;
        let solve_eagerly = DEFAULT_SOLVE_EAGERLY;
        let maximum_stack_depth = DEFAULT_MAXIMUM_STACK_DEPTH;
        let target = TargetInfo::default();
        Self {
            permissive_errors,
            solve_eagerly,
            maximum_stack_depth,
            target,
        }
    }
}

#[cfg(test)]
mod test {
    use std::rc::Rc;

    use crate::{
        error::execution::Error,
        ir::{
            builder::ProgramBuilder,
            expr::{BinaryOp, Call, Expr, ExprKind, Type},
            statement::{Statement, StatementKind},
            Param,
        },
        solver::{Solver, SolverResult, Z3Solver},
        vm::{
            continuation::Cmd,
            state::{ExecutionState, TraceEvent},
            target::{MetadataInit, MetadataVar, TargetInfo},
            Config,
            DiscardReason,
            Evaluator,
        },
    };

    /// A solver that can decide nothing.
    #[derive(Debug)]
    struct Undecided;

    impl Solver for Undecided {
        fn check(&self, _: &Expr) -> SolverResult {
            SolverResult::Unknown
        }
    }

    fn evaluator(config: Config) -> Evaluator {
        let mut builder = ProgramBuilder::new();
        builder.header_type("h_t", &[("f", 8)]);
        builder.header("hdr.h", "h_t");
        Evaluator::new(
            Rc::new(builder.build()),
            config,
            Rc::new(Z3Solver::new()),
        )
    }

    #[test]
    fn terminal_states_have_no_successors() -> anyhow::Result<()> {
        let evaluator = evaluator(Config::default());
        let state = ExecutionState::for_expression(Expr::constant(3, 8));
        assert!(evaluator.step(&state)?.is_empty());

        Ok(())
    }

    #[test]
    fn decomposes_the_leftmost_unreduced_operand() -> anyhow::Result<()> {
        let evaluator = evaluator(Config::default());
        let sum = Expr::binary(BinaryOp::Add, Expr::constant(42, 8), Expr::path("hdr.h.f"));
        let state = ExecutionState::for_expression(sum);

        let branches = evaluator.step(&state)?;
        assert_eq!(branches.len(), 1);
        let next = &branches[0].next_state;
        assert!(branches[0].constraint.is_true());
        assert_eq!(next.body().head(), Some(&Cmd::Return(Expr::path("hdr.h.f"))));
        assert_eq!(next.stack().len(), 1);

        Ok(())
    }

    #[test]
    fn reading_an_unwritten_field_fixes_a_symbolic_value() -> anyhow::Result<()> {
        let evaluator = evaluator(Config::default());
        let state = ExecutionState::for_expression(Expr::path("hdr.h.f"));

        let branches = evaluator.step(&state)?;
        let next = &branches[0].next_state;
        let Some(Cmd::Return(value)) = next.body().head() else {
            anyhow::bail!("Expected a returned value");
        };
        assert!(matches!(value.kind(), ExprKind::Var(v) if v.ty == Type::Bits(8)));
        assert_eq!(next.env().get("hdr.h.f").as_ref(), Some(value));

        Ok(())
    }

    #[test]
    fn undefined_variables_are_errors() {
        let evaluator = evaluator(Config::default());
        let state = ExecutionState::for_expression(Expr::path("meta.missing"));

        let result = evaluator.step(&state);
        assert!(matches!(
            result.map_err(|e| e.payload),
            Err(Error::UndefinedVariable { name }) if name == "meta.missing"
        ));
    }

    #[test]
    fn permissive_mode_drops_unimplemented_constructs() -> anyhow::Result<()> {
        let call = Expr::call(Call::Extern {
            name: "hash".into(),
            args: vec![].into(),
        });
        let state = ExecutionState::new([Cmd::Expr(call)]);

        let strict = evaluator(Config::default());
        assert!(strict.step(&state).is_err());

        let permissive = evaluator(Config::default().with_permissive_errors(true));
        let outcome = permissive.step_with_diagnostics(&state)?;
        assert!(outcome.branches.is_empty());
        assert_eq!(outcome.discarded.len(), 1);

        Ok(())
    }

    #[test]
    fn enforces_the_maximum_stack_depth() {
        let evaluator = evaluator(Config::default().with_maximum_stack_depth(0));
        let sum = Expr::binary(BinaryOp::Add, Expr::constant(1, 8), Expr::path("hdr.h.f"));

        let result = evaluator.step(&ExecutionState::for_expression(sum));
        assert!(matches!(
            result.map_err(|e| e.payload),
            Err(Error::StackDepthExceeded { requested: 1 })
        ));
    }

    #[test]
    fn assumptions_read_program_variables() -> anyhow::Result<()> {
        let evaluator = evaluator(Config::default());
        let mut state = ExecutionState::new([Cmd::Stmt(Statement::new(StatementKind::Empty))]);
        state.set_var("meta.x", Expr::constant(4, 8));

        let holds = Expr::eq(Expr::path("meta.x"), Expr::constant(4, 8));
        assert!(evaluator.assume(&state, &holds)?.is_some());

        let fails = Expr::eq(Expr::path("meta.x"), Expr::constant(5, 8));
        assert!(evaluator.assume(&state, &fails)?.is_none());

        Ok(())
    }

    #[test]
    fn undecided_branches_are_reported_with_a_diagnostic() -> anyhow::Result<()> {
        let mut builder = ProgramBuilder::new();
        builder.header_type("h_t", &[("f", 32)]);
        builder.header("hdr.h", "h_t");
        let evaluator =
            Evaluator::new(Rc::new(builder.build()), Config::default(), Rc::new(Undecided));

        let above = Expr::binary(
            BinaryOp::Gt,
            Expr::var("hdr.h.f", Type::Bits(32)),
            Expr::constant(5, 32),
        );
        let branch = Statement::new(StatementKind::If {
            cond:      above,
            then:      Statement::new(StatementKind::Empty),
            otherwise: None,
        });
        let state = ExecutionState::new([Cmd::Stmt(branch)]);

        let outcome = evaluator.step_with_diagnostics(&state)?;
        assert!(outcome.branches.is_empty());
        assert_eq!(outcome.discarded.len(), 2);
        for discarded in &outcome.discarded {
            assert!(matches!(discarded.reason, DiscardReason::SolverUnknown { .. }));
            assert!(matches!(
                discarded.state.trace().last(),
                Some(TraceEvent::Diagnostic { .. })
            ));
        }

        Ok(())
    }

    #[test]
    fn returned_values_followed_by_more_work_are_dropped() -> anyhow::Result<()> {
        let evaluator = evaluator(Config::default());
        let set_valid = Expr::call(Call::SetValid {
            header: "hdr.h".into(),
        });
        let state = ExecutionState::new([Cmd::Return(Expr::constant(1, 8)), Cmd::Expr(set_valid)]);
        assert!(!state.is_terminal());
        assert_eq!(state.result(), None);

        let branches = evaluator.step(&state)?;
        assert_eq!(branches.len(), 1);
        let next = branches[0].next_state.clone();
        assert_eq!(next.body().len(), 1);

        let next = evaluator.step(&next)?.remove(0).next_state;
        assert!(next.is_terminal());
        assert_eq!(next.env().get("hdr.h.$valid"), Some(Expr::bool(true)));

        Ok(())
    }

    #[test]
    fn untaken_arms_have_no_effects() -> anyhow::Result<()> {
        let evaluator = evaluator(Config::default());
        let set_valid = Expr::call(Call::SetValid {
            header: "hdr.h".into(),
        });
        let b = Expr::var("b", Type::Bool);
        let mux = Expr::mux(b.clone(), set_valid, Expr::bool(false));
        let state = ExecutionState::new([Cmd::Expr(mux)]);

        let branches = evaluator.step(&state)?;
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].constraint, b);
        assert_eq!(branches[1].constraint, Expr::not(b));

        let taken = evaluator.step(&branches[0].next_state)?.remove(0).next_state;
        assert!(taken.is_terminal());
        assert_eq!(taken.env().get("hdr.h.$valid"), Some(Expr::bool(true)));

        let skipped = evaluator.step(&branches[1].next_state)?.remove(0).next_state;
        assert!(skipped.is_terminal());
        assert_eq!(skipped.env().get("hdr.h.$valid"), None);

        Ok(())
    }

    #[test]
    fn connectives_skip_their_right_operand() -> anyhow::Result<()> {
        let evaluator = evaluator(Config::default());
        let set_valid = Expr::call(Call::SetValid {
            header: "hdr.h".into(),
        });
        let b = Expr::var("b", Type::Bool);

        // Whether the header ends up valid, and the value of the connective,
        // when `b` holds and when it does not.
        let cases = [
            (Expr::and(b.clone(), set_valid.clone()), [(true, true), (false, false)]),
            (Expr::or(b.clone(), set_valid), [(false, true), (true, true)]),
        ];
        for (expr, expected) in cases {
            let branches = evaluator.step(&ExecutionState::for_expression(expr))?;
            assert_eq!(branches.len(), 2);

            for (branch, (valid, value)) in branches.iter().zip(expected) {
                let mut state = branch.next_state.clone();
                while !state.is_terminal() {
                    state = evaluator.step(&state)?.remove(0).next_state;
                }
                let is_valid = state.env().get("hdr.h.$valid") == Some(Expr::bool(true));
                assert_eq!(is_valid, valid);
                assert_eq!(state.result(), Some(&Expr::bool(value)));
            }
        }

        Ok(())
    }

    #[test]
    fn pure_conditionals_stay_symbolic() -> anyhow::Result<()> {
        let evaluator = evaluator(Config::default());
        let mux = Expr::mux(
            Expr::var("b", Type::Bool),
            Expr::path("hdr.h.f"),
            Expr::constant(0, 8),
        );
        let mut state = ExecutionState::for_expression(mux);
        while !state.is_terminal() {
            let mut branches = evaluator.step(&state)?;
            assert_eq!(branches.len(), 1);
            state = branches.remove(0).next_state;
        }
        assert!(matches!(state.result().map(Expr::kind), Some(ExprKind::Mux { .. })));

        Ok(())
    }

    #[test]
    fn knows_the_types_of_declared_variables() {
        let target = TargetInfo::default()
            .with_metadata(MetadataVar::new("meta.port", Type::Bits(9), MetadataInit::Zero))
            .with_parser_error("meta.parser_error");
        let mut builder = ProgramBuilder::new();
        builder.header_type("h_t", &[("f", 8)]);
        builder.header("hdr.h", "h_t");
        builder.action("ingress.forward", vec![Param::new("port", Type::Bits(9))], vec![]);
        let evaluator = Evaluator::new(
            Rc::new(builder.build()),
            Config::default().with_target(target),
            Rc::new(Z3Solver::new()),
        );

        assert_eq!(evaluator.variable_type("hdr.h.f"), Some(Type::Bits(8)));
        assert_eq!(evaluator.variable_type("hdr.h.$valid"), Some(Type::Bool));
        assert_eq!(evaluator.variable_type("meta.port"), Some(Type::Bits(9)));
        assert_eq!(evaluator.variable_type("meta.parser_error"), Some(Type::Bool));
        assert_eq!(evaluator.variable_type("ingress.forward.port"), Some(Type::Bits(9)));
        assert_eq!(evaluator.variable_type("ingress.forward.speed"), None);
        assert_eq!(evaluator.variable_type("meta.missing"), None);
    }
}
