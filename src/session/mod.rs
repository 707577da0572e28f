//! This module contains the setup pipeline that turns a program into
//! everything an exploration driver needs.
//!
//! The pipeline is a typestate: each stage is only reachable from the one
//! before it, so that a driver can never hold an evaluator whose call graph or
//! pattern failed to build.
//!
//! ```text
//! session::new(program, config, solver)
//!     .build_graph()?
//!     .compile_pattern(Some("ingress.acl; egress.rewrite"))?
//! ```

pub mod state;

use std::rc::Rc;

use crate::{
    error,
    graph::Dcg,
    ir::Program,
    pattern::ReachabilityEngine,
    session::state::State,
    solver::Solver,
    vm,
    vm::Evaluator,
};

/// Creates a new session for `program`, whose evaluator will be configured by
/// `config` and consult `solver`.
#[must_use]
pub fn new(
    program: Program,
    config: vm::Config,
    solver: Rc<dyn Solver>,
) -> Session<state::HasProgram> {
    let program = Rc::new(program);
    let state = state::HasProgram;
    Session {
        program,
        config,
        solver,
        state,
    }
}

/// The setup of a symbolic exploration of a single program.
#[derive(Clone, Debug)]
pub struct Session<S: State> {
    program: Rc<Program>,
    config:  vm::Config,
    solver:  Rc<dyn Solver>,
    state:   S,
}

/// Operations available in all states.
impl<S: State> Session<S> {
    /// Gets a reference to the program being explored.
    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    #[must_use]
    pub fn config(&self) -> &vm::Config {
        &self.config
    }

    /// Gets a reference to the current state of the session.
    #[must_use]
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Consumes the session, returning its current state.
    #[must_use]
    pub fn into_state(self) -> S {
        self.state
    }

    /// Moves the session into the state `NS`, created by applying `transform`
    /// to the current state.
    fn map_state<NS: State>(self, transform: impl FnOnce(S) -> NS) -> Session<NS> {
        let state = transform(self.state);
        Session {
            program: self.program,
            config: self.config,
            solver: self.solver,
            state,
        }
    }
}

/// Operations available on a newly-created session.
impl Session<state::HasProgram> {
    /// Performs every step of the setup, compiling `pattern` if it is given.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if any step of the setup fails.
    pub fn prepare(self, pattern: Option<&str>) -> error::Result<Session<state::Ready>> {
        self.build_graph()?.compile_pattern(pattern)
    }

    /// Builds the directed call graph of the program.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the program has no entry or refers to nodes that do
    /// not exist.
    pub fn build_graph(self) -> error::Result<Session<state::GraphBuilt>> {
        let dcg = Dcg::build(&self.program)?;
        Ok(self.map_state(|_| state::GraphBuilt { dcg }))
    }
}

/// Operations available on a session whose call graph has been built.
impl Session<state::GraphBuilt> {
    /// Creates the evaluator, compiles `pattern` against the call graph and
    /// the variables the evaluator knows about, if it is given, and creates
    /// the initial execution state.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the pattern does not compile, or if the program's
    /// entry cannot be executed.
    pub fn compile_pattern(self, pattern: Option<&str>) -> error::Result<Session<state::Ready>> {
        let evaluator = Evaluator::new(
            self.program.clone(),
            self.config.clone(),
            self.solver.clone(),
        );
        let engine = pattern
            .map(|p| ReachabilityEngine::compile(p, &self.state.dcg, &evaluator))
            .transpose()?;
        let initial_state = evaluator.initial_state()?;

        Ok(self.map_state(|old_state| state::Ready {
            evaluator,
            dcg: old_state.dcg,
            engine,
            initial_state,
        }))
    }
}

/// Operations available on a session that is ready for exploration.
impl Session<state::Ready> {
    #[must_use]
    pub fn evaluator(&self) -> &Evaluator {
        &self.state.evaluator
    }

    #[must_use]
    pub fn dcg(&self) -> &Dcg {
        &self.state.dcg
    }

    #[must_use]
    pub fn engine(&self) -> Option<&ReachabilityEngine> {
        self.state.engine.as_ref()
    }
}

#[cfg(test)]
mod test {
    use std::rc::Rc;

    use crate::{
        error::{graph, pattern, Error},
        ir::{builder::ProgramBuilder, expr::Type, statement::StatementKind, Program},
        session,
        solver::Z3Solver,
        vm::{
            target::{MetadataInit, MetadataVar, TargetInfo},
            Config,
        },
    };

    fn program() -> Program {
        let mut builder = ProgramBuilder::new();
        let a = builder.named_statement("ctl.a", StatementKind::Empty);
        let ctl = builder.control("ctl", &[], vec![a]);
        builder.pipeline("main", vec![ctl]);
        builder.build()
    }

    #[test]
    fn prepares_every_stage() -> anyhow::Result<()> {
        let session = session::new(program(), Config::default(), Rc::new(Z3Solver::new()))
            .prepare(Some("ctl; ctl.a"))
            .map_err(|e| anyhow::anyhow!("{e}"))?;

        assert!(session.engine().is_some());
        assert_eq!(session.dcg().node_count(), 3);
        assert!(!session.state().initial_state.is_terminal());

        Ok(())
    }

    #[test]
    fn reports_errors_from_each_stage() {
        let solver = Rc::new(Z3Solver::new());
        let missing_entry = session::new(Program::default(), Config::default(), solver.clone())
            .build_graph()
            .err()
            .map(|e| e.payload);
        assert!(matches!(
            missing_entry,
            Some(Error::Graph(graph::Error::MissingEntry))
        ));

        let unknown_name = session::new(program(), Config::default(), solver)
            .prepare(Some("missing"))
            .err()
            .map(|e| e.payload);
        assert!(matches!(
            unknown_name,
            Some(Error::Pattern(pattern::Error::UnknownName { .. }))
        ));
    }

    #[test]
    fn conditions_may_read_target_metadata() -> anyhow::Result<()> {
        let target = TargetInfo::default().with_metadata(MetadataVar::new(
            "meta.port",
            Type::Bits(9),
            MetadataInit::Zero,
        ));
        let config = Config::default().with_target(target);
        let solver = Rc::new(Z3Solver::new());

        let session = session::new(program(), config.clone(), solver.clone())
            .prepare(Some("ctl.a(meta.port == 9w1)"))
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        assert!(session.engine().is_some());

        let undeclared = session::new(program(), config, solver)
            .prepare(Some("ctl.a(nosuch.x == 8w1)"))
            .err()
            .map(|e| e.payload);
        assert_eq!(
            undeclared,
            Some(Error::Pattern(pattern::Error::UnknownVariable {
                name: "nosuch.x".into(),
            }))
        );

        Ok(())
    }
}
