//! Parser states and their transitions.

use crate::{
    error::execution::Result,
    ir::{
        expr::Expr,
        statement::{Statement, StatementKind},
        KeySet,
        NextState,
        NodeId,
        SelectCase,
        Transition,
    },
    vm::{
        certain,
        continuation::{Cmd, SignalKind},
        state::ExecutionState,
        target::{MatchConstruct, NoMatchPolicy},
        Candidate,
        Evaluator,
    },
};

impl Evaluator {
    /// Runs the statements of `parser_state`, followed by its transition.
    pub(super) fn enter_state(
        &self,
        mut state: ExecutionState,
        parser_state: NodeId,
    ) -> Result<ExecutionState> {
        let decl = self.parser_state(parser_state)?;
        self.enter(&mut state, parser_state);

        let keys = match &decl.transition {
            Transition::Select { keys, .. } => keys.clone(),
            _ => Vec::new().into(),
        };
        state.body.push_front(Cmd::Stmt(Statement::new(StatementKind::Transition {
            state: parser_state,
            keys,
        })));
        for stmt in decl.statements.iter().rev() {
            state.body.push_front(Cmd::Stmt(stmt.clone()));
        }
        state.namespaces = self.program.namespace(parser_state);

        Ok(state)
    }

    /// Leaves `parser_state` along its transition, given the values of its
    /// select `keys`.
    pub(super) fn transition(
        &self,
        state: ExecutionState,
        parser_state: NodeId,
        keys: &[Expr],
    ) -> Result<Vec<Candidate>> {
        match &self.parser_state(parser_state)?.transition {
            Transition::Accept => Ok(vec![certain(state)]),
            Transition::Reject => Ok(vec![certain(self.raise(state, SignalKind::Reject))]),
            Transition::Goto(next) => Ok(vec![certain(self.goto(state, NextState::State(*next)))]),
            Transition::Select { cases, .. } => Ok(self.select(&state, parser_state, keys, cases)),
        }
    }

    /// Branches on the first case of a select whose keysets match `keys`.
    fn select(
        &self,
        state: &ExecutionState,
        parser_state: NodeId,
        keys: &[Expr],
        cases: &[SelectCase],
    ) -> Vec<Candidate> {
        let mut candidates = Vec::with_capacity(cases.len() + 1);
        let mut earlier = Expr::bool(false);

        for case in cases {
            let matched = match case.keysets.as_slice() {
                [KeySet::Default] => Expr::bool(true),
                keysets => Expr::all(
                    keysets
                        .iter()
                        .zip(keys)
                        .map(|(keyset, key)| keyset.constraint(key, &self.program)),
                ),
            };
            let condition = Expr::and(matched.clone(), Expr::not(earlier.clone()));
            earlier = Expr::or(earlier, matched);

            let mut next = state.clone();
            Self::record_branch(&mut next, Some(parser_state), &condition);
            candidates.push((condition, self.goto(next, case.next)));

            if earlier.is_true() {
                return candidates;
            }
        }

        if self.config.target.no_match_policy(MatchConstruct::Select) == NoMatchPolicy::Branch {
            let condition = Expr::not(earlier);
            let mut next = state.clone();
            Self::record_branch(&mut next, Some(parser_state), &condition);
            candidates.push((condition, self.raise(next, SignalKind::Reject)));
        }

        candidates
    }

    fn goto(&self, mut state: ExecutionState, next: NextState) -> ExecutionState {
        match next {
            NextState::State(id) => {
                state
                    .body
                    .push_front(Cmd::Stmt(Statement::new(StatementKind::EnterState(id))));
                state
            }
            NextState::Accept => state,
            NextState::Reject => self.raise(state, SignalKind::Reject),
        }
    }
}

#[cfg(test)]
mod test {
    use std::rc::Rc;

    use crate::{
        ir::{
            builder::ProgramBuilder,
            expr::{Call, Expr},
            statement::StatementKind,
            KeySet,
            NextState,
            NodeId,
            SelectCase,
            Transition,
        },
        solver::Z3Solver,
        vm::{
            state::{ExecutionState, TraceEvent},
            target::{MatchConstruct, NoMatchPolicy, TargetInfo},
            Config,
            Evaluator,
        },
    };

    struct Fixture {
        evaluator: Evaluator,
        ipv4:      NodeId,
    }

    /// A parser that extracts an ethernet header and selects on its type.
    fn fixture(target: TargetInfo) -> Fixture {
        let mut builder = ProgramBuilder::new();
        builder.header_type("ethernet_t", &[("ether_type", 16)]);
        builder.header_type("ipv4_t", &[("ttl", 8)]);
        builder.header("hdr.ethernet", "ethernet_t");
        builder.header("hdr.ipv4", "ipv4_t");

        let parser = builder.parser("parse", &[]);
        let start = builder.state(parser, "start");
        let ipv4 = builder.state(parser, "ipv4");
        let extract_ethernet = builder.statement(StatementKind::Call(Expr::call(Call::Extract {
            header: "hdr.ethernet".into(),
        })));
        builder.define_state(
            start,
            vec![extract_ethernet],
            Transition::Select {
                keys:  vec![Expr::path("hdr.ethernet.ether_type")].into(),
                cases: vec![SelectCase {
                    keysets: vec![KeySet::Exact(Expr::constant(0x0800, 16))],
                    next:    NextState::State(ipv4),
                }]
                .into(),
            },
        );
        let extract_ipv4 = builder.statement(StatementKind::Call(Expr::call(Call::Extract {
            header: "hdr.ipv4".into(),
        })));
        builder.define_state(ipv4, vec![extract_ipv4], Transition::Accept);
        builder.pipeline("main", vec![parser]);

        let config = Config::default().with_target(target);
        let evaluator = Evaluator::new(
            Rc::new(builder.build()),
            config,
            Rc::new(Z3Solver::new()),
        );
        Fixture { evaluator, ipv4 }
    }

    /// Steps every path from `state` to completion.
    fn run(evaluator: &Evaluator, state: ExecutionState) -> anyhow::Result<Vec<ExecutionState>> {
        let mut pending = vec![state];
        let mut finished = vec![];
        while let Some(state) = pending.pop() {
            let branches = evaluator.step(&state)?;
            if branches.is_empty() {
                finished.push(state);
            }
            pending.extend(branches.into_iter().map(|b| b.next_state));
        }
        Ok(finished)
    }

    #[test]
    fn selects_fork_on_symbolic_keys() -> anyhow::Result<()> {
        let Fixture { evaluator, ipv4 } = fixture(TargetInfo::default());
        let finished = run(&evaluator, evaluator.initial_state()?)?;
        assert_eq!(finished.len(), 2);

        let accepted = finished
            .iter()
            .filter(|s| s.visited_nodes().any(|n| n == ipv4))
            .collect::<Vec<_>>();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].input_packet().len(), 2);

        let rejected = finished
            .iter()
            .filter(|s| !s.visited_nodes().any(|n| n == ipv4))
            .collect::<Vec<_>>();
        assert_eq!(rejected.len(), 1);
        assert!(rejected[0].trace().iter().any(|e| matches!(e, TraceEvent::Signal { .. })));

        Ok(())
    }

    #[test]
    fn rejection_sets_the_parser_error_when_the_target_has_one() -> anyhow::Result<()> {
        let target = TargetInfo::default().with_parser_error("meta.parser_error");
        let Fixture { evaluator, ipv4 } = fixture(target);
        let finished = run(&evaluator, evaluator.initial_state()?)?;
        assert_eq!(finished.len(), 2);

        for state in &finished {
            let rejected = !state.visited_nodes().any(|n| n == ipv4);
            assert_eq!(state.env().get("meta.parser_error"), Some(Expr::bool(rejected)));
            assert!(!state.trace().iter().any(|e| matches!(e, TraceEvent::Signal { .. })));
        }

        Ok(())
    }

    #[test]
    fn no_match_outcomes_can_be_omitted() -> anyhow::Result<()> {
        let target =
            TargetInfo::default().with_no_match_policy(MatchConstruct::Select, NoMatchPolicy::Omit);
        let Fixture { evaluator, ipv4 } = fixture(target);
        let finished = run(&evaluator, evaluator.initial_state()?)?;
        assert_eq!(finished.len(), 1);
        assert!(finished[0].visited_nodes().any(|n| n == ipv4));

        Ok(())
    }
}
