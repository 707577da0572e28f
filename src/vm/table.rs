//! Table application.
//!
//! Tables with constant entries are matched first-match against those
//! entries. Tables without entries are configured by the control plane, and
//! their contents are modelled with fresh symbolic variables: whether the
//! lookup hit, which action the hit entry selects, the entry's key and the
//! arguments of its action.

use itertools::Itertools;

use crate::{
    constant::{ACTION_RUN_WIDTH, TABLE_ACTION_SELECTOR_WIDTH},
    error::execution::Result,
    ir::{
        expr::{BinaryOp, Call, Expr, TableResult, Type},
        MatchKind,
        NodeId,
        TableDecl,
        TableKey,
    },
    vm::{
        continuation::Cmd,
        resume,
        state::ExecutionState,
        target::{MatchConstruct, NoMatchPolicy},
        Candidate,
        Evaluator,
    },
};

/// One possible result of a table lookup.
struct Outcome {
    condition: Expr,
    hit:       bool,
    action:    NodeId,
    args:      Vec<Expr>,
}

impl Evaluator {
    /// Applies `table` to the evaluated `keys`, producing one candidate per
    /// possible outcome of the lookup.
    ///
    /// Each candidate runs the selected action and then resumes with the
    /// requested `result` of the application.
    pub(super) fn apply_table(
        &self,
        mut state: ExecutionState,
        slot: &Cmd,
        table: NodeId,
        keys: &[Expr],
        result: TableResult,
    ) -> Result<Vec<Candidate>> {
        let decl = self.table(table)?;
        self.enter(&mut state, table);

        let mut outcomes = if decl.entries.is_empty() {
            self.control_plane_outcomes(&mut state, table, decl, keys)?
        } else {
            self.constant_entry_outcomes(decl, keys)
        };
        if self.config.target.no_match_policy(MatchConstruct::Table) == NoMatchPolicy::Omit {
            outcomes.retain(|outcome| outcome.hit);
        }
        log::trace!(
            "Table {} has {} possible outcomes",
            self.program.name_of(table),
            outcomes.len()
        );

        Ok(outcomes
            .into_iter()
            .map(|outcome| {
                let mut next = state.clone();
                Self::record_branch(&mut next, Some(table), &outcome.condition);
                let value = match result {
                    TableResult::Hit => Expr::bool(outcome.hit),
                    TableResult::Miss => Expr::bool(!outcome.hit),
                    TableResult::ActionRun => {
                        Expr::constant(u128::from(outcome.action.index()), ACTION_RUN_WIDTH)
                    }
                };
                resume(&mut next, slot, value);
                next.body.push_front(Cmd::Expr(Expr::call(Call::Action {
                    action: outcome.action,
                    args:   outcome.args.into(),
                })));
                (outcome.condition, next)
            })
            .collect())
    }

    /// Matches `keys` against the constant entries of the table, in order.
    fn constant_entry_outcomes(&self, decl: &TableDecl, keys: &[Expr]) -> Vec<Outcome> {
        let mut earlier = Expr::bool(false);
        let mut outcomes = Vec::with_capacity(decl.entries.len() + 1);

        for entry in &decl.entries {
            let matched = Expr::all(
                entry
                    .keysets
                    .iter()
                    .zip(keys)
                    .map(|(keyset, key)| keyset.constraint(key, &self.program)),
            );
            outcomes.push(Outcome {
                condition: Expr::and(matched.clone(), Expr::not(earlier.clone())),
                hit:       true,
                action:    entry.action.action,
                args:      entry.action.args.clone(),
            });
            earlier = Expr::or(earlier, matched);
        }

        outcomes.push(Outcome {
            condition: Expr::not(earlier),
            hit:       false,
            action:    decl.default_action.action,
            args:      decl.default_action.args.clone(),
        });
        outcomes
    }

    /// Builds the outcomes of a lookup into a table whose entries are
    /// installed by the control plane.
    fn control_plane_outcomes(
        &self,
        state: &mut ExecutionState,
        table: NodeId,
        decl: &TableDecl,
        keys: &[Expr],
    ) -> Result<Vec<Outcome>> {
        let name = self.program.name_of(table);
        let hit = state.fresh_var(&format!("{name}.hit"), Type::Bool);
        let selector = state.fresh_var(
            &format!("{name}.action"),
            Type::Bits(TABLE_ACTION_SELECTOR_WIDTH),
        );

        let mut key_matches = Vec::with_capacity(keys.len());
        for (ix, (key, decl_key)) in keys.iter().zip(&decl.keys).enumerate() {
            key_matches.push(Self::control_plane_key(state, &name, ix, key, decl_key));
        }
        let key_match = Expr::all(key_matches);

        let mut outcomes = Vec::with_capacity(decl.actions.len() + 1);
        for (ix, action) in decl.actions.iter().enumerate() {
            let action_name = self.program.name_of(*action);
            let args = self
                .action(*action)?
                .params
                .iter()
                .map(|param| {
                    let base = format!("{name}.{action_name}.{}", param.name);
                    state.fresh_var(&base, param.ty)
                })
                .collect_vec();
            let selected = Expr::eq(
                selector.clone(),
                Expr::constant(ix as u128, TABLE_ACTION_SELECTOR_WIDTH),
            );
            outcomes.push(Outcome {
                condition: Expr::all([hit.clone(), selected, key_match.clone()]),
                hit: true,
                action: *action,
                args,
            });
        }

        outcomes.push(Outcome {
            condition: Expr::not(hit),
            hit:       false,
            action:    decl.default_action.action,
            args:      decl.default_action.args.clone(),
        });
        Ok(outcomes)
    }

    /// Builds the condition under which `key` matches the control-plane
    /// entry for the `ix`th key of the table.
    fn control_plane_key(
        state: &mut ExecutionState,
        table: &str,
        ix: usize,
        key: &Expr,
        decl_key: &TableKey,
    ) -> Expr {
        let base = format!("{table}.key{ix}");
        match decl_key.match_kind {
            MatchKind::Exact => Expr::eq(key.clone(), state.fresh_var(&base, decl_key.ty)),
            MatchKind::Ternary | MatchKind::Lpm => {
                let value = state.fresh_var(&base, decl_key.ty);
                let mask = state.fresh_var(&format!("{base}.mask"), decl_key.ty);
                Expr::eq(
                    Expr::binary(BinaryOp::BitAnd, key.clone(), mask.clone()),
                    Expr::binary(BinaryOp::BitAnd, value, mask),
                )
            }
            MatchKind::Range => {
                let low = state.fresh_var(&format!("{base}.low"), decl_key.ty);
                let high = state.fresh_var(&format!("{base}.high"), decl_key.ty);
                Expr::and(
                    Expr::binary(BinaryOp::Ge, key.clone(), low),
                    Expr::binary(BinaryOp::Le, key.clone(), high),
                )
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::rc::Rc;

    use crate::{
        ir::{
            builder::ProgramBuilder,
            expr::{Call, Expr, TableResult, Type, Value},
            statement::StatementKind,
            ActionRef,
            KeySet,
            MatchKind,
            NodeId,
            Param,
            TableDecl,
            TableEntry,
            TableKey,
        },
        solver::{Solver, Z3Solver},
        vm::{
            continuation::Cmd,
            state::ExecutionState,
            target::{MatchConstruct, NoMatchPolicy, TargetInfo},
            Config,
            Evaluator,
        },
    };

    struct Fixture {
        evaluator: Evaluator,
        table:     NodeId,
        actions:   Vec<NodeId>,
    }

    fn fixture(entries: bool, config: Config) -> Fixture {
        let mut builder = ProgramBuilder::new();
        let assign = builder.statement(StatementKind::Assign {
            target: "meta.port".into(),
            value:  Expr::path("port"),
        });
        let forward = builder.action(
            "ingress.forward",
            vec![Param::new("port", Type::Bits(9))],
            vec![assign],
        );
        let drop = builder.action("ingress.drop", vec![], vec![]);
        let entries = if entries {
            vec![TableEntry {
                keysets: vec![KeySet::Exact(Expr::constant(1, 8))],
                action:  ActionRef {
                    action: forward,
                    args:   vec![Expr::constant(3, 9)],
                },
            }]
        } else {
            vec![]
        };
        let table = builder.table(
            "ingress.t",
            TableDecl {
                keys: vec![TableKey {
                    expr:       Expr::path("meta.k"),
                    match_kind: MatchKind::Exact,
                    ty:         Type::Bits(8),
                }],
                actions: vec![forward, drop],
                default_action: ActionRef {
                    action: drop,
                    args:   vec![],
                },
                entries,
            },
        );
        let evaluator = Evaluator::new(
            Rc::new(builder.build()),
            config,
            Rc::new(Z3Solver::new()),
        );
        Fixture {
            evaluator,
            table,
            actions: vec![forward, drop],
        }
    }

    fn matched(table: NodeId, key: Expr, result: TableResult) -> ExecutionState {
        ExecutionState::new([Cmd::Return(Expr::call(Call::TableMatch {
            table,
            keys: vec![key].into(),
            result,
        }))])
    }

    #[test]
    fn control_plane_tables_branch_per_action_and_on_miss() -> anyhow::Result<()> {
        let Fixture {
            evaluator,
            table,
            actions,
        } = fixture(false, Config::default());
        let state = matched(table, Expr::var("k", Type::Bits(8)), TableResult::ActionRun);

        let branches = evaluator.step(&state)?;
        assert_eq!(branches.len(), 3);

        let solver = Z3Solver::new();
        for (i, a) in branches.iter().enumerate() {
            for b in &branches[i + 1..] {
                let both = Expr::and(a.constraint.clone(), b.constraint.clone());
                assert!(solver.check(&both).is_unsat());
            }
        }

        let ran = branches
            .iter()
            .map(|b| match b.next_state.body().get(1) {
                Some(Cmd::Return(value)) => value.as_value(),
                _ => None,
            })
            .collect::<Vec<_>>();
        let expected = [actions[0], actions[1], actions[1]]
            .iter()
            .map(|a| Some(Value::bits(u128::from(a.index()), 32)))
            .collect::<Vec<_>>();
        assert_eq!(ran, expected);

        Ok(())
    }

    #[test]
    fn constant_entries_match_first() -> anyhow::Result<()> {
        let Fixture {
            evaluator, table, ..
        } = fixture(true, Config::default());

        let hit = evaluator.step(&matched(table, Expr::constant(1, 8), TableResult::Hit))?;
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].next_state.body().get(1), Some(&Cmd::Return(Expr::bool(true))));

        let miss = evaluator.step(&matched(table, Expr::constant(2, 8), TableResult::Hit))?;
        assert_eq!(miss.len(), 1);
        assert_eq!(miss[0].next_state.body().get(1), Some(&Cmd::Return(Expr::bool(false))));

        Ok(())
    }

    #[test]
    fn misses_can_be_omitted_by_the_target() -> anyhow::Result<()> {
        let target =
            TargetInfo::default().with_no_match_policy(MatchConstruct::Table, NoMatchPolicy::Omit);
        let Fixture { evaluator, table, .. } = fixture(false, Config::default().with_target(target));
        let state = matched(table, Expr::var("k", Type::Bits(8)), TableResult::Hit);

        assert_eq!(evaluator.step(&state)?.len(), 2);

        Ok(())
    }
}
