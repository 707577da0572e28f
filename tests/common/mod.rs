//! This module contains common utilities for simplifying the writing of
//! integration tests for this library.

#![cfg(test)]

use std::rc::Rc;

use symbolic_testgen::{
    ir::{
        builder::ProgramBuilder,
        expr::{BinaryOp, Call, Expr, Type},
        statement::StatementKind,
        ActionRef,
        KeySet,
        MatchKind,
        NextState,
        NodeId,
        Program,
        SelectCase,
        TableDecl,
        TableKey,
        Transition,
    },
    solver::{Solver, Z3Solver},
    vm::{state::ExecutionState, Config, Evaluator},
};

/// The upper bound on the number of steps taken by [`explore`] before it gives
/// up, so that a looping program fails the test rather than hanging it.
#[allow(unused)] // It is actually
pub const STEP_LIMIT: usize = 10_000;

/// A program with a single header `hdr.h` of type `h_t { f: bit<8> }`, whose
/// `ingress` control runs `ingress.sum`, assigning `8w42 + hdr.h.f` to
/// `hdr.h.f`.
#[allow(unused)] // It is actually
pub fn header_program() -> Program {
    let mut builder = header_builder();
    let sum = builder.named_statement(
        "ingress.sum",
        StatementKind::Assign {
            target: "hdr.h.f".into(),
            value:  Expr::binary(BinaryOp::Add, Expr::constant(42, 8), Expr::path("hdr.h.f")),
        },
    );
    let ingress = builder.control("ingress", &[], vec![sum]);
    builder.pipeline("main", vec![ingress]);
    builder.build()
}

/// The nodes of [`table_program`] that tests refer to.
#[allow(unused)] // It is actually
pub struct TableProgram {
    pub program: Program,
    pub table:   NodeId,
    pub a1:      NodeId,
    pub a2:      NodeId,
}

/// A program whose `ingress` control applies the control-plane table
/// `ingress.t`, keyed on `hdr.h.f`, with the actions `ingress.a1` and
/// `ingress.a2`.
///
/// `ingress.a1` writes `1` to `hdr.h.f` and `ingress.a2` writes `2`. A miss
/// runs `ingress.a2`.
#[allow(unused)] // It is actually
pub fn table_program() -> TableProgram {
    let mut builder = header_builder();
    let write_1 = builder.statement(StatementKind::Assign {
        target: "hdr.h.f".into(),
        value:  Expr::constant(1, 8),
    });
    let a1 = builder.action("ingress.a1", vec![], vec![write_1]);
    let write_2 = builder.statement(StatementKind::Assign {
        target: "hdr.h.f".into(),
        value:  Expr::constant(2, 8),
    });
    let a2 = builder.action("ingress.a2", vec![], vec![write_2]);
    let table = builder.table(
        "ingress.t",
        TableDecl {
            keys:           vec![TableKey {
                expr:       Expr::path("hdr.h.f"),
                match_kind: MatchKind::Exact,
                ty:         Type::Bits(8),
            }],
            actions:        vec![a1, a2],
            default_action: ActionRef {
                action: a2,
                args:   vec![],
            },
            entries:        vec![],
        },
    );
    let apply = builder.statement(StatementKind::Apply(table));
    let ingress = builder.control("ingress", &[], vec![apply]);
    builder.pipeline("main", vec![ingress]);

    TableProgram {
        program: builder.build(),
        table,
        a1,
        a2,
    }
}

/// The nodes of [`parser_program`] that tests refer to.
#[allow(unused)] // It is actually
pub struct ParserProgram {
    pub program: Program,
    pub start:   NodeId,
    pub ipv4:    NodeId,
}

/// A program whose parser `parse` extracts an ethernet header and moves on to
/// extract an IPv4 header when the ether type is `0x0800`, followed by an
/// `ingress` control that emits both headers.
#[allow(unused)] // It is actually
pub fn parser_program() -> ParserProgram {
    let mut builder = ProgramBuilder::new();
    builder.header_type("ethernet_t", &[("dst", 8), ("ether_type", 16)]);
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
            cases: vec![
                SelectCase {
                    keysets: vec![KeySet::Exact(Expr::constant(0x0800, 16))],
                    next:    NextState::State(ipv4),
                },
                SelectCase {
                    keysets: vec![KeySet::Default],
                    next:    NextState::Accept,
                },
            ]
            .into(),
        },
    );
    let extract_ipv4 = builder.statement(StatementKind::Call(Expr::call(Call::Extract {
        header: "hdr.ipv4".into(),
    })));
    builder.define_state(ipv4, vec![extract_ipv4], Transition::Accept);

    let emit_ethernet = builder.statement(StatementKind::Call(Expr::call(Call::Emit {
        header: "hdr.ethernet".into(),
    })));
    let emit_ipv4 = builder.statement(StatementKind::Call(Expr::call(Call::Emit {
        header: "hdr.ipv4".into(),
    })));
    let deparse = builder.control("deparse", &[], vec![emit_ethernet, emit_ipv4]);
    builder.pipeline("main", vec![parser, deparse]);

    ParserProgram {
        program: builder.build(),
        start,
        ipv4,
    }
}

/// Creates an evaluator for `program` with the default configuration and an
/// [`Z3Solver`].
#[allow(unused)] // It is actually
pub fn evaluator(program: Program) -> Evaluator {
    Evaluator::new(Rc::new(program), Config::default(), solver())
}

#[allow(unused)] // It is actually
pub fn solver() -> Rc<dyn Solver> {
    Rc::new(Z3Solver::new())
}

/// Explores every path from `state` depth-first, returning the terminal
/// states in the order they were reached.
///
/// # Errors
///
/// Returns [`Err`] if any step fails, if the solver cannot decide a branch, or
/// if exploration takes more than [`STEP_LIMIT`] steps.
#[allow(unused)] // It is actually
pub fn explore(
    evaluator: &Evaluator,
    state: ExecutionState,
) -> anyhow::Result<Vec<ExecutionState>> {
    let mut pending = vec![state];
    let mut finished = vec![];
    let mut steps = 0;

    while let Some(state) = pending.pop() {
        steps += 1;
        if steps > STEP_LIMIT {
            anyhow::bail!("Exploration did not finish within {STEP_LIMIT} steps");
        }

        let outcome = evaluator
            .step_with_diagnostics(&state)
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        if let Some(dropped) = outcome.discarded.first() {
            anyhow::bail!("Branch was dropped: {:?}", dropped.reason);
        }
        let branches = outcome.branches;
        if branches.is_empty() {
            finished.push(state);
        }

        // Reversed so that branches are explored in source order.
        pending.extend(branches.into_iter().rev().map(|b| b.next_state));
    }

    Ok(finished)
}

/// Asserts that the conjunction of any two of `constraints` is unsatisfiable.
#[allow(unused)] // It is actually
pub fn assert_pairwise_exclusive(constraints: &[Expr]) {
    let solver = Z3Solver::new();
    for (ix, a) in constraints.iter().enumerate() {
        for b in &constraints[ix + 1..] {
            let both = Expr::and(a.clone(), b.clone());
            assert!(
                solver.check(&both).is_unsat(),
                "{a} and {b} can hold at the same time"
            );
        }
    }
}

fn header_builder() -> ProgramBuilder {
    let mut builder = ProgramBuilder::new();
    builder.header_type("h_t", &[("f", 8)]);
    builder.header("hdr.h", "h_t");
    builder
}
