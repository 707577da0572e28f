//! This library implements the core of a symbolic test generator for
//! packet-processing programs: a small-step symbolic evaluator, the directed
//! call graph (DCG) of a program, and a reachability engine that steers or
//! validates exploration against a pattern over named program constructs.
//!
//! It deliberately contains no exploration strategy. The evaluator is a pure
//! transition function from one execution state to its successors, and it is
//! up to the driver to decide which state to step next, when to stop, and what
//! to do with finished states.
//!
//! # How it Works
//!
//! 1. A front-end lowers a program into an [`ir::Program`] through an
//!    [`ir::builder::ProgramBuilder`].
//! 2. The [`graph::Dcg`] of the program is built, recording which constructs
//!    control may flow between and indexing them by their hierarchical names.
//! 3. An optional [`pattern::ReachabilityEngine`] is compiled against the DCG.
//! 4. The [`vm::Evaluator`] steps [`vm::state::ExecutionState`]s, returning a
//!    [`vm::Branch`] per feasible outcome, each guarded by a condition that
//!    excludes its siblings and checked with a [`solver::Solver`].
//!
//! # Basic Usage
//!
//! ```
//! use std::rc::Rc;
//!
//! use symbolic_testgen::{
//!     ir::{
//!         builder::ProgramBuilder,
//!         expr::{Call, Expr},
//!         statement::StatementKind,
//!     },
//!     solver::Z3Solver,
//!     vm,
//! };
//!
//! let mut builder = ProgramBuilder::new();
//! builder.header_type("h_t", &[("f", 8)]);
//! builder.header("hdr.h", "h_t");
//! let set_valid = builder.statement(StatementKind::Call(Expr::call(Call::SetValid {
//!     header: "hdr.h".into(),
//! })));
//! let ingress = builder.control("ingress", &[], vec![set_valid]);
//! builder.pipeline("main", vec![ingress]);
//!
//! let session = symbolic_testgen::new(
//!     builder.build(),
//!     vm::Config::default(),
//!     Rc::new(Z3Solver::new()),
//! )
//! .prepare(Some("ingress"))
//! .unwrap();
//!
//! let mut pending = vec![session.state().initial_state.clone()];
//! let mut finished = vec![];
//! while let Some(state) = pending.pop() {
//!     let branches = session.evaluator().step(&state).unwrap();
//!     if branches.is_empty() {
//!         finished.push(state);
//!     }
//!     pending.extend(branches.into_iter().map(|b| b.next_state));
//! }
//!
//! assert_eq!(finished.len(), 1);
//! assert_eq!(finished[0].env().get("hdr.h.$valid"), Some(Expr::bool(true)));
//! ```

#![warn(clippy::all, clippy::cargo, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Allows for better API naming

pub mod constant;
pub mod error;
pub mod graph;
pub mod ir;
pub mod namespace;
pub mod pattern;
pub mod session;
pub mod solver;
pub mod vm;

// Re-exports to provide the library interface.
pub use graph::Dcg;
pub use pattern::ReachabilityEngine;
pub use session::new;
pub use vm::Evaluator;
