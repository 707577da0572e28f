//! This module contains the state tracking functionality for the session.

use std::fmt::Debug;

use crate::{
    graph::Dcg,
    pattern::ReachabilityEngine,
    vm::{state::ExecutionState, Evaluator},
};

/// A marker trait that says that the type implementing it is a session state.
pub trait State
where
    Self: Clone + Debug + Sized,
{
}

/// The initial state for the session.
#[derive(Clone, Debug)]
pub struct HasProgram;
impl State for HasProgram {}

/// The session has built the call graph of the program.
#[derive(Clone, Debug)]
pub struct GraphBuilt {
    pub dcg: Dcg,
}
impl State for GraphBuilt {}

/// The session is ready for the program to be explored.
#[derive(Clone, Debug)]
pub struct Ready {
    pub evaluator: Evaluator,
    pub dcg:       Dcg,

    /// The compiled pattern that exploration should be steered by, if one was
    /// given.
    pub engine: Option<ReachabilityEngine>,

    /// The state at the program's entry.
    pub initial_state: ExecutionState,
}
impl State for Ready {}
