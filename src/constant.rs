//! This module contains constants that are needed throughout the codebase.

/// The widest bit-vector that the expression representation can hold.
pub const MAXIMUM_BIT_WIDTH: u16 = 128;

/// The name of the synthetic field that records the validity of a header
/// instance in the symbolic environment.
pub const VALIDITY_FIELD: &str = "$valid";

/// The bit-width of the symbolic variable used to select which action a
/// control-plane table entry invokes.
pub const TABLE_ACTION_SELECTOR_WIDTH: u16 = 8;

/// The bit-width of the value produced by a table's `action_run`.
pub const ACTION_RUN_WIDTH: u16 = 32;

/// The default maximum depth of the continuation stack of an execution state.
pub const DEFAULT_MAXIMUM_STACK_DEPTH: usize = 256;

/// The default value for whether to step the evaluator in permissive errors
/// mode.
///
/// Permissive errors mode drops only the branch that hit an unimplemented
/// construct. See [`crate::vm::Config`] for more information.
pub const DEFAULT_PERMISSIVE_ERRORS_ENABLED: bool = false;

/// The default value for whether every new branch has its path constraint
/// checked for satisfiability when it is created.
pub const DEFAULT_SOLVE_EAGERLY: bool = true;

/// The default number of complete assignments the enumeration solver will try
/// before answering `Unknown`.
pub const DEFAULT_ENUMERATION_LIMIT: u128 = 1 << 20;

/// The number of assignments below which [`crate::solver::Z3Solver`] decides
/// a constraint by enumeration instead of handing it to z3.
pub const DEFAULT_FAST_PATH_LIMIT: u128 = 1 << 8;

/// The default time z3 may spend on a single query before answering
/// `Unknown`.
pub const DEFAULT_SOLVER_TIMEOUT_MS: u64 = 10_000;
