//! This module contains errors pertaining to the small-step symbolic
//! evaluation of a program.

use thiserror::Error;

use crate::error::located;

/// Errors that occur while stepping an [`crate::vm::state::ExecutionState`]
/// with the [`crate::vm::Evaluator`].
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("The evaluator does not implement {construct}")]
    UnimplementedConstruct { construct: String },

    #[error("Register {register} was indexed with a symbolic value")]
    SymbolicRegisterIndex { register: String },

    #[error("The variable {name} was read before it was ever written")]
    UndefinedVariable { name: String },

    #[error("{name} is not an instance of any declared header type")]
    UnknownHeader { name: String },

    #[error("The node {node:?} was expected to be a {expected}")]
    UnexpectedNodeKind { node: u32, expected: &'static str },

    #[error("No node with handle {node:?} exists in the program")]
    NoSuchNode { node: u32 },

    #[error("The program has no designated entry point")]
    MissingEntry,

    #[error("Maximum stack depth exceeded with request for {requested:?} frames")]
    StackDepthExceeded { requested: usize },

    #[error("A continuation expected a value but the computation produced none")]
    MissingReturnValue,

    #[error("Expected a {expected} value but found {found}")]
    TypeMismatch { expected: &'static str, found: String },

    #[error("Action {action} expects {expected:?} arguments but was given {found:?}")]
    ArityMismatch {
        action:   String,
        expected: usize,
        found:    usize,
    },
}

impl Error {
    /// Checks whether the error describes a construct that the evaluator does
    /// not know how to advance.
    ///
    /// Such errors can be recovered from in permissive mode by dropping the
    /// branch that encountered them, while all other errors point at a broken
    /// program or a broken state and are always fatal.
    #[must_use]
    pub fn is_unimplemented(&self) -> bool {
        matches!(
            self,
            Self::UnimplementedConstruct { .. } | Self::SymbolicRegisterIndex { .. }
        )
    }
}

/// An execution error with an associated program location.
pub type LocatedError = located::Located<Error>;

/// The result type for methods that may have execution errors.
pub type Result<T> = std::result::Result<T, LocatedError>;

/// Make it possible to attach locations to these errors.
impl located::Locatable for Error {
    type Located = LocatedError;

    fn locate(self, location: u32) -> Self::Located {
        located::Located {
            location,
            payload: self,
        }
    }
}
