//! This module contains errors pertaining to the compilation of reachability
//! patterns.
//!
//! Every one of these is reported when the pattern is compiled, and never
//! lazily during exploration. The location of each error is the byte offset in
//! the pattern text at which the problem was found.

use thiserror::Error;

use crate::error::located;

/// Errors that occur while compiling a
/// [`crate::pattern::ReachabilityEngine`].
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("The pattern contains no atoms")]
    EmptyPattern,

    #[error("Unrecognised input {text:?} in the pattern")]
    InvalidToken { text: String },

    #[error("Expected {expected} but found {found}")]
    UnexpectedToken { expected: &'static str, found: String },

    #[error("Unexpected end of the pattern, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    #[error("Literal {text} is not a valid constant")]
    InvalidLiteral { text: String },

    #[error("No construct named {name} exists in the program")]
    UnknownName { name: String },

    #[error("No variable {name} is declared for conditions to read")]
    UnknownVariable { name: String },

    #[error("Condition {condition} is not boolean")]
    NonBooleanCondition { condition: String },

    #[error("Operands of {expr} have the wrong types")]
    IllTypedCondition { expr: String },

    #[error("{name} is both required and forbidden at the same point of the pattern")]
    Contradiction { name: String },

    #[error("Nothing matched by {to} is reachable from anything matched by {from}")]
    UnreachableSequence { from: String, to: String },
}

/// A pattern error with an associated byte offset.
pub type LocatedError = located::Located<Error>;

/// The result type for methods that may have pattern errors.
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
