//! This module contains errors pertaining to the construction and querying of
//! the directed call graph.

use thiserror::Error;

use crate::error::located;

/// Errors that occur while building or querying a [`crate::graph::Dcg`].
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("The program has no designated entry point")]
    MissingEntry,

    #[error("No node with handle {node:?} exists in the program")]
    NoSuchNode { node: u32 },

    #[error("The node {node:?} was expected to be a {expected}")]
    UnexpectedNodeKind { node: u32, expected: &'static str },
}

/// A graph error with an associated node location.
pub type LocatedError = located::Located<Error>;

/// The result type for methods that may have graph errors.
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
