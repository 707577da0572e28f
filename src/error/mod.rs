//! This module contains the primary error type for the library's interface.
//! It also re-exports the more specific error types that are
//! subsystem-specific.

pub mod execution;
pub mod graph;
pub mod located;
pub mod pattern;

use thiserror::Error;

use crate::error::located::Locatable;

/// The interface result type for the library.
///
/// Functions that form the setup interface of the library (see
/// [`crate::session`]) return this result type. Subsystems return the more
/// specific child error types as appropriate. Each setup step stops at the
/// first error it raises.
pub type Result<T> = std::result::Result<T, LocatedError>;

/// The interface error type for the library.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    /// Errors from stepping execution states.
    #[error(transparent)]
    Execution(#[from] execution::Error),

    /// Errors from building or querying the directed call graph.
    #[error(transparent)]
    Graph(#[from] graph::Error),

    /// Errors from compiling a reachability pattern.
    #[error(transparent)]
    Pattern(#[from] pattern::Error),
}

/// Make it possible to attach locations to these errors.
impl Locatable for Error {
    type Located = LocatedError;

    fn locate(self, location: u32) -> Self::Located {
        located::Located {
            location,
            payload: self,
        }
    }
}

/// A library error with an associated location.
pub type LocatedError = located::Located<Error>;

/// Generates the conversion from a subsystem's located error into the general
/// one, keeping its location.
macro_rules! rewrap_located {
    ($module:ident) => {
        impl From<$module::LocatedError> for LocatedError {
            fn from(value: $module::LocatedError) -> Self {
                Error::from(value.payload).locate(value.location)
            }
        }
    };
}

rewrap_located!(execution);
rewrap_located!(graph);
rewrap_located!(pattern);
