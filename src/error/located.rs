//! Errors tagged with the place they were raised.

use std::fmt;

use thiserror::Error;

/// An error raised at a point in the input being processed.
///
/// Errors about the program sit at the raw index of the [`crate::ir::NodeId`]
/// being processed. Errors about a reachability pattern sit at a byte offset
/// into the pattern text.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub struct Located<E>
where
    E: Clone,
{
    pub location: u32,
    pub payload:  E,
}

/// Prints the location as eight hex digits ahead of the error.
impl<E> fmt::Display for Located<E>
where
    E: fmt::Display + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = hex::encode(self.location.to_be_bytes());
        write!(f, "[0x{location}]: {}", self.payload)
    }
}

/// Errors, and results carrying them, that can be pinned to a location.
pub trait Locatable
where
    Self: Sized,
{
    type Located;

    fn locate(self, location: u32) -> Self::Located;
}

/// Pins the error of a failed result, leaving a success untouched.
impl<T, E> Locatable for Result<T, E>
where
    E: std::error::Error + Clone,
{
    type Located = Result<T, Located<E>>;

    fn locate(self, location: u32) -> Self::Located {
        self.map_err(|payload| Located { location, payload })
    }
}

#[cfg(test)]
mod test {
    use crate::error::{
        execution,
        located::{Locatable, Located},
        pattern,
        Error,
        LocatedError,
    };

    #[test]
    fn displays_location_as_hex() {
        let error = Located {
            location: 0x2a,
            payload:  execution::Error::MissingEntry,
        };

        assert!(error.to_string().starts_with("[0x0000002a]: "));
    }

    #[test]
    fn locates_failed_results_only() {
        let failed: Result<(), pattern::Error> = Err(pattern::Error::EmptyPattern);
        assert_eq!(
            failed.locate(7),
            Err(Located {
                location: 7,
                payload:  pattern::Error::EmptyPattern,
            })
        );

        let passed: Result<u8, pattern::Error> = Ok(1);
        assert_eq!(passed.locate(7), Ok(1));
    }

    #[test]
    fn subsystem_errors_keep_their_location_when_rewrapped() {
        let raised = execution::Error::MissingReturnValue.locate(3);
        let rewrapped = LocatedError::from(raised);

        assert_eq!(rewrapped.location, 3);
        assert!(matches!(
            rewrapped.payload,
            Error::Execution(execution::Error::MissingReturnValue)
        ));
    }
}
