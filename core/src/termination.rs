//! # Functionality Related to Early Solver Termination
//!
//! Inside the algorithms, routines return [`Step`], which can carry either an
//! early termination or an error through `?`. At the API boundary this is
//! settled into a `Result<MaybeTerminated<T>, Error>`.

use std::fmt;

use crate::Error;

/// Early termination reasons for [`crate::Solve::solve`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// Terminated because of maximum number of relaxation rounds reached
    RoundsLimit,
    /// Terminated because of maximum number of oracle calls reached
    OracleCallsLimit,
    /// Terminated because the deadline passed
    Deadline,
    /// Termination because of external interrupt
    Interrupted,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::RoundsLimit => {
                write!(f, "Solver terminated early because of round limit")
            }
            Termination::OracleCallsLimit => {
                write!(f, "Solver terminated early because of oracle call limit")
            }
            Termination::Deadline => {
                write!(f, "Solver terminated early because the deadline passed")
            }
            Termination::Interrupted => {
                write!(f, "Solver terminated early because of interrupt signal")
            }
        }
    }
}

/// Return type for functions that either return a value or were terminated early for some reason
#[derive(Debug, PartialEq)]
pub enum MaybeTerminated<T = ()> {
    /// The operation finished with a return value
    Done(T),
    /// The operation was terminated early
    Terminated(Termination),
}

impl<T> MaybeTerminated<T> {
    pub fn unwrap(self) -> T {
        match self {
            MaybeTerminated::Done(val) => val,
            MaybeTerminated::Terminated(term) => {
                panic!("called `MaybeTerminated::unwrap()` on a `Terminated` value: {term}")
            }
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, MaybeTerminated::Done(_))
    }
}

/// Reason for leaving an operation before it finished
#[derive(Debug)]
pub enum Halt {
    /// A limit was hit or the solver was interrupted
    Terminated(Termination),
    /// The operation failed
    Error(Error),
}

/// Return type of session operations and algorithm routines
pub type Step<T = ()> = Result<T, Halt>;

impl From<Termination> for Halt {
    fn from(value: Termination) -> Self {
        Halt::Terminated(value)
    }
}

impl From<Error> for Halt {
    fn from(value: Error) -> Self {
        Halt::Error(value)
    }
}

impl From<anyhow::Error> for Halt {
    fn from(value: anyhow::Error) -> Self {
        Halt::Error(Error::Oracle(value))
    }
}

/// Settles an internal step into the public return type
pub(crate) fn settle<T>(step: Step<T>) -> Result<MaybeTerminated<T>, Error> {
    match step {
        Ok(val) => Ok(MaybeTerminated::Done(val)),
        Err(Halt::Terminated(term)) => Ok(MaybeTerminated::Terminated(term)),
        Err(Halt::Error(err)) => Err(err),
    }
}
