//! # Errors
//!
//! Every error names the [`Stage`] it was raised in, so a caller can tell an
//! encoding bug from a solver giving up or an incomplete cycle oracle.

use std::fmt;

/// The stage of a computation that failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Building constraints in the session
    Encoding,
    /// Calling the SAT oracle
    Solving,
    /// Enumerating simple cycles
    Oracle,
    /// Checking the result independently
    Verification,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Encoding => write!(f, "encoding"),
            Stage::Solving => write!(f, "solving"),
            Stage::Oracle => write!(f, "cycle enumeration"),
            Stage::Verification => write!(f, "verification"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("name collision during {stage}: `{name}` is already registered in this session")]
    NameCollision { name: String, stage: Stage },
    #[error("oracle returned unknown during {stage} in round {round} after {attempts} attempt(s)")]
    SolverIndeterminate {
        stage: Stage,
        round: usize,
        attempts: usize,
    },
    #[error("cycle enumeration stopped after {found} cycles (limit {limit}), the cycle matrix is incomplete")]
    OracleIncomplete { found: usize, limit: usize },
    #[error("internal encoding error during {stage}: {reason}")]
    InternalEncoding { stage: Stage, reason: String },
    #[error(transparent)]
    Oracle(#[from] anyhow::Error),
}

impl Error {
    /// Gets the stage that the error was raised in
    pub fn stage(&self) -> Stage {
        match self {
            Error::NameCollision { stage, .. }
            | Error::SolverIndeterminate { stage, .. }
            | Error::InternalEncoding { stage, .. } => *stage,
            Error::OracleIncomplete { .. } => Stage::Oracle,
            Error::Oracle(_) => Stage::Solving,
        }
    }

    pub(crate) fn internal<S: Into<String>>(stage: Stage, reason: S) -> Self {
        Error::InternalEncoding {
            stage,
            reason: reason.into(),
        }
    }
}
