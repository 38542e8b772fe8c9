//! # Options
//!
//! This module contains all configuration options of the feedback arc set solvers.

use std::{fmt, time::Duration};

/// Session-wide configuration options
#[derive(Clone, Copy, Debug)]
pub struct KernelOptions {
    /// Core trimming (re-solving under the core until it stops shrinking)
    pub core_trimming: bool,
    /// Core minimization (deletion-based, under a conflict limit)
    pub core_minimization: bool,
    /// Conflict limit for a single oracle call, [`None`] for no limit
    pub conflict_limit: Option<u32>,
    /// How often an indeterminate oracle call is retried with a doubled
    /// conflict limit before giving up
    pub indeterminate_retries: usize,
    /// Rebuild the oracle from scratch instead of retracting a scope
    pub reset_between_rounds: bool,
}

impl Default for KernelOptions {
    fn default() -> Self {
        KernelOptions {
            core_trimming: false,
            core_minimization: false,
            conflict_limit: None,
            indeterminate_retries: 2,
            reset_between_rounds: false,
        }
    }
}

/// Options of the core-guided relaxation algorithm
#[derive(Clone, Copy, Debug, Default)]
pub struct RelaxOptions {
    pub kernel: KernelOptions,
    /// Which core edge to remove in each round
    pub selection: Selection,
}

/// Built-in strategies for picking the edge to remove from a core
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum Selection {
    /// The first edge of the core in (source, sink) order
    #[default]
    First,
    /// The core edge with the smallest weight
    Lightest,
    /// The core edge that appeared in the most cores so far
    MostFrequent,
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::First => write!(f, "first"),
            Selection::Lightest => write!(f, "lightest"),
            Selection::MostFrequent => write!(f, "most-frequent"),
        }
    }
}

/// Options of the cycle cover algorithm
#[derive(Clone, Copy, Debug, Default)]
pub struct CoverOptions {
    pub kernel: KernelOptions,
    /// Maximum number of simple cycles to enumerate, [`None`] for all
    pub max_cycles: Option<usize>,
    /// What to do if the enumeration hits `max_cycles`
    pub on_incomplete: IncompleteOracle,
}

/// Behaviour on a truncated cycle enumeration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum IncompleteOracle {
    /// Report an error
    #[default]
    Fail,
    /// Solve the truncated cover and label the result approximate
    Approximate,
    /// Add cycles of the residual graph until it is acyclic
    Refine,
}

impl fmt::Display for IncompleteOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncompleteOracle::Fail => write!(f, "fail"),
            IncompleteOracle::Approximate => write!(f, "approximate"),
            IncompleteOracle::Refine => write!(f, "refine"),
        }
    }
}

/// Limits for a call to [`crate::Solve::solve`]
#[derive(Clone, Copy, Default, Debug)]
pub struct Limits {
    /// The maximum number of relaxation rounds
    pub rounds: Option<usize>,
    /// The maximum number of SAT oracle calls to make
    pub oracle_calls: Option<usize>,
    /// Wall clock time after which to stop, counted from the start of the call.
    /// The deadline is checked before and after every oracle call, it does
    /// not stop an oracle call that is already running. To bound a single
    /// call, interrupt it through [`crate::KernelFunctions::interrupter`]
    /// from a timer thread, or set [`KernelOptions::conflict_limit`].
    pub deadline: Option<Duration>,
}

impl Limits {
    /// No limits
    pub fn none() -> Limits {
        Limits {
            rounds: None,
            oracle_calls: None,
            deadline: None,
        }
    }
}
