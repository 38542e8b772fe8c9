//! # mfas
//!
//! Minimum feedback arc sets of directed graphs through SAT encodings. Three
//! encodings are implemented:
//!
//! - [`Relaxation`]: an order encoding of a topological numbering, relaxed
//!     edge by edge along unsat cores until the remaining graph is acyclic,
//! - [`TriangleOrdering`]: the pairwise ordering (linear ordering problem)
//!     formulation with triangle inequalities, solved to optimality,
//! - [`CycleCover`]: a set cover of an enumeration of all simple cycles,
//!     solved to optimality.
//!
//! The SAT backend is any [`rustsat`] oracle, by default CaDiCaL.

use std::fmt;

use rustsat::solvers::SolverResult;

pub mod options;
pub use options::{
    CoverOptions, IncompleteOracle, KernelOptions, Limits, RelaxOptions, Selection,
};

pub mod types;
pub use types::{EdgeKey, FeedbackArcSet, Outcome, Status};

pub mod graph;
pub use graph::{Digraph, Edge, Graph, VertexId};

pub mod cache;
pub mod encodings;
pub mod parse;

pub mod session;
pub use session::{CheckResult, Incumbent, Interrupter, Session};

pub mod algs;
pub use algs::{Init, KernelFunctions, Solve};

// Reexport algorithms
pub use algs::cover::CycleCover;
pub use algs::relaxation::Relaxation;
pub use algs::triangle::TriangleOrdering;

mod error;
pub use error::{Error, Stage};

pub(crate) mod termination;
pub use termination::MaybeTerminated;
pub use termination::Termination;
pub use termination::{Halt, Step};

/// Algorithm phases that the solver can be in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Core-guided relaxation of the order encoding
    Relaxation,
    /// Linear sat-unsat search on an objective
    Linsu,
    /// Adding cycles missed by a truncated enumeration
    Refinement,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Relaxation => write!(f, "relaxation"),
            Phase::Linsu => write!(f, "linsu"),
            Phase::Refinement => write!(f, "refinement"),
        }
    }
}

/// Statistics of the solver
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Stats {
    /// The number of calls to [`Solve::solve`]
    pub n_solve_calls: usize,
    /// The number of relaxation rounds, i.e., removed edges
    pub n_rounds: usize,
    /// The number of calls to the SAT oracle
    pub n_oracle_calls: usize,
    /// The number of oracle calls that returned unknown
    pub n_indeterminate: usize,
    /// The number of extracted unsat cores
    pub n_cores: usize,
    /// The number of objective values explored by linear search
    pub n_candidates: usize,
    /// The number of simple cycles in the cycle matrix
    pub n_cycles: usize,
    /// The number of clauses handed to the oracle
    pub n_clauses: usize,
    /// The number of session scopes opened
    pub n_scopes: usize,
}

/// A logger to attach to a solver
pub trait WriteSolverLog {
    /// Adds the start of a relaxation round to the log
    fn log_round(&mut self, round: usize, n_edges: usize) -> anyhow::Result<()>;
    /// Adds an oracle call to the log
    fn log_oracle_call(&mut self, result: SolverResult) -> anyhow::Result<()>;
    /// Adds an extracted core to the log
    fn log_core(&mut self, len: usize, red_len: usize) -> anyhow::Result<()>;
    /// Adds the removal of an edge to the log
    fn log_removal(&mut self, edge: Edge, weight: usize) -> anyhow::Result<()>;
    /// Adds a candidate objective value to the log
    fn log_candidate(&mut self, cost: usize, phase: Phase) -> anyhow::Result<()>;
    /// Adds the result of a cycle enumeration to the log
    fn log_cycles(&mut self, n_cycles: usize, complete: bool) -> anyhow::Result<()>;
    /// Adds a new routine starting to the log
    fn log_routine_start(&mut self, desc: &'static str) -> anyhow::Result<()>;
    /// Adds a new routine ending to the log
    fn log_routine_end(&mut self) -> anyhow::Result<()>;
    /// Logs any string
    fn log_message(&mut self, msg: &str) -> anyhow::Result<()>;
}
