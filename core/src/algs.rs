//! Interface shared between the different algorithms

use rustsat::solvers::SolverStats;

use crate::{
    graph::Digraph, types::Outcome, Error, Interrupter, Limits, MaybeTerminated, Stats,
    WriteSolverLog,
};

pub mod cover;
pub mod relaxation;
pub mod triangle;

/// Trait for initializing algorithms
pub trait Init: Solve + Sized {
    type Options;

    /// Initializes the algorithm on a graph. The graph is owned by the
    /// algorithm, the caller keeps its own copy.
    fn new(graph: Self::Graph, opts: Self::Options) -> Self;
}

/// Solving interface for each algorithm
pub trait Solve: KernelFunctions {
    type Graph: Digraph + Clone;

    /// Solves the instance under given limits. If not fully solved, returns an
    /// early termination reason and [`Solve::outcome`] holds the best result
    /// found so far.
    fn solve(&mut self, limits: Limits) -> Result<MaybeTerminated, Error>;
    /// Gets the current result
    fn outcome(&self) -> Outcome<Self::Graph>;
    /// Gets all statistics from the solver
    fn all_stats(&self) -> (Stats, SolverStats);
}

/// Shared functionality provided by the [`crate::Session`]
pub trait KernelFunctions {
    /// Gets tracked statistics from the solver
    fn stats(&self) -> Stats;
    /// Attaches a logger to the solver
    fn attach_logger<L: WriteSolverLog + 'static>(&mut self, logger: L);
    /// Detaches a logger from the solver
    fn detach_logger(&mut self) -> Option<Box<dyn WriteSolverLog>>;
    /// Gets an iterrupter to the solver
    fn interrupter(&mut self) -> Interrupter;
}

/// Implements [`KernelFunctions`] for an algorithm with a `session` field
macro_rules! kernel_functions {
    ($alg:ident<$($gen:ident),*> where $($bounds:tt)*) => {
        impl<$($gen),*> $crate::KernelFunctions for $alg<$($gen),*>
        where
            $($bounds)*
        {
            fn stats(&self) -> $crate::Stats {
                self.session.stats()
            }

            fn attach_logger<L: $crate::WriteSolverLog + 'static>(&mut self, logger: L) {
                self.session.attach_logger(logger)
            }

            fn detach_logger(&mut self) -> Option<Box<dyn $crate::WriteSolverLog>> {
                self.session.detach_logger()
            }

            fn interrupter(&mut self) -> $crate::Interrupter {
                self.session.interrupter()
            }
        }
    };
}
pub(crate) use kernel_functions;
