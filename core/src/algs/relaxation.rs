//! # Core-Guided Relaxation
//!
//! Repeatedly asks whether the remaining graph has a topological numbering.
//! If not, the unsat core of the order encoding names a set of edges that
//! contains a cycle; one of them is removed and the next round starts on the
//! smaller graph. Every round runs in its own session scope, and edge names
//! carry the round, so cores never mention constraints of earlier rounds.
//!
//! Each round removes an edge, so there are at most `|E|` rounds. The result
//! is a feedback arc set, but not necessarily a minimum one.

use rustsat::{
    solvers::{
        DefaultInitializer, Initialize, Interrupt, LimitConflicts, SolveIncremental, SolveStats,
        SolverStats,
    },
    types::RsHashMap,
};
use rustsat_cadical::CaDiCaL;

use crate::{
    encodings::order,
    graph::{topological_order, Digraph, Edge, Graph, VertexId},
    types::{EdgeKey, FeedbackArcSet, Outcome, Snapshot, Status},
    Error, Init, Limits, MaybeTerminated, Phase, RelaxOptions, Selection, Session, Solve, Stage,
    Stats, Step, Termination,
};

use super::kernel_functions;

/// Picks the edge to remove from an unsat core
pub trait SelectEdge {
    /// Selects one edge of `core`, which is non-empty, ordered by (source,
    /// sink) and holds the weight of each edge
    fn select(&mut self, core: &[(Edge, usize)]) -> Edge;
}

impl<F> SelectEdge for F
where
    F: FnMut(&[(Edge, usize)]) -> Edge,
{
    fn select(&mut self, core: &[(Edge, usize)]) -> Edge {
        self(core)
    }
}

/// The built-in strategies of [`Selection`]
#[derive(Debug, Clone, Default)]
pub struct Strategy {
    selection: Selection,
    /// How often each edge appeared in a core
    frequency: RsHashMap<Edge, usize>,
}

impl Strategy {
    pub fn new(selection: Selection) -> Self {
        Strategy {
            selection,
            frequency: RsHashMap::default(),
        }
    }
}

impl SelectEdge for Strategy {
    fn select(&mut self, core: &[(Edge, usize)]) -> Edge {
        for (e, _) in core {
            *self.frequency.entry(*e).or_default() += 1;
        }
        // ties go to the earlier core member
        match self.selection {
            Selection::First => core[0].0,
            Selection::Lightest => {
                core.iter()
                    .min_by_key(|(_, w)| *w)
                    .map_or(core[0].0, |(e, _)| *e)
            }
            Selection::MostFrequent => {
                core.iter()
                    .rev()
                    .max_by_key(|(e, _)| self.frequency.get(e).copied().unwrap_or(0))
                    .map_or(core[0].0, |(e, _)| *e)
            }
        }
    }
}

/// The core-guided relaxation algorithm
///
/// # Generics
///
/// - `G`: the graph type
/// - `O`: the SAT solver oracle
/// - `OInit`: the oracle initializer
pub struct Relaxation<G = Graph, O = CaDiCaL<'static, 'static>, OInit = DefaultInitializer> {
    /// The SAT session
    session: Session<O, OInit>,
    /// Configuration options
    opts: RelaxOptions,
    /// The graph that edges are removed from
    working: G,
    /// The removed edges
    feedback: FeedbackArcSet,
    /// The edge selection strategy
    strategy: Box<dyn SelectEdge>,
    /// The numbering found in the last, satisfiable round
    numbering: Vec<(VertexId, usize)>,
    done: bool,
    terminated: Option<Termination>,
}

impl<G, O, OInit> Init for Relaxation<G, O, OInit>
where
    G: Digraph + Clone,
    O: SolveIncremental + SolveStats + LimitConflicts + Interrupt,
    OInit: Initialize<O>,
{
    type Options = RelaxOptions;

    fn new(graph: G, opts: RelaxOptions) -> Self {
        Relaxation {
            session: Session::new(opts.kernel),
            opts,
            working: graph,
            feedback: FeedbackArcSet::default(),
            strategy: Box::new(Strategy::new(opts.selection)),
            numbering: vec![],
            done: false,
            terminated: None,
        }
    }
}

impl<G, O, OInit> Relaxation<G, O, OInit> {
    /// Replaces the edge selection strategy
    pub fn with_strategy<S: SelectEdge + 'static>(mut self, strategy: S) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    /// The topological numbering decoded from the last satisfiable round
    pub fn numbering(&self) -> &[(VertexId, usize)] {
        &self.numbering
    }
}

impl<G, O, OInit> Solve for Relaxation<G, O, OInit>
where
    G: Digraph + Clone,
    O: SolveIncremental + SolveStats + LimitConflicts + Interrupt,
    OInit: Initialize<O>,
{
    type Graph = G;

    fn solve(&mut self, limits: Limits) -> Result<MaybeTerminated, Error> {
        self.session.start_solving(limits);
        let res = match self.alg_main() {
            Err(halt) => self.close_scopes().and(Err(halt)),
            ok => ok,
        };
        let res = self.session.finish_solving(res);
        self.terminated = match &res {
            Ok(MaybeTerminated::Terminated(term)) => Some(*term),
            _ => None,
        };
        res
    }

    fn outcome(&self) -> Outcome<G> {
        let status = if self.done && self.feedback.is_empty() {
            Status::Optimal
        } else if self.done {
            Status::Feasible
        } else {
            Status::Provisional(self.terminated.unwrap_or(Termination::Interrupted))
        };
        Outcome {
            feedback: self.feedback.clone(),
            residual: self.working.clone(),
            order: topological_order(&self.working),
            rounds: self.feedback.len(),
            status,
        }
    }

    fn all_stats(&self) -> (Stats, SolverStats) {
        (self.session.stats(), self.session.oracle_stats())
    }
}

kernel_functions!(Relaxation<G, O, OInit> where O: Interrupt, OInit: Initialize<O>);

impl<G, O, OInit> Relaxation<G, O, OInit>
where
    G: Digraph + Clone,
    O: SolveIncremental + SolveStats + LimitConflicts + Interrupt,
    OInit: Initialize<O>,
{
    fn alg_main(&mut self) -> Step {
        if self.done {
            return Ok(());
        }
        self.session.log_routine_start("relaxation")?;

        self.remove_self_loops()?;

        loop {
            self.session.check_termination()?;
            let round = self.feedback.len();
            let snapshot = Snapshot::take(&self.working, round);
            self.session.log_round(round, snapshot.len())?;

            self.session.push()?;
            let model = order::encode(&mut self.session, &snapshot)?;
            if self.session.decide(Stage::Solving, round)? {
                let sol = self.session.model()?;
                self.numbering = model.decode(&self.session, &sol);
                self.close_scopes()?;
                break;
            }
            let core = self.session.unsat_core()?;
            self.close_scopes()?;

            let edge = self.select(&core, round)?;
            self.session.check_round_limit(round)?;
            self.remove(edge)?;
        }

        self.verify()?;
        self.session
            .log_candidate(self.feedback.weight(), Phase::Relaxation)?;
        self.done = true;
        self.session.log_routine_end()?;
        Ok(())
    }

    /// Retracts all open scopes, or resets the session if configured so
    fn close_scopes(&mut self) -> Step {
        if self.opts.kernel.reset_between_rounds {
            return self.session.reset();
        }
        while self.session.n_scopes() > 0 {
            self.session.pop()?;
        }
        Ok(())
    }

    /// Self-loops are removed without asking the oracle, one round each
    fn remove_self_loops(&mut self) -> Step {
        for edge in self.working.edges() {
            if edge.is_loop() {
                self.session.check_round_limit(self.feedback.len())?;
                self.remove(edge)?;
            }
        }
        Ok(())
    }

    fn select(&mut self, core: &[EdgeKey], round: usize) -> Step<Edge> {
        if core.is_empty() {
            return Err(Error::internal(
                Stage::Solving,
                format!("snapshot of round {round} is unsatisfiable without any edge"),
            )
            .into());
        }
        let mut weighted = Vec::with_capacity(core.len());
        for key in core {
            debug_assert_eq!(key.round, round);
            let edge = key.edge();
            let Some(weight) = self.working.weight(edge) else {
                return Err(Error::internal(
                    Stage::Solving,
                    format!("core member {key} is not an edge of the working graph"),
                )
                .into());
            };
            weighted.push((edge, weight));
        }
        let edge = self.strategy.select(&weighted);
        if !weighted.iter().any(|(e, _)| *e == edge) {
            return Err(Error::internal(
                Stage::Solving,
                format!("selected edge {edge} is not part of the core"),
            )
            .into());
        }
        Ok(edge)
    }

    fn remove(&mut self, edge: Edge) -> Step {
        let Some(weight) = self.working.remove_edge(edge) else {
            return Err(Error::internal(
                Stage::Solving,
                format!("cannot remove missing edge {edge}"),
            )
            .into());
        };
        self.feedback.push(edge, weight);
        self.session.log_removal(edge, weight)?;
        Ok(())
    }

    /// Checks the residual graph independently of the encoding
    fn verify(&mut self) -> Step {
        if topological_order(&self.working).is_none() {
            return Err(Error::internal(
                Stage::Verification,
                "residual graph is cyclic after a satisfiable round",
            )
            .into());
        }
        let numbering: RsHashMap<_, _> = self.numbering.iter().copied().collect();
        for edge in self.working.edges() {
            if numbering.get(&edge.source) >= numbering.get(&edge.sink) {
                return Err(Error::internal(
                    Stage::Verification,
                    format!("numbering violates edge {edge}"),
                )
                .into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{SelectEdge, Strategy};
    use crate::{graph::Edge, Selection};

    fn core() -> Vec<(Edge, usize)> {
        vec![
            (Edge::from((0, 1)), 3),
            (Edge::from((1, 2)), 1),
            (Edge::from((2, 0)), 1),
        ]
    }

    #[test]
    fn first() {
        let mut strategy = Strategy::new(Selection::First);
        assert_eq!(strategy.select(&core()), Edge::from((0, 1)));
    }

    #[test]
    fn lightest_breaks_ties_by_order() {
        let mut strategy = Strategy::new(Selection::Lightest);
        assert_eq!(strategy.select(&core()), Edge::from((1, 2)));
    }

    #[test]
    fn most_frequent() {
        let mut strategy = Strategy::new(Selection::MostFrequent);
        strategy.select(&[(Edge::from((2, 0)), 1)]);
        assert_eq!(strategy.select(&core()), Edge::from((2, 0)));
        let mut fresh = Strategy::new(Selection::MostFrequent);
        assert_eq!(fresh.select(&core()), Edge::from((0, 1)));
    }

    #[test]
    fn closure_strategy() {
        let mut last = |core: &[(Edge, usize)]| core[core.len() - 1].0;
        assert_eq!(last.select(&core()), Edge::from((2, 0)));
    }
}
