//! # Cycle Cover
//!
//! Enumerates the simple cycles of the graph into a [`CycleMatrix`] and
//! finds a minimum weight set of edges hitting every row. Over a complete
//! enumeration the cover is a minimum feedback arc set.
//!
//! If the enumeration is cut off at the configured maximum, the behaviour
//! depends on [`IncompleteOracle`]. With [`IncompleteOracle::Refine`], cycles
//! remaining in the residual graph are added to the matrix one at a time and
//! the cover is re-optimized, in the manner of an implicit hitting set
//! loop. The previous optimum stays a lower bound, since rows are only ever
//! added.

use rustsat::{
    encodings::{card, card::Totalizer, pb, pb::GeneralizedTotalizer},
    solvers::{
        DefaultInitializer, Initialize, Interrupt, LimitConflicts, SolveIncremental, SolveStats,
        SolverStats,
    },
    types::Lit,
};
use rustsat_cadical::CaDiCaL;

use crate::{
    encodings::cover::{self, CoverModel},
    graph::{is_acyclic, topological_order, Digraph, Edge, Graph},
    types::{CycleMatrix, FeedbackArcSet, ObjEncoding, Objective, Outcome, Status},
    CoverOptions, Error, Incumbent, IncompleteOracle, Init, Limits, MaybeTerminated, Phase,
    Session, Solve, Stage, Stats, Step, Termination,
};

use super::kernel_functions;

/// The cycle cover algorithm
///
/// # Generics
///
/// - `G`: the graph type
/// - `O`: the SAT solver oracle
/// - `OInit`: the oracle initializer
/// - `PBE`: pseudo-boolean objective encoding
/// - `CE`: cardinality objective encoding
pub struct CycleCover<
    G = Graph,
    O = CaDiCaL<'static, 'static>,
    OInit = DefaultInitializer,
    PBE = GeneralizedTotalizer,
    CE = Totalizer,
> {
    /// The SAT session
    session: Session<O, OInit>,
    /// Configuration options
    opts: CoverOptions,
    /// The input graph
    graph: G,
    /// The cycles to cover
    matrix: CycleMatrix,
    /// Whether `matrix` holds all simple cycles of the graph
    complete: bool,
    /// The encoded model, once encoded
    model: Option<(CoverModel, Objective)>,
    /// The objective encoding
    encoding: Option<ObjEncoding<PBE, CE>>,
    /// The best cover of the current matrix found so far
    incumbent: Option<Incumbent>,
    /// The optimum of the previous matrix
    lower_bound: usize,
    /// The last optimal cover
    feedback: FeedbackArcSet,
    /// Number of cycles added by refinement
    refinements: usize,
    status: Option<Status>,
    terminated: Option<Termination>,
}

impl<G, O, OInit, PBE, CE> Init for CycleCover<G, O, OInit, PBE, CE>
where
    G: Digraph + Clone,
    O: SolveIncremental + SolveStats + LimitConflicts + Interrupt,
    OInit: Initialize<O>,
    PBE: pb::BoundUpperIncremental + FromIterator<(Lit, usize)>,
    CE: card::BoundUpperIncremental + FromIterator<Lit>,
{
    type Options = CoverOptions;

    fn new(graph: G, opts: CoverOptions) -> Self {
        CycleCover {
            session: Session::new(opts.kernel),
            opts,
            graph,
            matrix: CycleMatrix::default(),
            complete: false,
            model: None,
            encoding: None,
            incumbent: None,
            lower_bound: 0,
            feedback: FeedbackArcSet::default(),
            refinements: 0,
            status: None,
            terminated: None,
        }
    }
}

impl<G, O, OInit, PBE, CE> CycleCover<G, O, OInit, PBE, CE> {
    /// The cycles covered so far
    pub fn matrix(&self) -> &CycleMatrix {
        &self.matrix
    }

    /// Number of cycles added to the matrix by refinement
    pub fn refinements(&self) -> usize {
        self.refinements
    }
}

impl<G, O, OInit, PBE, CE> Solve for CycleCover<G, O, OInit, PBE, CE>
where
    G: Digraph + Clone,
    O: SolveIncremental + SolveStats + LimitConflicts + Interrupt,
    OInit: Initialize<O>,
    PBE: pb::BoundUpperIncremental + FromIterator<(Lit, usize)>,
    CE: card::BoundUpperIncremental + FromIterator<Lit>,
{
    type Graph = G;

    fn solve(&mut self, limits: Limits) -> Result<MaybeTerminated, Error> {
        self.session.start_solving(limits);
        let step = self.alg_main();
        let res = self.session.finish_solving(step);
        self.terminated = match &res {
            Ok(MaybeTerminated::Terminated(term)) => Some(*term),
            _ => None,
        };
        res
    }

    fn outcome(&self) -> Outcome<G> {
        let feedback = match (&self.model, &self.incumbent) {
            (Some((model, _)), Some(inc)) if self.status.is_none() => {
                model.cut(&inc.solution).into_iter().collect()
            }
            _ => self.feedback.clone(),
        };
        let residual = self.residual(&feedback);
        let status = self.status.unwrap_or(Status::Provisional(
            self.terminated.unwrap_or(Termination::Interrupted),
        ));
        Outcome {
            order: topological_order(&residual),
            feedback,
            residual,
            rounds: 0,
            status,
        }
    }

    fn all_stats(&self) -> (Stats, SolverStats) {
        (self.session.stats(), self.session.oracle_stats())
    }
}

kernel_functions!(CycleCover<G, O, OInit, PBE, CE> where O: Interrupt, OInit: Initialize<O>);

impl<G, O, OInit, PBE, CE> CycleCover<G, O, OInit, PBE, CE>
where
    G: Digraph + Clone,
    O: SolveIncremental + SolveStats + LimitConflicts + Interrupt,
    OInit: Initialize<O>,
    PBE: pb::BoundUpperIncremental + FromIterator<(Lit, usize)>,
    CE: card::BoundUpperIncremental + FromIterator<Lit>,
{
    fn alg_main(&mut self) -> Step {
        if self.status.is_some() {
            return Ok(());
        }
        self.session.log_routine_start("cycle-cover")?;
        self.ensure_encoded()?;

        loop {
            let (Some((model, objective)), Some(encoding)) = (&self.model, &mut self.encoding)
            else {
                return Err(Error::internal(Stage::Encoding, "cover model missing").into());
            };
            if !self.session.minimize(
                objective,
                encoding,
                self.lower_bound,
                &mut self.incumbent,
                Stage::Solving,
            )? {
                return Err(Error::internal(Stage::Solving, "cycle cover is infeasible").into());
            }
            let Some(inc) = &self.incumbent else {
                return Err(Error::internal(Stage::Solving, "linear search left no cover").into());
            };
            let cut: Vec<(Edge, usize)> = model.cut(&inc.solution);
            let cost = inc.cost;
            let cut_edges: Vec<Edge> = cut.iter().map(|(e, _)| *e).collect();
            if !self.matrix.is_covered_by(&cut_edges) {
                return Err(Error::internal(
                    Stage::Verification,
                    "optimal cut misses a row of the cycle matrix",
                )
                .into());
            }
            self.feedback = cut.into_iter().collect();
            let residual = self.residual(&self.feedback);

            if is_acyclic(&residual) {
                self.status = Some(Status::Optimal);
                break;
            }
            match self.opts.on_incomplete {
                _ if self.complete => {
                    return Err(Error::internal(
                        Stage::Verification,
                        "residual of a cover of all cycles is cyclic",
                    )
                    .into())
                }
                IncompleteOracle::Approximate => {
                    self.status = Some(Status::Approximate);
                    break;
                }
                IncompleteOracle::Refine | IncompleteOracle::Fail => {
                    self.refine(&residual, cost)?;
                }
            }
        }

        self.session.log_routine_end()?;
        Ok(())
    }

    /// Enumerates cycles and encodes the cover, unless already done
    fn ensure_encoded(&mut self) -> Step {
        if self.model.is_some() {
            return Ok(());
        }
        self.session.log_routine_start("cycle enumeration")?;
        let enumeration = self.graph.enumerate_simple_cycles(self.opts.max_cycles);
        self.session.log_routine_end()?;
        let found = enumeration.cycles.len();
        self.session.log_cycles(found, enumeration.complete)?;
        if !enumeration.complete && self.opts.on_incomplete == IncompleteOracle::Fail {
            return Err(Error::OracleIncomplete {
                found,
                limit: self.opts.max_cycles.unwrap_or(found),
            }
            .into());
        }
        self.complete = enumeration.complete;
        self.matrix = enumeration.cycles.into_iter().collect();

        let edges: Vec<(Edge, usize)> = self
            .graph
            .edges()
            .into_iter()
            .filter_map(|e| self.graph.weight(e).map(|w| (e, w)))
            .collect();
        let model = cover::encode(&mut self.session, &edges, &self.matrix)?;
        let objective = model.objective();
        self.encoding = Some(ObjEncoding::new(&objective));
        self.model = Some((model, objective));
        Ok(())
    }

    /// Adds one cycle of the residual graph to the matrix
    fn refine(&mut self, residual: &G, optimum: usize) -> Step {
        let Some(cycle) = residual
            .enumerate_simple_cycles(Some(1))
            .cycles
            .into_iter()
            .next()
        else {
            return Err(Error::internal(
                Stage::Oracle,
                "cyclic residual graph without a simple cycle",
            )
            .into());
        };
        self.session.log_candidate(optimum, Phase::Refinement)?;
        cover::encode_cycle(&mut self.session, &cycle)?;
        self.matrix.add_cycle(cycle);
        self.session.log_cycles(self.matrix.n_cycles(), false)?;
        self.refinements += 1;
        self.lower_bound = optimum;
        self.incumbent = None;
        Ok(())
    }

    fn residual(&self, feedback: &FeedbackArcSet) -> G {
        let mut residual = self.graph.clone();
        for (edge, _) in feedback.iter() {
            residual.remove_edge(edge);
        }
        residual
    }
}

#[cfg(test)]
mod tests {
    use super::CycleCover;
    use crate::{
        graph::Graph, CoverOptions, Error, IncompleteOracle, Init, Limits, Solve, Status,
    };

    type Alg = CycleCover<Graph>;

    fn two_triangles() -> Graph {
        Graph::from_edges([(0, 1), (1, 2), (2, 0), (2, 3), (3, 4), (4, 2)])
    }

    #[test]
    fn truncated_enumeration_fails() {
        let mut alg = Alg::new(
            two_triangles(),
            CoverOptions {
                max_cycles: Some(1),
                ..CoverOptions::default()
            },
        );
        let res = alg.solve(Limits::none());
        assert!(matches!(
            res,
            Err(Error::OracleIncomplete { found: 1, limit: 1 })
        ));
    }

    #[test]
    fn refinement_adds_missing_cycle() {
        let mut alg = Alg::new(
            two_triangles(),
            CoverOptions {
                max_cycles: Some(1),
                on_incomplete: IncompleteOracle::Refine,
                ..CoverOptions::default()
            },
        );
        alg.solve(Limits::none()).unwrap();
        let outcome = alg.outcome();
        assert_eq!(outcome.status, Status::Optimal);
        assert!(outcome.is_acyclic());
        // the two triangles share vertex 2 but no edge
        assert_eq!(outcome.feedback.len(), 2);
        assert_eq!(alg.matrix().n_cycles(), 2);
        assert_eq!(alg.refinements(), 1);
    }

    #[test]
    fn approximate_keeps_cyclic_residual() {
        let mut alg = Alg::new(
            two_triangles(),
            CoverOptions {
                max_cycles: Some(1),
                on_incomplete: IncompleteOracle::Approximate,
                ..CoverOptions::default()
            },
        );
        alg.solve(Limits::none()).unwrap();
        let outcome = alg.outcome();
        assert_eq!(outcome.status, Status::Approximate);
        assert_eq!(outcome.feedback.len(), 1);
        assert!(!outcome.is_acyclic());
    }
}
