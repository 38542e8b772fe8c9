//! # Linear Ordering with Triangle Inequalities
//!
//! Encodes the pairwise ordering model of the whole graph once and minimizes
//! the weight of the violated edges by linear sat-unsat search. The optimum is
//! a minimum feedback arc set. Self-loops are violated by every order and are
//! added to the result without entering the objective.

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
    encodings::triangle::{self, TriangleModel},
    graph::{topological_order, Digraph, Graph},
    types::{FeedbackArcSet, ObjEncoding, Objective, Outcome, Status},
    Error, Incumbent, Init, KernelOptions, Limits, MaybeTerminated, Session, Solve, Stage, Stats,
    Step, Termination,
};

use super::kernel_functions;

/// The triangle-inequality ordering algorithm
///
/// # Generics
///
/// - `G`: the graph type
/// - `O`: the SAT solver oracle
/// - `OInit`: the oracle initializer
/// - `PBE`: pseudo-boolean objective encoding
/// - `CE`: cardinality objective encoding
pub struct TriangleOrdering<
    G = Graph,
    O = CaDiCaL<'static, 'static>,
    OInit = DefaultInitializer,
    PBE = GeneralizedTotalizer,
    CE = Totalizer,
> {
    /// The SAT session
    session: Session<O, OInit>,
    /// The input graph
    graph: G,
    /// The encoded model, once encoded
    model: Option<(TriangleModel, Objective)>,
    /// The objective encoding
    encoding: Option<ObjEncoding<PBE, CE>>,
    /// The best order found so far
    incumbent: Option<Incumbent>,
    done: bool,
    terminated: Option<Termination>,
}

impl<G, O, OInit, PBE, CE> Init for TriangleOrdering<G, O, OInit, PBE, CE>
where
    G: Digraph + Clone,
    O: SolveIncremental + SolveStats + LimitConflicts + Interrupt,
    OInit: Initialize<O>,
    PBE: pb::BoundUpperIncremental + FromIterator<(Lit, usize)>,
    CE: card::BoundUpperIncremental + FromIterator<Lit>,
{
    type Options = KernelOptions;

    fn new(graph: G, opts: KernelOptions) -> Self {
        TriangleOrdering {
            session: Session::new(opts),
            graph,
            model: None,
            encoding: None,
            incumbent: None,
            done: false,
            terminated: None,
        }
    }
}

impl<G, O, OInit, PBE, CE> Solve for TriangleOrdering<G, O, OInit, PBE, CE>
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
        let feedback = self.feedback();
        let mut residual = self.graph.clone();
        for (edge, _) in feedback.iter() {
            residual.remove_edge(edge);
        }
        let status = if self.done {
            Status::Optimal
        } else {
            Status::Provisional(self.terminated.unwrap_or(Termination::Interrupted))
        };
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

kernel_functions!(TriangleOrdering<G, O, OInit, PBE, CE> where O: Interrupt, OInit: Initialize<O>);

impl<G, O, OInit, PBE, CE> TriangleOrdering<G, O, OInit, PBE, CE>
where
    G: Digraph + Clone,
    O: SolveIncremental + SolveStats + LimitConflicts + Interrupt,
    OInit: Initialize<O>,
    PBE: pb::BoundUpperIncremental + FromIterator<(Lit, usize)>,
    CE: card::BoundUpperIncremental + FromIterator<Lit>,
{
    /// Checks whether the triangle inequalities accept the assignment that
    /// sets every `y_ij` to whether the edge `i -> j` exists. For a
    /// tournament this holds iff the tournament is acyclic.
    pub fn pinned_consistent(&mut self) -> Result<MaybeTerminated<bool>, Error> {
        let step = self.check_pinned();
        self.session.finish_solving(step)
    }

    fn check_pinned(&mut self) -> Step<bool> {
        self.ensure_encoded()?;
        let matrix = self.graph.adjacency_matrix();
        let pins = triangle::adjacency_pins(&mut self.session, &matrix)?;
        self.session.decide_under(&pins, Stage::Solving, 0)
    }

    fn ensure_encoded(&mut self) -> Step {
        if self.model.is_some() {
            return Ok(());
        }
        self.session.log_routine_start("encoding")?;
        let matrix = self.graph.adjacency_matrix();
        let model = triangle::encode(&mut self.session, &matrix)?;
        let objective = model.objective();
        self.encoding = Some(ObjEncoding::new(&objective));
        self.model = Some((model, objective));
        self.session.log_routine_end()?;
        Ok(())
    }

    fn alg_main(&mut self) -> Step {
        if self.done {
            return Ok(());
        }
        self.session.log_routine_start("triangle")?;
        self.ensure_encoded()?;

        let (Some((_, objective)), Some(encoding)) = (&self.model, &mut self.encoding) else {
            return Err(Error::internal(Stage::Encoding, "ordering model missing").into());
        };
        if !self.session.minimize(
            objective,
            encoding,
            0,
            &mut self.incumbent,
            Stage::Solving,
        )? {
            return Err(Error::internal(
                Stage::Solving,
                "triangle inequalities admit no linear order",
            )
            .into());
        }

        self.verify()?;
        self.done = true;
        self.session.log_routine_end()?;
        Ok(())
    }

    /// The violated edges of the incumbent order
    fn feedback(&self) -> FeedbackArcSet {
        match (&self.model, &self.incumbent) {
            (Some((model, _)), Some(inc)) => model.violated(&inc.solution).into_iter().collect(),
            _ => FeedbackArcSet::default(),
        }
    }

    fn verify(&self) -> Step {
        let feedback = self.feedback();
        let mut residual = self.graph.clone();
        for (edge, _) in feedback.iter() {
            residual.remove_edge(edge);
        }
        if topological_order(&residual).is_none() {
            return Err(Error::internal(
                Stage::Verification,
                "violated edges of the optimal order are not a feedback arc set",
            )
            .into());
        }
        let offset = self.model.as_ref().map_or(0, |(model, _)| model.offset());
        let cost = self.incumbent.as_ref().map_or(0, |inc| inc.cost);
        if feedback.weight() != cost + offset {
            return Err(Error::internal(
                Stage::Verification,
                format!(
                    "feedback weight {} does not match objective value {}",
                    feedback.weight(),
                    cost + offset
                ),
            )
            .into());
        }
        Ok(())
    }
}
