//! # Types
//!
//! Shared types for the feedback arc set solvers.

use std::{fmt, ops::Range};

use rustsat::{
    encodings::{card, pb, CollectClauses},
    instances::ManageVars,
    types::{Assignment, Lit, TernaryVal, Var},
};

use crate::{
    graph::{Digraph, Edge, VertexId},
    Termination,
};

/// Name of a tracked edge constraint. The round makes names unique across
/// relaxation rounds, so a snapshot of round `r` can only ever produce core
/// members of round `r`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub source: VertexId,
    pub sink: VertexId,
    pub round: usize,
}

impl EdgeKey {
    pub fn new(edge: Edge, round: usize) -> Self {
        EdgeKey {
            source: edge.source,
            sink: edge.sink,
            round,
        }
    }

    pub fn edge(&self) -> Edge {
        Edge::new(self.source, self.sink)
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}@{}", self.source, self.sink, self.round)
    }
}

/// An immutable view of the edge set of a graph at the start of a round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    round: usize,
    edges: Vec<(Edge, usize)>,
}

impl Snapshot {
    /// Takes a snapshot of a graph. Edges are ordered by (source, sink).
    pub fn take<G: Digraph + ?Sized>(graph: &G, round: usize) -> Self {
        let mut edges: Vec<_> = graph
            .edges()
            .into_iter()
            .map(|e| (e, graph.weight(e).unwrap_or(0)))
            .collect();
        edges.sort_unstable();
        Snapshot { round, edges }
    }

    pub fn round(&self) -> usize {
        self.round
    }

    pub fn edges(&self) -> &[(Edge, usize)] {
        &self.edges
    }

    /// The vertices incident to at least one edge, in ascending order
    pub fn vertices(&self) -> Vec<VertexId> {
        let mut vertices: Vec<_> = self
            .edges
            .iter()
            .flat_map(|(e, _)| [e.source, e.sink])
            .collect();
        vertices.sort_unstable();
        vertices.dedup();
        vertices
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// A set of removed edges together with their weights, in removal order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedbackArcSet {
    edges: Vec<(Edge, usize)>,
}

impl FeedbackArcSet {
    pub(crate) fn push(&mut self, edge: Edge, weight: usize) {
        debug_assert!(!self.contains(edge));
        self.edges.push((edge, weight));
    }

    pub fn contains(&self, edge: Edge) -> bool {
        self.edges.iter().any(|(e, _)| *e == edge)
    }

    /// The total weight of all edges in the set
    pub fn weight(&self) -> usize {
        self.edges.iter().map(|(_, w)| w).sum()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Edge, usize)> + '_ {
        self.edges.iter().copied()
    }

    /// The edges of the set ordered by (source, sink)
    pub fn sorted_edges(&self) -> Vec<Edge> {
        let mut edges: Vec<_> = self.edges.iter().map(|(e, _)| *e).collect();
        edges.sort_unstable();
        edges
    }
}

impl FromIterator<(Edge, usize)> for FeedbackArcSet {
    fn from_iter<T: IntoIterator<Item = (Edge, usize)>>(iter: T) -> Self {
        let mut fas = FeedbackArcSet::default();
        for (e, w) in iter {
            fas.push(e, w);
        }
        fas
    }
}

/// Incidence of simple cycles (rows) and edges (columns)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CycleMatrix {
    rows: Vec<Vec<Edge>>,
}

impl CycleMatrix {
    /// Adds a cycle as a new row
    pub fn add_cycle(&mut self, mut cycle: Vec<Edge>) {
        debug_assert!(!cycle.is_empty());
        cycle.sort_unstable();
        cycle.dedup();
        self.rows.push(cycle);
    }

    /// Whether the cycle of row `row` traverses `edge`
    pub fn contains(&self, row: usize, edge: Edge) -> bool {
        self.rows[row].binary_search(&edge).is_ok()
    }

    /// Gets the edges of a row
    pub fn row(&self, row: usize) -> &[Edge] {
        &self.rows[row]
    }

    pub fn n_cycles(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Checks whether a set of edges hits every cycle
    pub fn is_covered_by(&self, edges: &[Edge]) -> bool {
        self.rows
            .iter()
            .all(|row| row.iter().any(|e| edges.contains(e)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &[Edge]> + '_ {
        self.rows.iter().map(Vec::as_slice)
    }
}

impl FromIterator<Vec<Edge>> for CycleMatrix {
    fn from_iter<T: IntoIterator<Item = Vec<Edge>>>(iter: T) -> Self {
        let mut matrix = CycleMatrix::default();
        for cycle in iter {
            matrix.add_cycle(cycle);
        }
        matrix
    }
}

/// Quality of a returned feedback arc set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Proven minimum weight
    Optimal,
    /// Valid but not proven minimal
    Feasible,
    /// Minimum for a truncated cycle enumeration, the residual might still be cyclic
    Approximate,
    /// Best known result when the solver terminated early
    Provisional(Termination),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Optimal => write!(f, "optimal"),
            Status::Feasible => write!(f, "feasible"),
            Status::Approximate => write!(f, "approximate"),
            Status::Provisional(_) => write!(f, "provisional"),
        }
    }
}

/// The result of an algorithm
#[derive(Debug, Clone)]
pub struct Outcome<G> {
    /// The removed edges
    pub feedback: FeedbackArcSet,
    /// The input graph without the removed edges
    pub residual: G,
    /// A topological order of the residual, if it is acyclic
    pub order: Option<Vec<VertexId>>,
    /// The number of relaxation rounds
    pub rounds: usize,
    pub status: Status,
}

impl<G> Outcome<G> {
    pub fn is_acyclic(&self) -> bool {
        self.order.is_some()
    }
}

/// A linear objective to minimize, given as soft literals that incur their
/// weight when true
#[derive(Debug, Clone)]
pub enum Objective {
    Weighted {
        lits: Vec<(Lit, usize)>,
    },
    Unweighted {
        unit_weight: usize,
        lits: Vec<Lit>,
    },
    Constant,
}

impl Objective {
    /// Initializes the objective from soft literals, detecting whether it is weighted
    pub fn new<I: IntoIterator<Item = (Lit, usize)>>(lits: I) -> Self {
        let lits: Vec<_> = lits.into_iter().filter(|(_, w)| *w > 0).collect();
        if lits.is_empty() {
            return Objective::Constant;
        }
        let unit_weight = lits[0].1;
        if lits.iter().any(|(_, w)| *w != unit_weight) {
            Objective::Weighted { lits }
        } else {
            Objective::Unweighted {
                unit_weight,
                lits: lits.into_iter().map(|(l, _)| l).collect(),
            }
        }
    }

    /// Computes the cost of an assignment
    pub fn evaluate(&self, sol: &Assignment) -> usize {
        let is_true = |l: &Lit| sol.lit_value(*l) == TernaryVal::True;
        match self {
            Objective::Weighted { lits } => lits
                .iter()
                .filter(|(l, _)| is_true(l))
                .map(|(_, w)| w)
                .sum(),
            Objective::Unweighted { unit_weight, lits } => {
                lits.iter().filter(|l| is_true(l)).count() * unit_weight
            }
            Objective::Constant => 0,
        }
    }

    pub fn n_lits(&self) -> usize {
        match self {
            Objective::Weighted { lits } => lits.len(),
            Objective::Unweighted { lits, .. } => lits.len(),
            Objective::Constant => 0,
        }
    }
}

/// An objective encoding for either a weighted or an unweighted objective.
/// All bounds are given as objective costs.
#[derive(Debug)]
pub enum ObjEncoding<PBE, CE> {
    Weighted(PBE),
    Unweighted(CE, usize),
    Constant,
}

impl<PBE, CE> ObjEncoding<PBE, CE>
where
    PBE: pb::BoundUpperIncremental + FromIterator<(Lit, usize)>,
    CE: card::BoundUpperIncremental + FromIterator<Lit>,
{
    pub fn new(objective: &Objective) -> Self {
        match objective {
            Objective::Weighted { lits } => ObjEncoding::Weighted(lits.iter().copied().collect()),
            Objective::Unweighted { unit_weight, lits } => {
                ObjEncoding::Unweighted(lits.iter().copied().collect(), *unit_weight)
            }
            Objective::Constant => ObjEncoding::Constant,
        }
    }
}

impl<PBE, CE> ObjEncoding<PBE, CE>
where
    PBE: pb::BoundUpperIncremental,
    CE: card::BoundUpperIncremental,
{
    /// Encodes the given range of costs
    pub fn encode_ub_change<Col>(
        &mut self,
        range: Range<usize>,
        collector: &mut Col,
        var_manager: &mut dyn ManageVars,
    ) -> Result<(), rustsat::OutOfMemory>
    where
        Col: CollectClauses,
    {
        match self {
            ObjEncoding::Weighted(enc) => enc.encode_ub_change(range, collector, var_manager),
            ObjEncoding::Unweighted(enc, unit_weight) => enc.encode_ub_change(
                range.start / *unit_weight..range.end / *unit_weight + 1,
                collector,
                var_manager,
            ),
            ObjEncoding::Constant => Ok(()),
        }
    }

    /// Enforces the given upper bound on the cost
    pub fn enforce_ub(&self, ub: usize) -> Result<Vec<Lit>, rustsat::encodings::Error> {
        match self {
            ObjEncoding::Weighted(enc) => enc.enforce_ub(ub),
            ObjEncoding::Unweighted(enc, unit_weight) => enc.enforce_ub(ub / *unit_weight),
            ObjEncoding::Constant => Ok(vec![]),
        }
    }
}

/// Variable manager of a session. Variables are handed out in increasing
/// order and never handed out twice, unless the whole session is reset.
#[derive(Debug, Clone, Copy, Default)]
pub struct VarManager {
    next_var: Var,
}

impl ManageVars for VarManager {
    fn new_var(&mut self) -> Var {
        let v = self.next_var;
        self.next_var += 1;
        v
    }

    fn max_var(&self) -> Option<Var> {
        if self.next_var == Var::new(0) {
            None
        } else {
            Some(self.next_var - 1)
        }
    }

    fn increase_next_free(&mut self, v: Var) -> bool {
        if v > self.next_var {
            self.next_var = v;
            return true;
        };
        false
    }

    fn combine(&mut self, other: Self) {
        if other.next_var > self.next_var {
            self.next_var = other.next_var;
        };
    }

    fn n_used(&self) -> u32 {
        self.next_var.idx32()
    }

    fn forget_from(&mut self, min_var: Var) {
        self.next_var = std::cmp::min(self.next_var, min_var);
    }
}
