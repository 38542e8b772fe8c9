//! # Pairwise Ordering Encoding with Triangle Inequalities
//!
//! For vertices `i < j` (in ascending [`VertexId`] order) a variable `y_ij`
//! states that `i` precedes `j`. For every triple `i < j < k` the triangle
//! inequalities
//!
//! - `y_ij + y_jk - y_ik <= 1`, i.e., `(!y_ij | !y_jk | y_ik)`,
//! - `-y_ij - y_jk + y_ik <= 0`, i.e., `(!y_ik | y_ij | y_jk)`,
//!
//! make every assignment a linear order. An edge is violated if its sink
//! precedes its source; the violated edges of a linear order form a feedback
//! arc set, and the order minimizing their weight gives a minimum one.

use itertools::Itertools;
use rustsat::{
    clause,
    solvers::{LimitConflicts, SolveIncremental, SolveStats},
    types::{Assignment, Lit, TernaryVal},
};

use crate::{
    cache::Symbol,
    graph::{AdjacencyMatrix, Edge, VertexId},
    types::Objective,
    Session, Stage, Step,
};

/// The variables of an encoded pairwise ordering model
#[derive(Debug, Clone)]
pub struct TriangleModel {
    /// Each edge with its weight and the literal that is true iff the edge is violated
    violations: Vec<(Edge, usize, Lit)>,
    /// Self-loops are violated by every order
    self_loops: Vec<(Edge, usize)>,
}

impl TriangleModel {
    /// The objective over edge violations, without self-loops
    pub fn objective(&self) -> Objective {
        Objective::new(self.violations.iter().map(|&(_, w, l)| (l, w)))
    }

    pub fn self_loops(&self) -> &[(Edge, usize)] {
        &self.self_loops
    }

    /// The weight of all self-loops
    pub fn offset(&self) -> usize {
        self.self_loops.iter().map(|(_, w)| w).sum()
    }

    /// The edges violated in a model, self-loops included
    pub fn violated(&self, sol: &Assignment) -> Vec<(Edge, usize)> {
        self.self_loops
            .iter()
            .copied()
            .chain(
                self.violations
                    .iter()
                    .filter(|(_, _, l)| sol.lit_value(*l) == TernaryVal::True)
                    .map(|&(e, w, _)| (e, w)),
            )
            .collect()
    }
}

/// Literal stating that `first` precedes `second`, for any two distinct vertices
pub fn precedes<O, OInit>(
    session: &mut Session<O, OInit>,
    first: VertexId,
    second: VertexId,
) -> Step<Lit> {
    debug_assert_ne!(first, second);
    if first < second {
        Ok(session.var(Symbol::Precedes { first, second })?.pos_lit())
    } else {
        Ok(!session
            .var(Symbol::Precedes {
                first: second,
                second: first,
            })?
            .pos_lit())
    }
}

/// Adds the triangle inequalities of all triples of `vertices`, which must be ascending
pub fn encode_transitivity<O, OInit>(
    session: &mut Session<O, OInit>,
    vertices: &[VertexId],
) -> Step
where
    O: SolveIncremental + SolveStats + LimitConflicts,
{
    debug_assert!(vertices.windows(2).all(|w| w[0] < w[1]));
    for (&i, &j, &k) in vertices.iter().tuple_combinations() {
        let y_ij = precedes(session, i, j)?;
        let y_jk = precedes(session, j, k)?;
        let y_ik = precedes(session, i, k)?;
        session.add(clause![!y_ij, !y_jk, y_ik])?;
        session.add(clause![!y_ik, y_ij, y_jk])?;
    }
    Ok(())
}

/// Encodes the pairwise ordering model of a graph given by its adjacency matrix
pub fn encode<O, OInit>(
    session: &mut Session<O, OInit>,
    matrix: &AdjacencyMatrix,
) -> Step<TriangleModel>
where
    O: SolveIncremental + SolveStats + LimitConflicts,
{
    let vertices: Vec<_> = (0..matrix.n()).map(|i| matrix.vertex(i)).collect();
    encode_transitivity(session, &vertices)?;
    let mut violations = vec![];
    let mut self_loops = vec![];
    for (i, &source) in vertices.iter().enumerate() {
        for (j, &sink) in vertices.iter().enumerate() {
            if !matrix.has_edge(i, j) {
                continue;
            }
            let edge = Edge::new(source, sink);
            if i == j {
                self_loops.push((edge, matrix.weight(i, j)));
                continue;
            }
            // violated iff the sink precedes the source
            let violated = precedes(session, sink, source)?;
            violations.push((edge, matrix.weight(i, j), violated));
        }
    }
    Ok(TriangleModel {
        violations,
        self_loops,
    })
}

/// Assumptions fixing every `y_ij` to whether the edge `i -> j` exists
pub fn adjacency_pins<O, OInit>(
    session: &mut Session<O, OInit>,
    matrix: &AdjacencyMatrix,
) -> Step<Vec<Lit>> {
    let mut pins = vec![];
    for (i, j) in (0..matrix.n()).tuple_combinations() {
        let y_ij = precedes(session, matrix.vertex(i), matrix.vertex(j))?;
        pins.push(if matrix.has_edge(i, j) { y_ij } else { !y_ij });
    }
    Ok(pins)
}

/// Checks in a fresh scope whether the triangle inequalities accept a single
/// pinned triple `(y_ij, y_jk, y_ik)`
pub fn accepts<O, OInit>(
    session: &mut Session<O, OInit>,
    y_ij: bool,
    y_jk: bool,
    y_ik: bool,
) -> Step<bool>
where
    O: SolveIncremental + SolveStats + LimitConflicts,
{
    let [i, j, k] = [0, 1, 2].map(VertexId::new);
    session.push()?;
    encode_transitivity(session, &[i, j, k])?;
    let pins = [
        (precedes(session, i, j)?, y_ij),
        (precedes(session, j, k)?, y_jk),
        (precedes(session, i, k)?, y_ik),
    ]
    .map(|(lit, val)| if val { lit } else { !lit });
    let accepted = session.decide_under(&pins, Stage::Encoding, 0)?;
    session.pop()?;
    Ok(accepted)
}
