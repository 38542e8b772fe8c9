//! # Set Cover of Simple Cycles
//!
//! A cut variable `y_e` per edge and, for every row of the [`CycleMatrix`],
//! the clause that at least one edge of the cycle is cut. A cover of minimum
//! weight over a complete enumeration is a minimum feedback arc set.

use rustsat::{
    solvers::{LimitConflicts, SolveIncremental, SolveStats},
    types::{Assignment, Clause, Lit, TernaryVal},
};

use crate::{
    cache::Symbol,
    graph::Edge,
    types::{CycleMatrix, Objective},
    Session, Step,
};

/// The cut variables of an encoded cover model
#[derive(Debug, Clone, Default)]
pub struct CoverModel {
    cuts: Vec<(Edge, usize, Lit)>,
}

impl CoverModel {
    /// The objective: the weight of all cut edges
    pub fn objective(&self) -> Objective {
        Objective::new(self.cuts.iter().map(|&(_, w, l)| (l, w)))
    }

    /// The cut edges of a model
    pub fn cut(&self, sol: &Assignment) -> Vec<(Edge, usize)> {
        self.cuts
            .iter()
            .filter(|(_, _, l)| sol.lit_value(*l) == TernaryVal::True)
            .map(|&(e, w, _)| (e, w))
            .collect()
    }
}

/// Adds the clause requiring one edge of `cycle` to be cut
pub fn encode_cycle<O, OInit>(session: &mut Session<O, OInit>, cycle: &[Edge]) -> Step
where
    O: SolveIncremental + SolveStats + LimitConflicts,
{
    let clause = cycle
        .iter()
        .map(|&e| -> Step<Lit> { Ok(session.var(Symbol::Cut(e))?.pos_lit()) })
        .collect::<Step<Clause>>()?;
    session.add(clause)
}

/// Encodes cut variables for `edges` and the cover clauses of all rows of
/// `matrix`. Cycles may only use edges from `edges`.
pub fn encode<O, OInit>(
    session: &mut Session<O, OInit>,
    edges: &[(Edge, usize)],
    matrix: &CycleMatrix,
) -> Step<CoverModel>
where
    O: SolveIncremental + SolveStats + LimitConflicts,
{
    let cuts = edges
        .iter()
        .map(|&(e, w)| -> Step<(Edge, usize, Lit)> {
            Ok((e, w, session.var(Symbol::Cut(e))?.pos_lit()))
        })
        .collect::<Step<Vec<_>>>()?;
    for cycle in matrix.iter() {
        debug_assert!(cycle.iter().all(|e| edges.iter().any(|(f, _)| f == e)));
        encode_cycle(session, cycle)?;
    }
    Ok(CoverModel { cuts })
}

#[cfg(test)]
mod tests {
    use rustsat::encodings::{card::Totalizer, pb::GeneralizedTotalizer};
    use rustsat_cadical::CaDiCaL;

    use super::encode;
    use crate::{
        graph::{Digraph, Edge, Graph},
        types::{CycleMatrix, ObjEncoding},
        KernelOptions, Session, Stage,
    };

    type TestSession = Session<CaDiCaL<'static, 'static>>;

    #[test]
    fn cover_of_disjoint_cycles() {
        let graph = Graph::from_edges([(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)]);
        let matrix: CycleMatrix = graph
            .enumerate_simple_cycles(None)
            .cycles
            .into_iter()
            .collect();
        assert_eq!(matrix.n_cycles(), 2);
        let edges: Vec<_> = graph.edges().into_iter().map(|e| (e, 1)).collect();
        let mut session = TestSession::new(KernelOptions::default());
        let model = encode(&mut session, &edges, &matrix).unwrap();
        let objective = model.objective();
        let mut encoding = ObjEncoding::<GeneralizedTotalizer, Totalizer>::new(&objective);
        let mut incumbent = None;
        assert!(session
            .minimize(&objective, &mut encoding, 0, &mut incumbent, Stage::Solving)
            .unwrap());
        let incumbent = incumbent.unwrap();
        assert_eq!(incumbent.cost, 2);
        let cut: Vec<Edge> = model
            .cut(&incumbent.solution)
            .into_iter()
            .map(|(e, _)| e)
            .collect();
        assert!(matrix.is_covered_by(&cut));
    }
}
