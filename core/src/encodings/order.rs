//! # Order Encoding of a Topological Numbering
//!
//! Every vertex incident to an edge of a snapshot gets a number in `0..n`,
//! where `n` is the number of such vertices. The number of vertex `v` is
//! represented by a ladder of literals `ge(v, k)`, meaning `order(v) >= k`,
//! for `k = 1..n`. Each edge `u -> v` is tracked under its [`EdgeKey`] and
//! requires `order(u) < order(v)`.
//!
//! A graph on `n` vertices is acyclic iff it has a topological numbering
//! into `0..n`, so the bounded domain is exact. If the snapshot is
//! unsatisfiable, the unsat core names edges whose constraints cannot hold
//! together, i.e., edges containing at least one cycle.

use rustsat::{
    clause,
    solvers::{LimitConflicts, SolveIncremental, SolveStats},
    types::{Assignment, Clause, Lit},
};

use crate::{
    cache::Symbol,
    graph::{Edge, VertexId},
    types::{EdgeKey, Snapshot},
    Session, Step,
};

/// The variables of an encoded snapshot
#[derive(Debug, Clone)]
pub struct OrderModel {
    vertices: Vec<VertexId>,
}

impl OrderModel {
    /// The size of the numbering domain
    pub fn domain(&self) -> usize {
        self.vertices.len()
    }

    /// Decodes the numbering from a model
    pub fn decode<O, OInit>(
        &self,
        session: &Session<O, OInit>,
        sol: &Assignment,
    ) -> Vec<(VertexId, usize)> {
        let n = self.domain() as u32;
        self.vertices
            .iter()
            .map(|&vertex| {
                let value = (1..n)
                    .take_while(|&threshold| {
                        session.holds(sol, Symbol::Order { vertex, threshold })
                    })
                    .count();
                (vertex, value)
            })
            .collect()
    }
}

fn ge<O, OInit>(session: &mut Session<O, OInit>, vertex: VertexId, threshold: u32) -> Step<Lit> {
    Ok(session
        .var(Symbol::Order { vertex, threshold })?
        .pos_lit())
}

/// The clauses of `order(u) < order(v)` over a domain of size `n`
fn precedence_clauses<O, OInit>(
    session: &mut Session<O, OInit>,
    edge: Edge,
    n: u32,
) -> Step<Vec<Clause>> {
    if edge.is_loop() {
        // order(u) < order(u) never holds
        return Ok(vec![Clause::new()]);
    }
    let mut clauses = Vec::with_capacity(n as usize);
    clauses.push(clause![ge(session, edge.sink, 1)?]);
    for k in 1..n - 1 {
        clauses.push(clause![
            !ge(session, edge.source, k)?,
            ge(session, edge.sink, k + 1)?
        ]);
    }
    clauses.push(clause![!ge(session, edge.source, n - 1)?]);
    Ok(clauses)
}

/// Encodes a snapshot into the innermost scope of the session
pub fn encode<O, OInit>(session: &mut Session<O, OInit>, snapshot: &Snapshot) -> Step<OrderModel>
where
    O: SolveIncremental + SolveStats + LimitConflicts,
{
    let vertices = snapshot.vertices();
    let n = vertices.len() as u32;
    // ladders
    for &v in &vertices {
        for k in 1..n.saturating_sub(1) {
            let upper = ge(session, v, k + 1)?;
            let lower = ge(session, v, k)?;
            session.add(clause![!upper, lower])?;
        }
    }
    for &(edge, _) in snapshot.edges() {
        let clauses = precedence_clauses(session, edge, n)?;
        session.assert_and_track(EdgeKey::new(edge, snapshot.round()), clauses)?;
    }
    Ok(OrderModel { vertices })
}
