//! # Graph Capability Layer
//!
//! The algorithms only see a graph through the [`Digraph`] trait. [`Graph`]
//! is the default implementation on top of a [`petgraph`] stable graph,
//! [`AdjacencyMap`] is a lightweight alternative with ordered successor maps.
//!
//! Acyclicity is checked with [`petgraph::algo::toposort`], independently of
//! the SAT encodings and of the cycle enumeration in this module.

use std::{collections::BTreeMap, fmt};

use petgraph::{
    algo::{tarjan_scc, toposort},
    graph::DiGraph,
    graphmap::DiGraphMap,
    stable_graph::{NodeIndex, StableDiGraph},
};
use rustsat::types::RsHashMap;

/// Identifier of a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(u32);

impl VertexId {
    pub fn new(idx: u32) -> Self {
        VertexId(idx)
    }

    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directed edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub source: VertexId,
    pub sink: VertexId,
}

impl Edge {
    pub fn new(source: VertexId, sink: VertexId) -> Self {
        Edge { source, sink }
    }

    pub fn is_loop(&self) -> bool {
        self.source == self.sink
    }
}

impl From<(u32, u32)> for Edge {
    fn from((source, sink): (u32, u32)) -> Self {
        Edge::new(VertexId(source), VertexId(sink))
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source, self.sink)
    }
}

/// Dense adjacency matrix over the vertices of a graph in ascending order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjacencyMatrix {
    vertices: Vec<VertexId>,
    weights: Vec<usize>,
}

impl AdjacencyMatrix {
    pub fn n(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertex(&self, idx: usize) -> VertexId {
        self.vertices[idx]
    }

    pub fn index_of(&self, vertex: VertexId) -> Option<usize> {
        self.vertices.binary_search(&vertex).ok()
    }

    /// The weight of the edge from the `i`-th to the `j`-th vertex, zero if absent
    pub fn weight(&self, i: usize, j: usize) -> usize {
        self.weights[i * self.n() + j]
    }

    pub fn has_edge(&self, i: usize, j: usize) -> bool {
        self.weight(i, j) > 0
    }
}

/// The result of enumerating simple cycles
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CycleEnumeration {
    /// Each cycle as the sequence of its edges
    pub cycles: Vec<Vec<Edge>>,
    /// False if the enumeration stopped at the limit with cycles left over
    pub complete: bool,
}

/// Read and edge-removal access to a directed graph with positive edge weights
pub trait Digraph {
    /// All vertices in ascending order
    fn vertices(&self) -> Vec<VertexId>;
    /// All edges ordered by (source, sink)
    fn edges(&self) -> Vec<Edge>;
    fn has_edge(&self, edge: Edge) -> bool;
    /// The weight of an edge, [`None`] if the edge does not exist
    fn weight(&self, edge: Edge) -> Option<usize>;
    /// Removes an edge, returning its weight if it existed
    fn remove_edge(&mut self, edge: Edge) -> Option<usize>;

    /// A human readable name of a vertex
    fn label(&self, vertex: VertexId) -> String {
        vertex.to_string()
    }

    fn n_vertices(&self) -> usize {
        self.vertices().len()
    }

    fn n_edges(&self) -> usize {
        self.edges().len()
    }

    fn total_weight(&self) -> usize {
        self.edges()
            .into_iter()
            .filter_map(|e| self.weight(e))
            .sum()
    }

    fn adjacency_matrix(&self) -> AdjacencyMatrix {
        let vertices = self.vertices();
        let n = vertices.len();
        let mut weights = vec![0; n * n];
        for edge in self.edges() {
            let (Ok(i), Ok(j)) = (
                vertices.binary_search(&edge.source),
                vertices.binary_search(&edge.sink),
            ) else {
                continue;
            };
            weights[i * n + j] = self.weight(edge).unwrap_or(0);
        }
        AdjacencyMatrix { vertices, weights }
    }

    /// Enumerates simple cycles with Johnson's algorithm, stopping after
    /// `limit` cycles if given
    fn enumerate_simple_cycles(&self, limit: Option<usize>) -> CycleEnumeration {
        let vertices = self.vertices();
        let mut adj = vec![vec![]; vertices.len()];
        for edge in self.edges() {
            let (Ok(i), Ok(j)) = (
                vertices.binary_search(&edge.source),
                vertices.binary_search(&edge.sink),
            ) else {
                continue;
            };
            adj[i].push(j);
        }
        let mut circuits = Circuits::new(&adj, limit);
        circuits.run();
        let cycles = circuits
            .cycles
            .into_iter()
            .map(|cycle| {
                (0..cycle.len())
                    .map(|k| {
                        Edge::new(vertices[cycle[k]], vertices[cycle[(k + 1) % cycle.len()]])
                    })
                    .collect()
            })
            .collect();
        CycleEnumeration {
            cycles,
            complete: !circuits.truncated,
        }
    }
}

/// Computes a topological order of a graph, [`None`] if the graph has a cycle
/// (including a self-loop)
pub fn topological_order<G: Digraph + ?Sized>(graph: &G) -> Option<Vec<VertexId>> {
    let mut check = DiGraphMap::<VertexId, ()>::new();
    for v in graph.vertices() {
        check.add_node(v);
    }
    for e in graph.edges() {
        check.add_edge(e.source, e.sink, ());
    }
    toposort(&check, None).ok()
}

pub fn is_acyclic<G: Digraph + ?Sized>(graph: &G) -> bool {
    topological_order(graph).is_some()
}

/// State of Johnson's circuit enumeration over dense vertex indices
struct Circuits<'a> {
    adj: &'a [Vec<usize>],
    limit: Option<usize>,
    start: usize,
    component: Vec<bool>,
    blocked: Vec<bool>,
    blocked_by: Vec<Vec<usize>>,
    stack: Vec<usize>,
    cycles: Vec<Vec<usize>>,
    truncated: bool,
}

impl<'a> Circuits<'a> {
    fn new(adj: &'a [Vec<usize>], limit: Option<usize>) -> Self {
        let n = adj.len();
        Circuits {
            adj,
            limit,
            start: 0,
            component: vec![false; n],
            blocked: vec![false; n],
            blocked_by: vec![vec![]; n],
            stack: vec![],
            cycles: vec![],
            truncated: false,
        }
    }

    fn run(&mut self) {
        let n = self.adj.len();
        for start in 0..n {
            self.start = start;
            self.restrict_to_component(start);
            let has_loop = self.adj[start].contains(&start);
            if !has_loop && self.component.iter().filter(|&&c| c).count() < 2 {
                continue;
            }
            self.blocked.iter_mut().for_each(|b| *b = false);
            self.blocked_by.iter_mut().for_each(Vec::clear);
            self.circuit(start);
            if self.truncated {
                return;
            }
        }
    }

    /// Marks the strongly connected component of `start` in the subgraph
    /// induced by the vertices `start..n`
    fn restrict_to_component(&mut self, start: usize) {
        let n = self.adj.len();
        let mut sub = DiGraph::<(), ()>::with_capacity(n, 0);
        for _ in 0..n {
            sub.add_node(());
        }
        for (v, succs) in self.adj.iter().enumerate().skip(start) {
            for &w in succs {
                if w >= start {
                    sub.add_edge(NodeIndex::new(v), NodeIndex::new(w), ());
                }
            }
        }
        self.component.iter_mut().for_each(|c| *c = false);
        for scc in tarjan_scc(&sub) {
            if scc.contains(&NodeIndex::new(start)) {
                for node in scc {
                    self.component[node.index()] = true;
                }
                break;
            }
        }
    }

    fn circuit(&mut self, v: usize) -> bool {
        let adj = self.adj;
        let mut found = false;
        self.stack.push(v);
        self.blocked[v] = true;
        for &w in &adj[v] {
            if !self.component[w] {
                continue;
            }
            if w == self.start {
                if self.limit.is_some_and(|lim| self.cycles.len() >= lim) {
                    self.truncated = true;
                } else {
                    self.cycles.push(self.stack.clone());
                }
                found = true;
            } else if !self.blocked[w] && self.circuit(w) {
                found = true;
            }
            if self.truncated {
                break;
            }
        }
        if found {
            self.unblock(v);
        } else {
            for &w in &adj[v] {
                if self.component[w] && !self.blocked_by[w].contains(&v) {
                    self.blocked_by[w].push(v);
                }
            }
        }
        self.stack.pop();
        found
    }

    fn unblock(&mut self, v: usize) {
        self.blocked[v] = false;
        let mut todo = vec![v];
        while let Some(u) = todo.pop() {
            for w in std::mem::take(&mut self.blocked_by[u]) {
                if self.blocked[w] {
                    self.blocked[w] = false;
                    todo.push(w);
                }
            }
        }
    }
}

/// A labelled, weighted directed graph backed by [`petgraph`]. Vertices are
/// never removed, so vertex identifiers stay valid. Parallel edges are merged
/// by adding up their weights.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    inner: StableDiGraph<String, usize>,
    by_label: RsHashMap<String, VertexId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph with unit weights over vertices `0..=max`
    pub fn from_edges<I: IntoIterator<Item = (u32, u32)>>(edges: I) -> Self {
        Self::from_weighted_edges(edges.into_iter().map(|(u, v)| (u, v, 1)))
    }

    /// Builds a graph over vertices `0..=max`, vertex `i` has label `i`
    pub fn from_weighted_edges<I: IntoIterator<Item = (u32, u32, usize)>>(edges: I) -> Self {
        let edges: Vec<_> = edges.into_iter().collect();
        let mut graph = Graph::new();
        if let Some(max) = edges.iter().map(|&(u, v, _)| u.max(v)).max() {
            for idx in 0..=max {
                graph.add_vertex(idx.to_string());
            }
        }
        for (u, v, w) in edges {
            graph.add_edge(VertexId(u), VertexId(v), w);
        }
        graph
    }

    /// Gets the vertex with a given label, adding it if needed
    pub fn add_vertex<S: Into<String>>(&mut self, label: S) -> VertexId {
        let label = label.into();
        if let Some(&v) = self.by_label.get(&label) {
            return v;
        }
        let node = self.inner.add_node(label.clone());
        let v = VertexId(node.index() as u32);
        self.by_label.insert(label, v);
        v
    }

    /// Adds an edge between existing vertices
    ///
    /// # Panics
    ///
    /// If one of the vertices does not exist, or if merging with a parallel
    /// edge overflows the weight
    pub fn add_edge(&mut self, source: VertexId, sink: VertexId, weight: usize) {
        if self.try_add_edge(source, sink, weight).is_none() {
            panic!("weight of edge {source} -> {sink} overflows");
        }
    }

    /// Adds an edge between existing vertices, [`None`] if merging with a
    /// parallel edge overflows the weight. The graph is unchanged in that case.
    pub fn try_add_edge(&mut self, source: VertexId, sink: VertexId, weight: usize) -> Option<()> {
        debug_assert!(weight > 0, "edge weights are positive");
        let (a, b) = (node(source), node(sink));
        if let Some(idx) = self.inner.find_edge(a, b) {
            self.inner[idx] = self.inner[idx].checked_add(weight)?;
        } else {
            self.inner.add_edge(a, b, weight);
        }
        Some(())
    }

    /// Adds an edge between vertices given by label, adding the vertices if needed
    pub fn add_labelled_edge(&mut self, source: &str, sink: &str, weight: usize) -> Edge {
        let source = self.add_vertex(source);
        let sink = self.add_vertex(sink);
        self.add_edge(source, sink, weight);
        Edge::new(source, sink)
    }

    /// Like [`Graph::add_labelled_edge`], [`None`] if the merged weight overflows
    pub fn try_add_labelled_edge(
        &mut self,
        source: &str,
        sink: &str,
        weight: usize,
    ) -> Option<Edge> {
        let source = self.add_vertex(source);
        let sink = self.add_vertex(sink);
        self.try_add_edge(source, sink, weight)?;
        Some(Edge::new(source, sink))
    }

    pub fn vertex(&self, label: &str) -> Option<VertexId> {
        self.by_label.get(label).copied()
    }

    /// Finds an edge by the labels of its endpoints
    pub fn edge(&self, source: &str, sink: &str) -> Option<Edge> {
        let edge = Edge::new(self.vertex(source)?, self.vertex(sink)?);
        self.has_edge(edge).then_some(edge)
    }
}

fn node(v: VertexId) -> NodeIndex {
    NodeIndex::new(v.idx())
}

impl Digraph for Graph {
    fn vertices(&self) -> Vec<VertexId> {
        let mut vertices: Vec<_> = self
            .inner
            .node_indices()
            .map(|n| VertexId(n.index() as u32))
            .collect();
        vertices.sort_unstable();
        vertices
    }

    fn edges(&self) -> Vec<Edge> {
        let mut edges: Vec<_> = self
            .inner
            .edge_indices()
            .filter_map(|idx| self.inner.edge_endpoints(idx))
            .map(|(a, b)| Edge::new(VertexId(a.index() as u32), VertexId(b.index() as u32)))
            .collect();
        edges.sort_unstable();
        edges
    }

    fn has_edge(&self, edge: Edge) -> bool {
        self.weight(edge).is_some()
    }

    fn weight(&self, edge: Edge) -> Option<usize> {
        let (a, b) = (node(edge.source), node(edge.sink));
        if !self.inner.contains_node(a) || !self.inner.contains_node(b) {
            return None;
        }
        let idx = self.inner.find_edge(a, b)?;
        self.inner.edge_weight(idx).copied()
    }

    fn remove_edge(&mut self, edge: Edge) -> Option<usize> {
        let (a, b) = (node(edge.source), node(edge.sink));
        if !self.inner.contains_node(a) || !self.inner.contains_node(b) {
            return None;
        }
        let idx = self.inner.find_edge(a, b)?;
        self.inner.remove_edge(idx)
    }

    fn label(&self, vertex: VertexId) -> String {
        self.inner
            .node_weight(node(vertex))
            .cloned()
            .unwrap_or_else(|| vertex.to_string())
    }

    fn n_vertices(&self) -> usize {
        self.inner.node_count()
    }

    fn n_edges(&self) -> usize {
        self.inner.edge_count()
    }
}

/// A graph stored as ordered successor maps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdjacencyMap {
    succs: BTreeMap<VertexId, BTreeMap<VertexId, usize>>,
}

impl AdjacencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies any other graph
    pub fn from_digraph<G: Digraph + ?Sized>(graph: &G) -> Self {
        let mut map = AdjacencyMap::new();
        for v in graph.vertices() {
            map.add_vertex(v);
        }
        for e in graph.edges() {
            map.add_edge(e, graph.weight(e).unwrap_or(1));
        }
        map
    }

    pub fn add_vertex(&mut self, vertex: VertexId) {
        self.succs.entry(vertex).or_default();
    }

    /// Adds an edge, merging it with an existing parallel edge
    pub fn add_edge(&mut self, edge: Edge, weight: usize) {
        self.add_vertex(edge.sink);
        *self
            .succs
            .entry(edge.source)
            .or_default()
            .entry(edge.sink)
            .or_default() += weight;
    }
}

impl Digraph for AdjacencyMap {
    fn vertices(&self) -> Vec<VertexId> {
        self.succs.keys().copied().collect()
    }

    fn edges(&self) -> Vec<Edge> {
        self.succs
            .iter()
            .flat_map(|(&u, succs)| succs.keys().map(move |&v| Edge::new(u, v)))
            .collect()
    }

    fn has_edge(&self, edge: Edge) -> bool {
        self.weight(edge).is_some()
    }

    fn weight(&self, edge: Edge) -> Option<usize> {
        self.succs.get(&edge.source)?.get(&edge.sink).copied()
    }

    fn remove_edge(&mut self, edge: Edge) -> Option<usize> {
        self.succs.get_mut(&edge.source)?.remove(&edge.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::{is_acyclic, topological_order, AdjacencyMap, Digraph, Edge, Graph, VertexId};

    fn complete(n: u32) -> Graph {
        Graph::from_edges((0..n).flat_map(|u| (0..n).filter(move |&v| v != u).map(move |v| (u, v))))
    }

    #[test]
    fn labelled_vertices() {
        let mut graph = Graph::new();
        let e = graph.add_labelled_edge("A", "B", 1);
        graph.add_labelled_edge("B", "C", 1);
        assert_eq!(graph.n_vertices(), 3);
        assert_eq!(graph.label(e.source), "A");
        assert_eq!(graph.edge("A", "B"), Some(e));
        assert_eq!(graph.edge("B", "A"), None);
    }

    #[test]
    fn parallel_edges_merge() {
        let mut graph = Graph::from_weighted_edges([(0, 1, 2), (0, 1, 3)]);
        assert_eq!(graph.n_edges(), 1);
        assert_eq!(graph.weight(Edge::from((0, 1))), Some(5));
        assert_eq!(graph.remove_edge(Edge::from((0, 1))), Some(5));
        assert_eq!(graph.remove_edge(Edge::from((0, 1))), None);
        assert_eq!(graph.n_vertices(), 2);
    }

    #[test]
    fn merge_overflow_keeps_weight() {
        let mut graph = Graph::from_weighted_edges([(0, 1, usize::MAX)]);
        assert_eq!(graph.try_add_labelled_edge("0", "1", 1), None);
        assert_eq!(graph.weight(Edge::from((0, 1))), Some(usize::MAX));
        assert!(graph.try_add_labelled_edge("1", "0", 1).is_some());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic]
    fn zero_weight_edge() {
        Graph::from_weighted_edges([(0, 1, 0)]);
    }

    #[test]
    fn acyclicity() {
        assert!(is_acyclic(&Graph::from_edges([(0, 1), (1, 2), (0, 2)])));
        assert!(!is_acyclic(&Graph::from_edges([(0, 1), (1, 2), (2, 0)])));
        assert!(!is_acyclic(&Graph::from_edges([(0, 1), (1, 1)])));
        let order = topological_order(&Graph::from_edges([(2, 1), (1, 0)])).unwrap();
        assert_eq!(order, vec![VertexId::new(2), VertexId::new(1), VertexId::new(0)]);
    }

    #[test]
    fn cycles_of_triangle() {
        let graph = Graph::from_edges([(0, 1), (1, 2), (2, 0), (0, 2)]);
        let cycles = graph.enumerate_simple_cycles(None);
        assert!(cycles.complete);
        assert_eq!(cycles.cycles.len(), 2);
        for cycle in &cycles.cycles {
            for (k, e) in cycle.iter().enumerate() {
                assert_eq!(e.sink, cycle[(k + 1) % cycle.len()].source);
            }
        }
    }

    #[test]
    fn cycles_of_complete_graph() {
        // 6 two-cycles, 8 three-cycles and 6 four-cycles
        let cycles = complete(4).enumerate_simple_cycles(None);
        assert!(cycles.complete);
        assert_eq!(cycles.cycles.len(), 20);
    }

    #[test]
    fn cycle_limit() {
        let graph = complete(4);
        let cycles = graph.enumerate_simple_cycles(Some(5));
        assert!(!cycles.complete);
        assert_eq!(cycles.cycles.len(), 5);
        let cycles = graph.enumerate_simple_cycles(Some(20));
        assert!(cycles.complete);
        assert_eq!(cycles.cycles.len(), 20);
    }

    #[test]
    fn self_loop_is_cycle() {
        let graph = Graph::from_edges([(0, 0), (0, 1)]);
        let cycles = graph.enumerate_simple_cycles(None);
        assert_eq!(cycles.cycles, vec![vec![Edge::from((0, 0))]]);
    }

    #[test]
    fn acyclic_has_no_cycles() {
        let graph = Graph::from_edges([(0, 1), (1, 2), (0, 2), (2, 3)]);
        let cycles = graph.enumerate_simple_cycles(None);
        assert!(cycles.complete);
        assert!(cycles.cycles.is_empty());
    }

    #[test]
    fn adjacency_map_mirrors_graph() {
        let graph = Graph::from_weighted_edges([(0, 1, 2), (1, 0, 1), (1, 2, 4)]);
        let mut map = AdjacencyMap::from_digraph(&graph);
        assert_eq!(map.edges(), graph.edges());
        assert_eq!(map.total_weight(), 7);
        assert_eq!(map.enumerate_simple_cycles(None).cycles.len(), 1);
        map.remove_edge(Edge::from((1, 0)));
        assert!(is_acyclic(&map));
        let matrix = map.adjacency_matrix();
        assert_eq!(matrix.weight(1, 2), 4);
        assert!(!matrix.has_edge(1, 0));
    }
}
