use std::{cell::Cell, rc::Rc, time::Duration};

use mfas_core::{
    graph::{is_acyclic, AdjacencyMap, Digraph, Edge, Graph},
    CoverOptions, CycleCover, IncompleteOracle, Init, KernelFunctions, KernelOptions, Limits,
    MaybeTerminated, Phase, RelaxOptions, Relaxation, Selection, Solve, Status, Termination,
    TriangleOrdering, WriteSolverLog,
};
use rustsat::solvers::SolverResult;

type Oracle = rustsat_cadical::CaDiCaL<'static, 'static>;
type Relax<G = Graph> = Relaxation<G, Oracle>;
type Triangle<G = Graph> = TriangleOrdering<G, Oracle>;
type Cover<G = Graph> = CycleCover<G, Oracle>;

macro_rules! check_outcome {
    ($graph:expr, $outcome:expr) => {{
        let outcome = &$outcome;
        assert!(is_acyclic(&outcome.residual));
        assert!(outcome.is_acyclic());
        for (edge, weight) in outcome.feedback.iter() {
            assert_eq!($graph.weight(edge), Some(weight));
            assert!(!outcome.residual.has_edge(edge));
        }
        assert_eq!(
            outcome.residual.n_edges() + outcome.feedback.len(),
            $graph.n_edges()
        );
    }};
}

macro_rules! test_optimum {
    ($s:ty, $o:expr, $g:expr, $t:expr) => {{
        let graph = $g;
        let mut solver = <$s>::new(graph.clone(), $o);
        assert_eq!(solver.solve(Limits::none()).unwrap(), MaybeTerminated::Done(()));
        let outcome = solver.outcome();
        check_outcome!(graph, outcome);
        assert_eq!(outcome.status, Status::Optimal);
        assert_eq!(outcome.feedback.weight(), $t);
    }};
}

macro_rules! test_relax {
    ($o:expr, $g:expr, $t:expr) => {{
        let graph = $g;
        let mut solver = <Relax>::new(graph.clone(), $o);
        assert_eq!(solver.solve(Limits::none()).unwrap(), MaybeTerminated::Done(()));
        let outcome = solver.outcome();
        check_outcome!(graph, outcome);
        assert!(outcome.feedback.weight() >= $t);
        assert_eq!(outcome.rounds, outcome.feedback.len());
        assert!(outcome.rounds <= graph.n_edges());
        if $t == 0 {
            assert_eq!(outcome.status, Status::Optimal);
        } else {
            assert_eq!(outcome.status, Status::Feasible);
        }
    }};
}

fn nested_cycle() -> Graph {
    Graph::from_edges([(0, 1), (1, 2), (2, 3), (3, 4), (4, 1)])
}

fn chain() -> Graph {
    Graph::from_edges([(0, 1), (1, 2), (2, 3)])
}

fn two_triangles() -> Graph {
    Graph::from_edges([(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)])
}

fn weighted() -> Graph {
    Graph::from_weighted_edges([(0, 1, 5), (1, 2, 6), (2, 0, 3), (2, 3, 2), (3, 1, 4)])
}

fn self_loops() -> Graph {
    Graph::from_weighted_edges([(0, 0, 2), (0, 1, 1), (1, 0, 3), (1, 1, 1)])
}

mod relax {
    use super::*;

    #[test]
    fn nested_cycle() {
        test_relax!(RelaxOptions::default(), super::nested_cycle(), 1)
    }

    #[test]
    fn chain() {
        let mut solver = <Relax>::new(super::chain(), RelaxOptions::default());
        solver.solve(Limits::none()).unwrap();
        let outcome = solver.outcome();
        assert_eq!(outcome.rounds, 0);
        assert!(outcome.feedback.is_empty());
        assert_eq!(outcome.status, Status::Optimal);
        let numbering = solver.numbering();
        assert_eq!(numbering.len(), 4);
        let number = |v: u32| {
            numbering
                .iter()
                .find(|(w, _)| w.idx() == v as usize)
                .map(|(_, n)| *n)
                .unwrap()
        };
        assert!(number(0) < number(1));
        assert!(number(1) < number(2));
        assert!(number(2) < number(3));
    }

    #[test]
    fn two_triangles() {
        test_relax!(RelaxOptions::default(), super::two_triangles(), 2)
    }

    #[test]
    fn weighted() {
        test_relax!(
            RelaxOptions {
                selection: Selection::Lightest,
                ..RelaxOptions::default()
            },
            super::weighted(),
            5
        )
    }

    #[test]
    fn self_loops() {
        test_relax!(RelaxOptions::default(), super::self_loops(), 4)
    }

    #[test]
    fn reset_between_rounds() {
        test_relax!(
            RelaxOptions {
                kernel: KernelOptions {
                    reset_between_rounds: true,
                    ..KernelOptions::default()
                },
                ..RelaxOptions::default()
            },
            super::two_triangles(),
            2
        )
    }

    #[test]
    fn core_minimization() {
        test_relax!(
            RelaxOptions {
                kernel: KernelOptions {
                    core_trimming: true,
                    core_minimization: true,
                    ..KernelOptions::default()
                },
                selection: Selection::MostFrequent,
            },
            super::nested_cycle(),
            1
        )
    }

    #[test]
    fn residual_needs_no_rounds() {
        let mut solver = <Relax>::new(super::two_triangles(), RelaxOptions::default());
        solver.solve(Limits::none()).unwrap();
        let residual = solver.outcome().residual;
        let mut solver = <Relax>::new(residual, RelaxOptions::default());
        solver.solve(Limits::none()).unwrap();
        let outcome = solver.outcome();
        assert_eq!(outcome.rounds, 0);
        assert_eq!(outcome.status, Status::Optimal);
    }

    #[test]
    fn round_limit() {
        let mut solver = <Relax>::new(super::two_triangles(), RelaxOptions::default());
        let res = solver
            .solve(Limits {
                rounds: Some(1),
                ..Limits::none()
            })
            .unwrap();
        assert_eq!(res, MaybeTerminated::Terminated(Termination::RoundsLimit));
        let outcome = solver.outcome();
        assert_eq!(
            outcome.status,
            Status::Provisional(Termination::RoundsLimit)
        );
        assert_eq!(outcome.rounds, 1);
        assert!(!outcome.is_acyclic());

        // resumes where it stopped
        solver.solve(Limits::none()).unwrap();
        let outcome = solver.outcome();
        assert_eq!(outcome.status, Status::Feasible);
        assert!(outcome.rounds >= 2);
        assert!(outcome.is_acyclic());
    }

    #[test]
    fn oracle_call_limit() {
        let mut solver = <Relax>::new(super::two_triangles(), RelaxOptions::default());
        let res = solver
            .solve(Limits {
                oracle_calls: Some(1),
                ..Limits::none()
            })
            .unwrap();
        assert_eq!(
            res,
            MaybeTerminated::Terminated(Termination::OracleCallsLimit)
        );
        assert!(matches!(solver.outcome().status, Status::Provisional(_)));
    }

    #[test]
    fn lightest_tie_goes_to_earlier_edge() {
        // the only core is the whole triangle, ordered (0,1), (1,2), (2,0)
        let graph = Graph::from_weighted_edges([(0, 1, 3), (1, 2, 1), (2, 0, 1)]);
        let mut solver = <Relax>::new(
            graph.clone(),
            RelaxOptions {
                selection: Selection::Lightest,
                ..RelaxOptions::default()
            },
        );
        solver.solve(Limits::none()).unwrap();
        let outcome = solver.outcome();
        check_outcome!(graph, outcome);
        assert_eq!(outcome.feedback.sorted_edges(), vec![Edge::from((1, 2))]);
    }

    #[test]
    fn most_frequent_tie_goes_to_earlier_edge() {
        let graph = Graph::from_weighted_edges([(0, 1, 3), (1, 2, 1), (2, 0, 1)]);
        let mut solver = <Relax>::new(
            graph.clone(),
            RelaxOptions {
                selection: Selection::MostFrequent,
                ..RelaxOptions::default()
            },
        );
        solver.solve(Limits::none()).unwrap();
        let outcome = solver.outcome();
        check_outcome!(graph, outcome);
        assert_eq!(outcome.feedback.sorted_edges(), vec![Edge::from((0, 1))]);
    }

    #[test]
    fn deadline() {
        let mut solver = <Relax>::new(super::two_triangles(), RelaxOptions::default());
        let res = solver
            .solve(Limits {
                deadline: Some(Duration::ZERO),
                ..Limits::none()
            })
            .unwrap();
        assert_eq!(res, MaybeTerminated::Terminated(Termination::Deadline));
        let outcome = solver.outcome();
        assert_eq!(outcome.status, Status::Provisional(Termination::Deadline));
        assert!(outcome.feedback.is_empty());
        assert_eq!(solver.stats().n_oracle_calls, 0);
    }

    #[test]
    fn interrupt_then_resume() {
        let mut solver = <Relax>::new(super::self_loops(), RelaxOptions::default());
        solver.interrupter().interrupt();
        let res = solver.solve(Limits::none()).unwrap();
        assert_eq!(res, MaybeTerminated::Terminated(Termination::Interrupted));
        let outcome = solver.outcome();
        assert_eq!(
            outcome.status,
            Status::Provisional(Termination::Interrupted)
        );
        // self-loops are removed before the first termination check
        assert_eq!(
            outcome.feedback.sorted_edges(),
            vec![Edge::from((0, 0)), Edge::from((1, 1))]
        );
        assert_eq!(outcome.feedback.weight(), 3);

        // the interrupt is consumed
        assert_eq!(solver.solve(Limits::none()).unwrap(), MaybeTerminated::Done(()));
        let outcome = solver.outcome();
        check_outcome!(super::self_loops(), outcome);
        assert_eq!(outcome.status, Status::Feasible);
        assert!(outcome.feedback.weight() >= 4);
    }

    /// Tracks how deeply logged routines are nested
    struct Nesting(Rc<Cell<usize>>);

    impl WriteSolverLog for Nesting {
        fn log_round(&mut self, _: usize, _: usize) -> anyhow::Result<()> {
            Ok(())
        }
        fn log_oracle_call(&mut self, _: SolverResult) -> anyhow::Result<()> {
            Ok(())
        }
        fn log_core(&mut self, _: usize, _: usize) -> anyhow::Result<()> {
            Ok(())
        }
        fn log_removal(&mut self, _: Edge, _: usize) -> anyhow::Result<()> {
            Ok(())
        }
        fn log_candidate(&mut self, _: usize, _: Phase) -> anyhow::Result<()> {
            Ok(())
        }
        fn log_cycles(&mut self, _: usize, _: bool) -> anyhow::Result<()> {
            Ok(())
        }
        fn log_routine_start(&mut self, _: &'static str) -> anyhow::Result<()> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
        fn log_routine_end(&mut self) -> anyhow::Result<()> {
            anyhow::ensure!(self.0.get() > 0, "routine ended without start");
            self.0.set(self.0.get() - 1);
            Ok(())
        }
        fn log_message(&mut self, _: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn terminated_routines_are_closed() {
        let depth = Rc::new(Cell::new(0));
        let mut solver = <Relax>::new(super::two_triangles(), RelaxOptions::default());
        solver.attach_logger(Nesting(depth.clone()));
        let res = solver
            .solve(Limits {
                rounds: Some(1),
                ..Limits::none()
            })
            .unwrap();
        assert_eq!(res, MaybeTerminated::Terminated(Termination::RoundsLimit));
        assert_eq!(depth.get(), 0);
        solver.solve(Limits::none()).unwrap();
        assert_eq!(depth.get(), 0);

        let depth = Rc::new(Cell::new(0));
        let mut solver = <Cover>::new(super::two_triangles(), CoverOptions::default());
        solver.attach_logger(Nesting(depth.clone()));
        let res = solver
            .solve(Limits {
                oracle_calls: Some(1),
                ..Limits::none()
            })
            .unwrap();
        assert_eq!(
            res,
            MaybeTerminated::Terminated(Termination::OracleCallsLimit)
        );
        assert_eq!(depth.get(), 0);
    }

    #[test]
    fn custom_strategy() {
        // always removes the last edge of the core
        let solver = <Relax>::new(super::nested_cycle(), RelaxOptions::default());
        let mut solver =
            solver.with_strategy(|core: &[(Edge, usize)]| core[core.len() - 1].0);
        solver.solve(Limits::none()).unwrap();
        let outcome = solver.outcome();
        check_outcome!(super::nested_cycle(), outcome);
        assert_eq!(outcome.status, Status::Feasible);
    }

    #[test]
    fn adjacency_map() {
        let graph = AdjacencyMap::from_digraph(&super::two_triangles());
        let mut solver = Relax::<AdjacencyMap>::new(graph.clone(), RelaxOptions::default());
        solver.solve(Limits::none()).unwrap();
        check_outcome!(graph, solver.outcome());
    }
}

mod triangle {
    use super::*;

    #[test]
    fn nested_cycle() {
        test_optimum!(Triangle, KernelOptions::default(), super::nested_cycle(), 1)
    }

    #[test]
    fn chain() {
        test_optimum!(Triangle, KernelOptions::default(), super::chain(), 0)
    }

    #[test]
    fn two_triangles() {
        test_optimum!(Triangle, KernelOptions::default(), super::two_triangles(), 2)
    }

    #[test]
    fn weighted() {
        test_optimum!(Triangle, KernelOptions::default(), super::weighted(), 5)
    }

    #[test]
    fn self_loops() {
        test_optimum!(Triangle, KernelOptions::default(), super::self_loops(), 4)
    }

    #[test]
    fn adjacency_map() {
        test_optimum!(
            Triangle<AdjacencyMap>,
            KernelOptions::default(),
            AdjacencyMap::from_digraph(&super::two_triangles()),
            2
        )
    }
}

mod cover {
    use super::*;

    #[test]
    fn nested_cycle() {
        test_optimum!(Cover, CoverOptions::default(), super::nested_cycle(), 1)
    }

    #[test]
    fn chain() {
        test_optimum!(Cover, CoverOptions::default(), super::chain(), 0)
    }

    #[test]
    fn two_triangles() {
        test_optimum!(Cover, CoverOptions::default(), super::two_triangles(), 2)
    }

    #[test]
    fn weighted() {
        test_optimum!(Cover, CoverOptions::default(), super::weighted(), 5)
    }

    #[test]
    fn self_loops() {
        test_optimum!(Cover, CoverOptions::default(), super::self_loops(), 4)
    }

    #[test]
    fn refine_truncated() {
        test_optimum!(
            Cover,
            CoverOptions {
                max_cycles: Some(1),
                on_incomplete: IncompleteOracle::Refine,
                ..CoverOptions::default()
            },
            super::weighted(),
            5
        )
    }

    #[test]
    fn adjacency_map() {
        test_optimum!(
            Cover<AdjacencyMap>,
            CoverOptions::default(),
            AdjacencyMap::from_digraph(&super::weighted()),
            5
        )
    }
}

/// Random graphs checked against exhaustive search
mod random {
    use super::*;

    /// Linear congruential generator, enough for reproducible test graphs
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            self.0 >> 33
        }
    }

    fn random_graph(seed: u64, n: u32, max_edges: usize) -> Graph {
        let mut rng = Lcg(seed);
        let mut edges = vec![];
        for u in 0..n {
            for v in 0..n {
                if u != v && rng.next() % 3 == 0 && edges.len() < max_edges {
                    edges.push((u, v, (rng.next() % 4 + 1) as usize));
                }
            }
        }
        let mut graph = Graph::from_weighted_edges(edges);
        // keep all vertices even if the last ones have no edges
        for idx in 0..n {
            graph.add_vertex(idx.to_string());
        }
        graph
    }

    fn brute_force(graph: &Graph) -> usize {
        let edges = graph.edges();
        let mut best = graph.total_weight();
        for mask in 0u32..(1 << edges.len()) {
            let mut residual = graph.clone();
            let mut weight = 0;
            for (idx, &edge) in edges.iter().enumerate() {
                if mask & (1 << idx) != 0 {
                    weight += residual.remove_edge(edge).unwrap();
                }
            }
            if weight < best && is_acyclic(&residual) {
                best = weight;
            }
        }
        best
    }

    #[test]
    fn matches_exhaustive_search() {
        for seed in 0..12 {
            let graph = random_graph(seed, 5, 12);
            let truth = brute_force(&graph);
            test_optimum!(Triangle, KernelOptions::default(), graph.clone(), truth);
            test_optimum!(Cover, CoverOptions::default(), graph.clone(), truth);
            test_relax!(RelaxOptions::default(), graph, truth);
        }
    }
}
