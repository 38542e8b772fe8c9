use libtest_mimic::{Arguments, Failed};
use mfas_core::{
    graph::Graph, CoverOptions, CycleCover, Init, KernelOptions, Limits, MaybeTerminated,
    Outcome, RelaxOptions, Relaxation, Selection, Solve, TriangleOrdering,
};

use setup::{Expect, TestSetup};

type Oracle = rustsat_cadical::CaDiCaL<'static, 'static>;

fn main() {
    let args = Arguments::from_args();
    let mut tests = vec![];

    let vars = [
        ("", KernelOptions::default()),
        (
            "core-trim",
            KernelOptions {
                core_trimming: true,
                ..KernelOptions::default()
            },
        ),
        (
            "core-min",
            KernelOptions {
                core_minimization: true,
                ..KernelOptions::default()
            },
        ),
        (
            "reset",
            KernelOptions {
                reset_between_rounds: true,
                ..KernelOptions::default()
            },
        ),
    ];

    for (id, kernel) in vars {
        for (sel_id, selection) in [
            ("first", Selection::First),
            ("lightest", Selection::Lightest),
            ("most-frequent", Selection::MostFrequent),
        ] {
            let variant = if id.is_empty() {
                sel_id.to_string()
            } else {
                format!("{id}-{sel_id}")
            };
            tests.extend(
                TestSetup::new(
                    "relax",
                    variant,
                    run_test::<Relaxation<Graph, Oracle>>,
                    RelaxOptions { kernel, selection },
                    Expect::UpperBound,
                )
                .collect_tests(),
            );
        }
        tests.extend(
            TestSetup::new(
                "triangle",
                id.to_string(),
                run_test::<TriangleOrdering<Graph, Oracle>>,
                kernel,
                Expect::Optimum,
            )
            .collect_tests(),
        );
        tests.extend(
            TestSetup::new(
                "cover",
                id.to_string(),
                run_test::<CycleCover<Graph, Oracle>>,
                CoverOptions {
                    kernel,
                    ..CoverOptions::default()
                },
                Expect::Optimum,
            )
            .collect_tests(),
        );
    }

    libtest_mimic::run(&args, tests).exit();
}

fn run_test<Alg>(graph: Graph, opts: <Alg as Init>::Options) -> Result<Outcome<Graph>, Failed>
where
    Alg: Init + Solve<Graph = Graph>,
{
    let mut alg = Alg::new(graph, opts);
    match alg.solve(Limits::none()) {
        Ok(MaybeTerminated::Done(_)) => (),
        Ok(MaybeTerminated::Terminated(t)) => {
            return Err(format!("solving terminated early: {t}").into())
        }
        Err(e) => return Err(format!("solving error: {e}").into()),
    }
    Ok(alg.outcome())
}

mod setup {
    use std::{
        ffi::OsStr,
        fs::File,
        io::{BufRead, BufReader},
        path::Path,
    };

    use libtest_mimic::{Failed, Trial};
    use mfas_core::{
        graph::{is_acyclic, Digraph, Graph},
        parse::{self, FileFormat},
        Outcome, Status,
    };

    /// What an algorithm guarantees about the weight of its result
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Expect {
        /// The weight is the minimum
        Optimum,
        /// The weight is at least the minimum
        UpperBound,
    }

    pub struct TestSetup<F, O> {
        run_fn: F,
        opts: O,
        alg: &'static str,
        variant: String,
        expect: Expect,
    }

    impl<F, O> TestSetup<F, O>
    where
        F: Fn(Graph, O) -> Result<Outcome<Graph>, Failed> + Clone + Send + 'static,
        O: Clone + Send + 'static,
    {
        pub fn new(alg: &'static str, variant: String, run_fn: F, opts: O, expect: Expect) -> Self {
            Self {
                run_fn,
                opts,
                alg,
                variant,
                expect,
            }
        }

        fn kind(&self) -> String {
            format!(
                "{}{}{}",
                self.alg,
                if self.variant.is_empty() { "" } else { ":" },
                self.variant
            )
        }

        pub fn collect_tests(self) -> Vec<Trial> {
            let manifest_dir = env!("CARGO_MANIFEST_DIR");
            let mut tests = vec![];
            for entry in std::fs::read_dir(format!("{manifest_dir}/data/"))
                .expect("failed to find test instances")
            {
                let entry = entry.unwrap();
                let file_type = entry.file_type().unwrap();
                let path = entry.path();
                if file_type.is_file() {
                    match path.extension() {
                        Some(ext) if ext == OsStr::new("graph") || ext == OsStr::new("adj") => {
                            let name = path.file_stem().unwrap().to_str().unwrap().to_string();
                            let ignored = is_ignored(&path, self.alg);
                            let run_fn = self.run_fn.clone();
                            let opts = self.opts.clone();
                            let expect = self.expect;
                            tests.push(
                                Trial::test(name, move || run_test(&path, run_fn, opts, expect))
                                    .with_kind(self.kind())
                                    .with_ignored_flag(ignored),
                            );
                        }
                        _ => eprintln!("skipping file `{path:?}`"),
                    }
                } else if file_type.is_dir() {
                    eprintln!("skipping subdir `{path:?}`");
                }
            }
            tests
        }
    }

    /// Reads the leading comment block for an `ignore-test` marker
    fn is_ignored(path: &Path, alg: &str) -> bool {
        for line in header(path) {
            let line = line.trim();
            if line == "ignore-test" {
                return true;
            }
            if let Some(which) = line.strip_prefix("ignore-test:") {
                if which.trim() == alg {
                    return true;
                }
            }
        }
        false
    }

    /// The minimum feedback arc set weight noted in the file
    fn expected_weight(path: &Path) -> usize {
        for line in header(path) {
            if let Some(weight) = line.trim().strip_prefix("mfas:") {
                return weight
                    .trim()
                    .parse()
                    .expect("invalid mfas weight in test instance");
            }
        }
        panic!("test instance {path:?} does not note its mfas weight")
    }

    /// The comment lines at the start of a file, without comment markers
    fn header(path: &Path) -> Vec<String> {
        let mut lines = vec![];
        for line in BufReader::new(File::open(path).expect("failed to open instance file")).lines()
        {
            let line = line.expect("failed to read test config");
            let Some(line) = line.strip_prefix('#').or_else(|| line.strip_prefix('%')) else {
                break;
            };
            lines.push(line.to_string());
        }
        lines
    }

    fn run_test<F, O>(path: &Path, run_fn: F, opts: O, expect: Expect) -> Result<(), Failed>
    where
        F: Fn(Graph, O) -> Result<Outcome<Graph>, Failed>,
    {
        let truth = expected_weight(path);
        let graph = parse::parse(path, FileFormat::Infer)
            .map_err(|e| Failed::from(format!("failed to parse instance: {e:#}")))?;
        let n_edges = graph.n_edges();
        let outcome = run_fn(graph.clone(), opts)?;
        check_outcome(&graph, &outcome)?;
        if outcome.rounds > n_edges {
            return Err(format!("{} rounds for {n_edges} edges", outcome.rounds).into());
        }
        let weight = outcome.feedback.weight();
        match expect {
            Expect::Optimum => {
                if outcome.status != Status::Optimal {
                    return Err(format!("expected optimal status, got {}", outcome.status).into());
                }
                if weight != truth {
                    return Err(format!("expected weight {truth}, found {weight}").into());
                }
            }
            Expect::UpperBound => {
                if weight < truth {
                    return Err(
                        format!("weight {weight} is below the minimum {truth}").into()
                    );
                }
                if truth == 0 && outcome.status != Status::Optimal {
                    return Err("acyclic graph not reported optimal".into());
                }
            }
        }
        Ok(())
    }

    /// Checks that the outcome removes existing edges and leaves an acyclic graph
    fn check_outcome(graph: &Graph, outcome: &Outcome<Graph>) -> Result<(), Failed> {
        for (edge, weight) in outcome.feedback.iter() {
            if graph.weight(edge) != Some(weight) {
                return Err(format!("removed edge {edge} is not in the graph").into());
            }
            if outcome.residual.has_edge(edge) {
                return Err(format!("removed edge {edge} is still in the residual").into());
            }
        }
        if outcome.residual.n_edges() + outcome.feedback.len() != graph.n_edges() {
            return Err("residual and feedback do not partition the edges".into());
        }
        if !is_acyclic(&outcome.residual) {
            return Err("residual graph has a cycle".into());
        }
        let Some(order) = &outcome.order else {
            return Err("no topological order for an acyclic residual".into());
        };
        let position = |v| order.iter().position(|&w| w == v);
        for edge in outcome.residual.edges() {
            match (position(edge.source), position(edge.sink)) {
                (Some(i), Some(j)) if i < j => (),
                _ => return Err(format!("order violates edge {edge}").into()),
            }
        }
        Ok(())
    }
}
