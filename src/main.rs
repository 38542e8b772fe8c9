use std::thread;

use mfas_core::{
    parse, CycleCover, Graph, Init, KernelFunctions, MaybeTerminated, Relaxation, Solve,
    TriangleOrdering,
};
use rustsat::solvers::Initialize;
use rustsat_cadical::CaDiCaL;

mod cli;
use cli::{Algorithm, CadicalConfig, Cli};

/// The SAT solver used
type Oracle = CaDiCaL<'static, 'static>;

/// Relaxation instantiation used
type Relax<OInit = CaDiCaLDefaultInit> = Relaxation<Graph, Oracle, OInit>;
/// Triangle ordering instantiation used
type Triangle<OInit = CaDiCaLDefaultInit> = TriangleOrdering<Graph, Oracle, OInit>;
/// Cycle cover instantiation used
type Cover<OInit = CaDiCaLDefaultInit> = CycleCover<Graph, Oracle, OInit>;

macro_rules! dispatch_options {
    ($slv:ident, $graph:expr, $opts:expr, $cli:expr, $post:expr) => {
        match $cli.cadical_config {
            CadicalConfig::Default => run::<$slv<CaDiCaLDefaultInit>, _>($cli, $graph, $opts, $post)?,
            CadicalConfig::Plain => run::<$slv<CaDiCaLPlainInit>, _>($cli, $graph, $opts, $post)?,
            CadicalConfig::Sat => run::<$slv<CaDiCaLSatInit>, _>($cli, $graph, $opts, $post)?,
            CadicalConfig::Unsat => run::<$slv<CaDiCaLUnsatInit>, _>($cli, $graph, $opts, $post)?,
        }
    };
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::init();

    match sub_main(&cli) {
        Ok(_) => (),
        Err(err) => {
            cli.error(&format!("{err:#}"))?;
            std::process::exit(1);
        }
    };

    Ok(())
}

fn sub_main(cli: &Cli) -> anyhow::Result<()> {
    cli.print_header()?;
    cli.print_solver_config()?;

    cli.info(&format!("solving instance {:?}", cli.inst_path))?;

    let graph = parse::parse(&cli.inst_path, cli.file_format)?;

    match cli.alg {
        Algorithm::Relax(opts) => dispatch_options!(Relax, graph, opts, cli, |_| Ok(())),
        Algorithm::Triangle(opts, check_pinned) => {
            dispatch_options!(Triangle, graph, opts, cli, |alg| {
                if check_pinned {
                    report_pinned(alg, cli)?;
                }
                Ok(())
            })
        }
        Algorithm::Cover(opts) => dispatch_options!(Cover, graph, opts, cli, |_| Ok(())),
    }
    Ok(())
}

fn run<Alg, Post>(
    cli: &Cli,
    graph: Graph,
    opts: <Alg as Init>::Options,
    post: Post,
) -> anyhow::Result<()>
where
    Alg: Init + Solve<Graph = Graph>,
    Post: FnOnce(&mut Alg) -> anyhow::Result<()>,
{
    let mut alg = Alg::new(graph, opts);

    // === Set up CLI interaction ===
    // Set up signal handling
    let mut interrupter = alg.interrupter();
    let mut signals = signal_hook::iterator::Signals::new([
        signal_hook::consts::SIGTERM,
        signal_hook::consts::SIGINT,
        signal_hook::consts::SIGXCPU,
        signal_hook::consts::SIGABRT,
    ])?;
    // Thread for catching incoming signals
    thread::spawn(move || {
        for _ in signals.forever() {
            interrupter.interrupt();
        }
    });
    // Thread interrupting a blocked oracle call at the deadline
    if let Some(timeout) = cli.limits.deadline {
        let mut interrupter = alg.interrupter();
        thread::spawn(move || {
            thread::sleep(timeout);
            interrupter.interrupt();
        });
    }

    alg.attach_logger(cli.new_cli_logger());

    if let MaybeTerminated::Terminated(term) = alg.solve(cli.limits)? {
        cli.log_termination(&term)?;
    }
    post(&mut alg)?;

    cli.print_outcome(&alg.outcome())?;

    let (stats, ostats) = alg.all_stats();
    cli.print_stats(stats)?;
    cli.print_oracle_stats(ostats)?;

    Ok(())
}

fn report_pinned<OInit>(alg: &mut Triangle<OInit>, cli: &Cli) -> anyhow::Result<()>
where
    OInit: Initialize<Oracle>,
{
    match alg.pinned_consistent()? {
        MaybeTerminated::Done(true) => {
            cli.info("the ordering fixed by the adjacency matrix is accepted")?
        }
        MaybeTerminated::Done(false) => {
            cli.info("the ordering fixed by the adjacency matrix is rejected")?
        }
        MaybeTerminated::Terminated(term) => cli.log_termination(&term)?,
    }
    Ok(())
}

struct CaDiCaLDefaultInit;

impl Initialize<Oracle> for CaDiCaLDefaultInit {
    fn init() -> Oracle {
        CaDiCaL::default()
    }
}

struct CaDiCaLPlainInit;

impl Initialize<Oracle> for CaDiCaLPlainInit {
    fn init() -> Oracle {
        let mut slv = CaDiCaL::default();
        slv.set_configuration(rustsat_cadical::Config::Plain)
            .expect("failed to set cadical config");
        slv
    }
}

struct CaDiCaLSatInit;

impl Initialize<Oracle> for CaDiCaLSatInit {
    fn init() -> Oracle {
        let mut slv = CaDiCaL::default();
        slv.set_configuration(rustsat_cadical::Config::Sat)
            .expect("failed to set cadical config");
        slv
    }
}

struct CaDiCaLUnsatInit;

impl Initialize<Oracle> for CaDiCaLUnsatInit {
    fn init() -> Oracle {
        let mut slv = CaDiCaL::default();
        slv.set_configuration(rustsat_cadical::Config::Unsat)
            .expect("failed to set cadical config");
        slv
    }
}
