//! # Command Line Interface for the Solver Binary

use std::io::Error as IOError;
use std::path::PathBuf;
use std::time::Duration;
use std::{
    fmt::{self},
    io::Write,
};

use clap::{crate_authors, crate_name, crate_version, Args, Parser, Subcommand, ValueEnum};
use cpu_time::ProcessTime;
use mfas_core::{
    parse::FileFormat, CoverOptions, Digraph, Edge, IncompleteOracle, KernelOptions, Limits,
    Outcome, Phase, RelaxOptions, Selection, Stats, Termination, WriteSolverLog,
};
use rustsat::solvers::{SolverResult, SolverStats};
use termcolor::{Buffer, BufferWriter, Color, ColorSpec, WriteColor};

macro_rules! none_if_zero {
    ($val:expr) => {
        if $val == 0 {
            None
        } else {
            Some($val)
        }
    };
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    #[command(subcommand)]
    command: AlgorithmCommand,
}

#[derive(Subcommand)]
enum AlgorithmCommand {
    /// Core-guided relaxation of a topological numbering encoding
    Relax {
        #[command(flatten)]
        shared: SharedArgs,
        /// Which edge of a core to remove
        #[arg(long, default_value_t = RelaxOptions::default().selection)]
        selection: Selection,
    },
    /// Linear ordering with triangle inequalities
    Triangle {
        #[command(flatten)]
        shared: SharedArgs,
        /// Check whether the ordering fixed by the adjacency matrix is accepted
        #[arg(long)]
        check_pinned: bool,
    },
    /// Set cover of all simple cycles
    Cover {
        #[command(flatten)]
        shared: SharedArgs,
        /// Maximum number of simple cycles to enumerate (0 is no limit)
        #[arg(long, default_value_t = 0)]
        max_cycles: usize,
        /// What to do if the cycle enumeration hits the maximum
        #[arg(long, default_value_t = CoverOptions::default().on_incomplete)]
        on_incomplete: IncompleteOracle,
    },
}

#[derive(Args)]
struct SharedArgs {
    /// Whether to perform core trimming
    #[arg(long, default_value_t = Bool::from(KernelOptions::default().core_trimming))]
    core_trimming: Bool,
    /// Whether to perform core minimization
    #[arg(long, default_value_t = Bool::from(KernelOptions::default().core_minimization))]
    core_minimization: Bool,
    /// Conflict limit for a single SAT oracle call (0 is no limit)
    #[arg(long, default_value_t = 0)]
    conflict_limit: u32,
    /// How often to retry an oracle call that hit the conflict limit
    #[arg(long, default_value_t = KernelOptions::default().indeterminate_retries)]
    indeterminate_retries: usize,
    /// Rebuild the SAT oracle for every relaxation round
    #[arg(long, default_value_t = Bool::from(KernelOptions::default().reset_between_rounds))]
    reset_between_rounds: Bool,
    /// The CaDiCaL profile to use
    #[arg(long, default_value_t = CadicalConfig::Default)]
    cadical_config: CadicalConfig,
    #[command(flatten)]
    limits: LimitArgs,
    #[command(flatten)]
    file: FileArgs,
    #[command(flatten)]
    log: LogArgs,
}

impl From<&SharedArgs> for KernelOptions {
    fn from(shared: &SharedArgs) -> Self {
        KernelOptions {
            core_trimming: shared.core_trimming.into(),
            core_minimization: shared.core_minimization.into(),
            conflict_limit: none_if_zero!(shared.conflict_limit),
            indeterminate_retries: shared.indeterminate_retries,
            reset_between_rounds: shared.reset_between_rounds.into(),
        }
    }
}

#[derive(Args)]
struct LimitArgs {
    /// Limit the number of relaxation rounds (0 is no limit)
    #[arg(long, default_value_t = 0)]
    round_limit: usize,
    /// Limit the number of SAT oracle calls (0 is no limit)
    #[arg(long, default_value_t = 0)]
    oracle_call_limit: usize,
    /// Wall clock timeout in seconds (0 is no limit)
    #[arg(long, default_value_t = 0.)]
    timeout: f64,
}

impl From<&LimitArgs> for Limits {
    fn from(args: &LimitArgs) -> Self {
        Limits {
            rounds: none_if_zero!(args.round_limit),
            oracle_calls: none_if_zero!(args.oracle_call_limit),
            deadline: if args.timeout > 0. {
                Some(Duration::from_secs_f64(args.timeout))
            } else {
                None
            },
        }
    }
}

#[derive(Args)]
struct FileArgs {
    /// The file format of the input file. With infer, the file format is
    /// inferred from the file extension.
    #[arg(long, value_enum, default_value_t = FileFormat::Infer)]
    file_format: FileFormat,
    /// The path to the graph file to load
    inst_path: PathBuf,
}

#[derive(Args)]
struct LogArgs {
    #[command(flatten)]
    color: concolor_clap::Color,
    /// Print the solver configuration
    #[arg(long)]
    print_solver_config: bool,
    /// Print the edges of the residual graph
    #[arg(long)]
    print_residual: bool,
    /// Print a topological order of the residual graph
    #[arg(long)]
    print_order: bool,
    /// Don't print statistics
    #[arg(long)]
    no_print_stats: bool,
    /// Verbosity of the solver output
    #[arg(short, long, default_value_t = 0)]
    verbosity: u8,
    /// Log relaxation rounds and removed edges
    #[arg(long)]
    log_rounds: bool,
    /// Log candidates along the search trace
    #[arg(long)]
    log_candidates: bool,
    /// Log cycle enumeration results
    #[arg(long)]
    log_cycles: bool,
    /// Log SAT oracle calls
    #[arg(long)]
    log_oracle_calls: bool,
    /// Log extracted cores
    #[arg(long)]
    log_cores: bool,
    /// Log routine starts and ends till a given depth
    #[arg(long, default_value_t = 0)]
    log_routines: usize,
}

impl From<&LogArgs> for LoggerConfig {
    fn from(args: &LogArgs) -> Self {
        LoggerConfig {
            log_rounds: args.log_rounds || args.verbosity >= 1,
            log_candidates: args.log_candidates || args.verbosity >= 1,
            log_cycles: args.log_cycles || args.verbosity >= 1,
            log_cores: args.log_cores || args.verbosity >= 2,
            log_messages: args.verbosity >= 2,
            log_oracle_calls: args.log_oracle_calls || args.verbosity >= 3,
            log_routines: std::cmp::max(args.log_routines, args.verbosity as usize * 2),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Bool {
    /// Turn on feature
    True,
    /// Turn off feature
    False,
}

impl From<Bool> for bool {
    fn from(val: Bool) -> Self {
        val == Bool::True
    }
}

impl fmt::Display for Bool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bool::True => write!(f, "true"),
            Bool::False => write!(f, "false"),
        }
    }
}

impl From<bool> for Bool {
    fn from(val: bool) -> Self {
        if val {
            Bool::True
        } else {
            Bool::False
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum CadicalConfig {
    /// Set default advanced internal options
    Default,
    /// Disable all internal preprocessing options
    Plain,
    /// Set internal options to target satisfiable instances
    Sat,
    /// Set internal options to target unsatisfiable instances
    Unsat,
}

impl fmt::Display for CadicalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CadicalConfig::Default => write!(f, "default"),
            CadicalConfig::Plain => write!(f, "plain"),
            CadicalConfig::Sat => write!(f, "sat"),
            CadicalConfig::Unsat => write!(f, "unsat"),
        }
    }
}

pub struct Cli {
    pub limits: Limits,
    pub file_format: FileFormat,
    pub inst_path: PathBuf,
    pub cadical_config: CadicalConfig,
    stdout: BufferWriter,
    stderr: BufferWriter,
    print_solver_config: bool,
    print_residual: bool,
    print_order: bool,
    print_stats: bool,
    color: concolor_clap::Color,
    logger_config: LoggerConfig,
    pub alg: Algorithm,
}

pub enum Algorithm {
    Relax(RelaxOptions),
    /// The options and whether to check the adjacency-pinned ordering
    Triangle(KernelOptions, bool),
    Cover(CoverOptions),
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Relax(..) => write!(f, "relax"),
            Algorithm::Triangle(..) => write!(f, "triangle"),
            Algorithm::Cover(..) => write!(f, "cover"),
        }
    }
}

fn color_choice(color: concolor_clap::Color, stream: atty::Stream) -> termcolor::ColorChoice {
    match color.color {
        concolor_clap::ColorChoice::Always => termcolor::ColorChoice::Always,
        concolor_clap::ColorChoice::Never => termcolor::ColorChoice::Never,
        concolor_clap::ColorChoice::Auto => {
            if atty::is(stream) {
                termcolor::ColorChoice::Auto
            } else {
                termcolor::ColorChoice::Never
            }
        }
    }
}

impl Cli {
    pub fn init() -> Self {
        let (shared, alg) = match CliArgs::parse().command {
            AlgorithmCommand::Relax { shared, selection } => {
                let alg = Algorithm::Relax(RelaxOptions {
                    kernel: (&shared).into(),
                    selection,
                });
                (shared, alg)
            }
            AlgorithmCommand::Triangle {
                shared,
                check_pinned,
            } => {
                let alg = Algorithm::Triangle((&shared).into(), check_pinned);
                (shared, alg)
            }
            AlgorithmCommand::Cover {
                shared,
                max_cycles,
                on_incomplete,
            } => {
                let alg = Algorithm::Cover(CoverOptions {
                    kernel: (&shared).into(),
                    max_cycles: none_if_zero!(max_cycles),
                    on_incomplete,
                });
                (shared, alg)
            }
        };
        Cli {
            limits: (&shared.limits).into(),
            file_format: shared.file.file_format,
            inst_path: shared.file.inst_path.clone(),
            cadical_config: shared.cadical_config,
            stdout: BufferWriter::stdout(color_choice(shared.log.color, atty::Stream::Stdout)),
            stderr: BufferWriter::stderr(color_choice(shared.log.color, atty::Stream::Stderr)),
            print_solver_config: shared.log.print_solver_config,
            print_residual: shared.log.print_residual,
            print_order: shared.log.print_order,
            print_stats: !shared.log.no_print_stats,
            color: shared.log.color,
            logger_config: (&shared.log).into(),
            alg,
        }
    }

    pub fn new_cli_logger(&self) -> CliLogger {
        CliLogger {
            stdout: BufferWriter::stdout(color_choice(self.color, atty::Stream::Stdout)),
            config: self.logger_config.clone(),
            routine_stack: vec![],
        }
    }

    pub fn warning(&self, msg: &str) -> Result<(), IOError> {
        let mut buffer = self.stderr.buffer();
        buffer.set_color(ColorSpec::new().set_bold(true).set_fg(Some(Color::Yellow)))?;
        write!(buffer, "warning")?;
        buffer.reset()?;
        buffer.set_color(ColorSpec::new().set_bold(true))?;
        write!(buffer, ": ")?;
        buffer.reset()?;
        writeln!(buffer, "{}", msg)?;
        self.stderr.print(&buffer)?;
        Ok(())
    }

    pub fn error(&self, msg: &str) -> Result<(), IOError> {
        let mut buffer = self.stderr.buffer();
        buffer.set_color(ColorSpec::new().set_bold(true).set_fg(Some(Color::Red)))?;
        write!(buffer, "error")?;
        buffer.reset()?;
        buffer.set_color(ColorSpec::new().set_bold(true))?;
        write!(buffer, ": ")?;
        buffer.reset()?;
        writeln!(buffer, "{}", msg)?;
        self.stderr.print(&buffer)?;
        Ok(())
    }

    pub fn info(&self, msg: &str) -> Result<(), IOError> {
        let mut buffer = self.stdout.buffer();
        buffer.set_color(ColorSpec::new().set_bold(true).set_fg(Some(Color::Blue)))?;
        write!(buffer, "info")?;
        buffer.reset()?;
        buffer.set_color(ColorSpec::new().set_bold(true))?;
        write!(buffer, ": ")?;
        buffer.reset()?;
        writeln!(buffer, "{}", msg)?;
        self.stdout.print(&buffer)?;
        Ok(())
    }

    pub fn log_termination(&self, term: &Termination) -> Result<(), IOError> {
        self.warning(&format!("{}", term))
    }

    pub fn print_header(&self) -> Result<(), IOError> {
        let mut buffer = self.stdout.buffer();
        buffer.set_color(ColorSpec::new().set_bold(true).set_fg(Some(Color::Green)))?;
        write!(buffer, "{}", crate_name!())?;
        buffer.reset()?;
        buffer.set_color(ColorSpec::new().set_bold(true))?;
        writeln!(buffer, " ({})", crate_version!())?;
        buffer.reset()?;
        writeln!(buffer, "{}", crate_authors!("\n"))?;
        write!(buffer, "algorithm: ")?;
        buffer.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        writeln!(buffer, "{}", self.alg)?;
        buffer.reset()?;
        buffer.set_color(ColorSpec::new().set_bold(true))?;
        write!(buffer, "==============================")?;
        buffer.reset()?;
        writeln!(buffer)?;
        self.stdout.print(&buffer)?;
        Ok(())
    }

    pub fn print_solver_config(&self) -> Result<(), IOError> {
        if self.print_solver_config {
            let mut buffer = self.stdout.buffer();
            Self::start_block(&mut buffer)?;
            buffer.set_color(ColorSpec::new().set_bold(true).set_fg(Some(Color::Blue)))?;
            write!(buffer, "Solver Config")?;
            buffer.reset()?;
            buffer.set_color(ColorSpec::new().set_bold(true))?;
            writeln!(buffer, ": ")?;
            buffer.reset()?;
            let kernel = match self.alg {
                Algorithm::Relax(opts) => {
                    Self::print_parameter(&mut buffer, "selection", opts.selection)?;
                    opts.kernel
                }
                Algorithm::Triangle(opts, check_pinned) => {
                    Self::print_parameter(&mut buffer, "check-pinned", check_pinned)?;
                    opts
                }
                Algorithm::Cover(opts) => {
                    Self::print_parameter(&mut buffer, "max-cycles", OptVal::new(opts.max_cycles))?;
                    Self::print_parameter(&mut buffer, "on-incomplete", opts.on_incomplete)?;
                    opts.kernel
                }
            };
            Self::print_parameter(&mut buffer, "core-trimming", kernel.core_trimming)?;
            Self::print_parameter(&mut buffer, "core-minimization", kernel.core_minimization)?;
            Self::print_parameter(
                &mut buffer,
                "conflict-limit",
                OptVal::new(kernel.conflict_limit),
            )?;
            Self::print_parameter(
                &mut buffer,
                "indeterminate-retries",
                kernel.indeterminate_retries,
            )?;
            Self::print_parameter(
                &mut buffer,
                "reset-between-rounds",
                kernel.reset_between_rounds,
            )?;
            Self::print_parameter(&mut buffer, "cadical-config", self.cadical_config)?;
            Self::print_parameter(&mut buffer, "round-limit", OptVal::new(self.limits.rounds))?;
            Self::print_parameter(
                &mut buffer,
                "oracle-call-limit",
                OptVal::new(self.limits.oracle_calls),
            )?;
            Self::print_parameter(
                &mut buffer,
                "timeout",
                OptVal::new(self.limits.deadline.map(DurPrinter::new)),
            )?;
            Self::end_block(&mut buffer)?;
            self.stdout.print(&buffer)?;
        }
        Ok(())
    }

    pub fn print_outcome<G: Digraph>(&self, outcome: &Outcome<G>) -> Result<(), IOError> {
        let graph = &outcome.residual;
        let mut buffer = self.stdout.buffer();
        Self::start_block(&mut buffer)?;
        buffer.set_color(ColorSpec::new().set_bold(true).set_fg(Some(Color::Blue)))?;
        write!(buffer, "Feedback Arc Set")?;
        buffer.set_color(ColorSpec::new().set_bold(true))?;
        writeln!(buffer, ": ")?;
        buffer.reset()?;
        Self::print_parameter(&mut buffer, "status", outcome.status)?;
        Self::print_parameter(&mut buffer, "weight", outcome.feedback.weight())?;
        Self::print_parameter(&mut buffer, "n-edges", outcome.feedback.len())?;
        Self::print_parameter(&mut buffer, "rounds", outcome.rounds)?;
        Self::print_parameter(&mut buffer, "acyclic", outcome.is_acyclic())?;
        for (edge, weight) in outcome.feedback.iter() {
            Self::print_edge(&mut buffer, graph, "e", edge, weight)?;
        }
        Self::end_block(&mut buffer)?;
        if self.print_residual {
            Self::start_block(&mut buffer)?;
            buffer.set_color(ColorSpec::new().set_bold(true).set_fg(Some(Color::Blue)))?;
            write!(buffer, "Residual Graph")?;
            buffer.set_color(ColorSpec::new().set_bold(true))?;
            writeln!(buffer, ": ")?;
            buffer.reset()?;
            for edge in graph.edges() {
                let weight = graph.weight(edge).unwrap_or(0);
                Self::print_edge(&mut buffer, graph, "r", edge, weight)?;
            }
            Self::end_block(&mut buffer)?;
        }
        if self.print_order {
            if let Some(order) = &outcome.order {
                write!(buffer, "o")?;
                for v in order {
                    write!(buffer, " {}", graph.label(*v))?;
                }
                writeln!(buffer)?;
            }
        }
        self.stdout.print(&buffer)?;
        Ok(())
    }

    pub fn print_stats(&self, stats: Stats) -> Result<(), IOError> {
        if self.print_stats {
            let mut buffer = self.stdout.buffer();
            Self::start_block(&mut buffer)?;
            buffer.set_color(ColorSpec::new().set_bold(true).set_fg(Some(Color::Blue)))?;
            write!(buffer, "Solver Stats")?;
            buffer.reset()?;
            buffer.set_color(ColorSpec::new().set_bold(true))?;
            writeln!(buffer, ": ")?;
            buffer.reset()?;
            Self::print_parameter(&mut buffer, "n-solve-calls", stats.n_solve_calls)?;
            Self::print_parameter(&mut buffer, "n-rounds", stats.n_rounds)?;
            Self::print_parameter(&mut buffer, "n-oracle-calls", stats.n_oracle_calls)?;
            Self::print_parameter(&mut buffer, "n-indeterminate", stats.n_indeterminate)?;
            Self::print_parameter(&mut buffer, "n-cores", stats.n_cores)?;
            Self::print_parameter(&mut buffer, "n-candidates", stats.n_candidates)?;
            Self::print_parameter(&mut buffer, "n-cycles", stats.n_cycles)?;
            Self::print_parameter(&mut buffer, "n-clauses", stats.n_clauses)?;
            Self::print_parameter(&mut buffer, "n-scopes", stats.n_scopes)?;
            Self::end_block(&mut buffer)?;
            self.stdout.print(&buffer)?;
        }
        Ok(())
    }

    pub fn print_oracle_stats(&self, stats: SolverStats) -> Result<(), IOError> {
        if self.print_stats {
            let mut buffer = self.stdout.buffer();
            Self::start_block(&mut buffer)?;
            buffer.set_color(ColorSpec::new().set_bold(true).set_fg(Some(Color::Blue)))?;
            write!(buffer, "Oracle Stats")?;
            buffer.reset()?;
            buffer.set_color(ColorSpec::new().set_bold(true))?;
            writeln!(buffer, ": ")?;
            buffer.reset()?;
            Self::print_parameter(&mut buffer, "n-sat-solves", stats.n_sat)?;
            Self::print_parameter(&mut buffer, "n-unsat-solves", stats.n_unsat)?;
            Self::print_parameter(&mut buffer, "n-clauses", stats.n_clauses)?;
            Self::print_parameter(&mut buffer, "max-var", OptVal::new(stats.max_var))?;
            Self::print_parameter(&mut buffer, "avg-clause-len", stats.avg_clause_len)?;
            Self::print_parameter(
                &mut buffer,
                "cpu-solve-time",
                DurPrinter::new(stats.cpu_solve_time),
            )?;
            Self::end_block(&mut buffer)?;
            self.stdout.print(&buffer)?;
        }
        Ok(())
    }

    fn print_edge<G: Digraph>(
        buffer: &mut Buffer,
        graph: &G,
        tag: &str,
        edge: Edge,
        weight: usize,
    ) -> Result<(), IOError> {
        writeln!(
            buffer,
            "{} {} {} {}",
            tag,
            graph.label(edge.source),
            graph.label(edge.sink),
            weight
        )
    }

    fn print_parameter<V: fmt::Display>(
        buffer: &mut Buffer,
        name: &str,
        val: V,
    ) -> Result<(), IOError> {
        buffer.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
        write!(buffer, "{}", name)?;
        buffer.reset()?;
        writeln!(buffer, ": {}", val)?;
        Ok(())
    }

    fn start_block(buffer: &mut Buffer) -> Result<(), IOError> {
        buffer.set_color(ColorSpec::new().set_dimmed(true))?;
        write!(buffer, ">>>>>")?;
        buffer.reset()?;
        writeln!(buffer)?;
        Ok(())
    }

    fn end_block(buffer: &mut Buffer) -> Result<(), IOError> {
        buffer.set_color(ColorSpec::new().set_dimmed(true))?;
        write!(buffer, "<<<<<")?;
        buffer.reset()?;
        writeln!(buffer)?;
        Ok(())
    }
}

#[derive(Clone)]
struct LoggerConfig {
    log_rounds: bool,
    log_candidates: bool,
    log_cycles: bool,
    log_cores: bool,
    log_messages: bool,
    log_oracle_calls: bool,
    log_routines: usize,
}

pub struct CliLogger {
    stdout: BufferWriter,
    config: LoggerConfig,
    routine_stack: Vec<(&'static str, ProcessTime)>,
}

impl CliLogger {
    fn print_line(&self, color: Color, tag: &str, msg: fmt::Arguments) -> anyhow::Result<()> {
        let mut buffer = self.stdout.buffer();
        buffer.set_color(ColorSpec::new().set_fg(Some(color)))?;
        write!(buffer, "{}", tag)?;
        buffer.reset()?;
        writeln!(buffer, ": {}", msg)?;
        self.stdout.print(&buffer)?;
        Ok(())
    }
}

impl WriteSolverLog for CliLogger {
    fn log_round(&mut self, round: usize, n_edges: usize) -> anyhow::Result<()> {
        if self.config.log_rounds {
            self.print_line(
                Color::Magenta,
                "round",
                format_args!(
                    "round: {}; n-edges: {}; cpu-time: {}",
                    round,
                    n_edges,
                    DurPrinter::new(ProcessTime::now().as_duration()),
                ),
            )?;
        }
        Ok(())
    }

    fn log_oracle_call(&mut self, result: SolverResult) -> anyhow::Result<()> {
        if self.config.log_oracle_calls {
            self.print_line(
                Color::Magenta,
                "oracle call",
                format_args!(
                    "result: {}; cpu-time: {}",
                    result,
                    DurPrinter::new(ProcessTime::now().as_duration()),
                ),
            )?;
        }
        Ok(())
    }

    fn log_core(&mut self, len: usize, red_len: usize) -> anyhow::Result<()> {
        if self.config.log_cores {
            self.print_line(
                Color::Magenta,
                "extracted core",
                format_args!("original-len: {}; reduced-len: {}", len, red_len),
            )?;
        }
        Ok(())
    }

    fn log_removal(&mut self, edge: Edge, weight: usize) -> anyhow::Result<()> {
        if self.config.log_rounds {
            self.print_line(
                Color::Magenta,
                "removed edge",
                format_args!("edge: {}; weight: {}", edge, weight),
            )?;
        }
        Ok(())
    }

    fn log_candidate(&mut self, cost: usize, phase: Phase) -> anyhow::Result<()> {
        if self.config.log_candidates {
            self.print_line(
                Color::Magenta,
                "candidate",
                format_args!(
                    "cost: {}; phase: {}; cpu-time: {}",
                    cost,
                    phase,
                    DurPrinter::new(ProcessTime::now().as_duration()),
                ),
            )?;
        }
        Ok(())
    }

    fn log_cycles(&mut self, n_cycles: usize, complete: bool) -> anyhow::Result<()> {
        if self.config.log_cycles {
            self.print_line(
                Color::Cyan,
                "cycle matrix",
                format_args!("n-cycles: {}; complete: {}", n_cycles, complete),
            )?;
        }
        Ok(())
    }

    fn log_routine_start(&mut self, desc: &'static str) -> anyhow::Result<()> {
        self.routine_stack.push((desc, ProcessTime::now()));

        if self.config.log_routines >= self.routine_stack.len() {
            self.print_line(Color::Green, ">>> routine start", format_args!("{}", desc))?;
        }
        Ok(())
    }

    fn log_routine_end(&mut self) -> anyhow::Result<()> {
        let Some((desc, start)) = self.routine_stack.pop() else {
            anyhow::bail!("routine stack out of sync")
        };

        if self.config.log_routines > self.routine_stack.len() {
            let duration = ProcessTime::now().duration_since(start);
            self.print_line(
                Color::Red,
                "<<< routine end",
                format_args!("{}; duration: {}", desc, DurPrinter::new(duration)),
            )?;
        }
        Ok(())
    }

    fn log_message(&mut self, msg: &str) -> anyhow::Result<()> {
        if self.config.log_messages {
            self.print_line(Color::Yellow, "message", format_args!("{}", msg))?;
        }
        Ok(())
    }
}

struct OptVal<T> {
    val: Option<T>,
}

impl<T> OptVal<T> {
    fn new(val: Option<T>) -> Self {
        OptVal { val }
    }
}

impl<T: fmt::Display> fmt::Display for OptVal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.val {
            Some(t) => fmt::Display::fmt(&t, f),
            None => write!(f, "none"),
        }
    }
}

struct DurPrinter {
    dur: Duration,
}

impl DurPrinter {
    fn new(dur: Duration) -> Self {
        Self { dur }
    }
}

impl fmt::Display for DurPrinter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.dur)
    }
}

#[test]
fn verify_cli_args() {
    use clap::CommandFactory;
    CliArgs::command().debug_assert()
}
