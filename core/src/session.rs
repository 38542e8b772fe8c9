//! # Solver Session
//!
//! A [`Session`] wraps an incremental SAT oracle with the operations the
//! encodings need: nested scopes that can be retracted, constraints tracked
//! under an [`EdgeKey`] name, unsat cores over those names, models, and
//! linear search on an objective.
//!
//! Scopes are implemented with activation literals. A clause added inside a
//! scope is extended by the negated activator, every check assumes all open
//! activators, and retracting a scope permanently falsifies its activator.
//! Variables are never handed out twice within a session, so an entity
//! recreated after a retraction gets a fresh variable.

use std::{
    marker::PhantomData,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Instant,
};

use anyhow::Context;
use rustsat::{
    encodings::{card, pb},
    instances::ManageVars,
    solvers::{
        DefaultInitializer, Initialize, Interrupt, InterruptSolver, LimitConflicts,
        SolveIncremental, SolveStats, SolverResult, SolverStats,
    },
    types::{Assignment, Clause, Lit, TernaryVal, Var},
};

use crate::{
    cache::{Symbol, SymbolCache},
    graph::Edge,
    termination::settle,
    types::{EdgeKey, ObjEncoding, Objective, VarManager},
    Error, Halt, KernelOptions, Limits, MaybeTerminated, Phase, Stage, Stats, Step, Termination,
    WriteSolverLog,
};

/// Conflict limit for a single oracle call during core minimization
const MINIMIZATION_CONFLICTS: u32 = 1000;

/// Outcome of a satisfiability check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckResult {
    Sat,
    Unsat,
    /// The oracle gave up, e.g., because of the conflict limit
    Unknown,
}

/// Interrupts a running solver from another thread
#[derive(Clone)]
pub struct Interrupter {
    /// Termination flag of the solver
    term_flag: Arc<AtomicBool>,
    /// The terminator of the underlying SAT oracle
    oracle_interrupter: Arc<Mutex<Box<dyn InterruptSolver + Send>>>,
}

impl Interrupter {
    /// Interrupts the solver asynchronously
    pub fn interrupt(&mut self) {
        self.term_flag.store(true, Ordering::Relaxed);
        if let Ok(mut oracle) = self.oracle_interrupter.lock() {
            oracle.interrupt();
        }
    }
}

/// The best solution found so far by a linear search
#[derive(Debug, Clone)]
pub struct Incumbent {
    pub cost: usize,
    pub solution: Assignment,
}

struct Scope {
    activator: Lit,
    cache_mark: usize,
    n_tracked: usize,
}

/// SAT session shared by all algorithms
///
/// # Generics
///
/// - `O`: the SAT solver oracle
/// - `OInit`: the oracle initializer
pub struct Session<O, OInit = DefaultInitializer> {
    /// The SAT solver backend
    oracle: O,
    /// The variable manager keeping track of variables
    var_manager: VarManager,
    /// Variables of encoded entities
    cache: SymbolCache,
    /// Open scopes, innermost last
    scopes: Vec<Scope>,
    /// Selectors of the tracked constraints in open scopes or at the top level
    tracked: Vec<(Lit, EdgeKey)>,
    /// Configuration options
    opts: KernelOptions,
    /// Running statistics
    stats: Stats,
    /// Limits for the current solving run
    lims: Limits,
    deadline: Option<Instant>,
    /// Logger to log with
    logger: Option<Box<dyn WriteSolverLog>>,
    /// Number of logged routines not yet ended
    open_routines: usize,
    /// Termination flag
    term_flag: Arc<AtomicBool>,
    /// The oracle interrupter
    oracle_interrupter: Arc<Mutex<Box<dyn InterruptSolver + Send>>>,
    /// Phantom marker for oracle factory
    _factory: PhantomData<OInit>,
}

impl<O, OInit> Session<O, OInit>
where
    O: Interrupt,
    OInit: Initialize<O>,
{
    pub fn new(opts: KernelOptions) -> Self {
        let mut oracle = OInit::init();
        let interrupter = oracle.interrupter();
        Session {
            oracle,
            var_manager: VarManager::default(),
            cache: SymbolCache::new(),
            scopes: vec![],
            tracked: vec![],
            opts,
            stats: Stats::default(),
            lims: Limits::none(),
            deadline: None,
            logger: None,
            open_routines: 0,
            term_flag: Arc::new(AtomicBool::new(false)),
            oracle_interrupter: Arc::new(Mutex::new(Box::new(interrupter))),
            _factory: PhantomData,
        }
    }

    /// Drops all constraints, scopes and variables. Statistics are kept.
    pub fn reset(&mut self) -> Step {
        self.log_routine_start("reset-oracle")?;
        self.oracle = OInit::init();
        let interrupter = self.oracle.interrupter();
        if let Ok(mut guard) = self.oracle_interrupter.lock() {
            *guard = Box::new(interrupter);
        }
        self.var_manager = VarManager::default();
        self.cache.clear();
        self.scopes.clear();
        self.tracked.clear();
        self.log_routine_end()?;
        Ok(())
    }

    pub fn interrupter(&mut self) -> Interrupter {
        Interrupter {
            term_flag: self.term_flag.clone(),
            oracle_interrupter: self.oracle_interrupter.clone(),
        }
    }
}

impl<O, OInit> Session<O, OInit> {
    pub(crate) fn start_solving(&mut self, limits: Limits) {
        self.stats.n_solve_calls += 1;
        self.lims = limits;
        self.deadline = limits.deadline.map(|d| Instant::now() + d);
    }

    /// Ends the routines a halted step left open and settles the step. An
    /// interrupt is consumed, so that the next call resumes.
    pub(crate) fn finish_solving<T>(
        &mut self,
        step: Step<T>,
    ) -> Result<MaybeTerminated<T>, Error> {
        let closed = self.close_routines();
        if let Err(Halt::Terminated(Termination::Interrupted)) = &step {
            self.term_flag.store(false, Ordering::Relaxed);
        }
        let res = settle(step)?;
        closed.map_err(Error::from)?;
        Ok(res)
    }

    fn close_routines(&mut self) -> anyhow::Result<()> {
        while self.open_routines > 0 {
            self.log_routine_end()?;
        }
        Ok(())
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn options(&self) -> &KernelOptions {
        &self.opts
    }

    pub fn attach_logger<L: WriteSolverLog + 'static>(&mut self, logger: L) {
        self.logger = Some(Box::new(logger));
    }

    pub fn detach_logger(&mut self) -> Option<Box<dyn WriteSolverLog>> {
        self.logger.take()
    }

    pub fn cache(&self) -> &SymbolCache {
        &self.cache
    }

    /// Gets the variable of an entity, creating it if needed
    pub fn var(&mut self, symbol: Symbol) -> Step<Var> {
        Ok(self.cache.get_or_create(symbol, &mut self.var_manager)?)
    }

    /// Checks whether the variable of an entity is true in a model
    pub fn holds(&self, sol: &Assignment, symbol: Symbol) -> bool {
        self.cache
            .get(symbol)
            .is_some_and(|var| sol.lit_value(var.pos_lit()) == TernaryVal::True)
    }

    /// Opens a new scope
    pub fn push(&mut self) -> Step {
        let activator = self.var_manager.new_var().pos_lit();
        self.scopes.push(Scope {
            activator,
            cache_mark: self.cache.mark(),
            n_tracked: self.tracked.len(),
        });
        self.stats.n_scopes += 1;
        Ok(())
    }

    pub fn n_scopes(&self) -> usize {
        self.scopes.len()
    }

    /// The activators of all open scopes
    fn scope_assumps(&self) -> Vec<Lit> {
        self.scopes.iter().map(|s| s.activator).collect()
    }

    /// The assumptions of a check: open scopes and tracked selectors
    fn assumptions(&self) -> Vec<Lit> {
        let mut assumps = self.scope_assumps();
        assumps.extend(self.tracked.iter().map(|(sel, _)| *sel));
        assumps
    }

    fn name_of(&self, lit: Lit) -> Option<EdgeKey> {
        if lit.is_neg() {
            return None;
        }
        match self.cache.lookup(lit.var()) {
            Some(Symbol::Selector(name)) => Some(name),
            _ => None,
        }
    }

    /// Translates an oracle core into the selectors of the tracked
    /// constraints it blames
    fn core_selectors(&self, core: Vec<Lit>) -> Vec<Lit> {
        core.into_iter()
            .map(|l| !l)
            .filter(|&l| self.name_of(l).is_some())
            .collect()
    }

    /// Checks the termination flag and the deadline
    pub(crate) fn check_termination(&self) -> Result<(), Termination> {
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Termination::Deadline);
        }
        if self.term_flag.load(Ordering::Relaxed) {
            return Err(Termination::Interrupted);
        }
        Ok(())
    }

    /// Checks whether another relaxation round may start after `rounds` rounds
    pub(crate) fn check_round_limit(&self, rounds: usize) -> Result<(), Termination> {
        if self.lims.rounds.is_some_and(|lim| rounds >= lim) {
            return Err(Termination::RoundsLimit);
        }
        Ok(())
    }

    /// Logs an oracle call. Can return a termination if the oracle call limit is reached.
    fn log_oracle_call(&mut self, result: SolverResult) -> Step {
        self.stats.n_oracle_calls += 1;
        // Dispatch to logger
        if let Some(logger) = &mut self.logger {
            logger.log_oracle_call(result).context("logger failed")?;
        }
        // Update limit and check termination
        if let Some(oracle_calls) = &mut self.lims.oracle_calls {
            *oracle_calls = oracle_calls.saturating_sub(1);
            if *oracle_calls == 0 {
                return Err(Termination::OracleCallsLimit.into());
            }
        }
        Ok(())
    }

    /// Logs a candidate objective value
    pub(crate) fn log_candidate(&mut self, cost: usize, phase: Phase) -> anyhow::Result<()> {
        self.stats.n_candidates += 1;
        if let Some(logger) = &mut self.logger {
            logger.log_candidate(cost, phase).context("logger failed")?;
        }
        Ok(())
    }

    fn log_core(&mut self, len: usize, red_len: usize) -> anyhow::Result<()> {
        self.stats.n_cores += 1;
        if let Some(logger) = &mut self.logger {
            logger.log_core(len, red_len).context("logger failed")?;
        }
        Ok(())
    }

    pub(crate) fn log_round(&mut self, round: usize, n_edges: usize) -> anyhow::Result<()> {
        if let Some(logger) = &mut self.logger {
            logger.log_round(round, n_edges).context("logger failed")?;
        }
        Ok(())
    }

    pub(crate) fn log_removal(&mut self, edge: Edge, weight: usize) -> anyhow::Result<()> {
        self.stats.n_rounds += 1;
        if let Some(logger) = &mut self.logger {
            logger.log_removal(edge, weight).context("logger failed")?;
        }
        Ok(())
    }

    pub(crate) fn log_cycles(&mut self, n_cycles: usize, complete: bool) -> anyhow::Result<()> {
        self.stats.n_cycles = n_cycles;
        if let Some(logger) = &mut self.logger {
            logger.log_cycles(n_cycles, complete).context("logger failed")?;
        }
        Ok(())
    }

    pub(crate) fn log_message(&mut self, msg: &str) -> anyhow::Result<()> {
        if let Some(logger) = &mut self.logger {
            logger.log_message(msg).context("logger failed")?;
        }
        Ok(())
    }

    /// Logs a routine start
    pub(crate) fn log_routine_start(&mut self, desc: &'static str) -> anyhow::Result<()> {
        self.open_routines += 1;
        if let Some(logger) = &mut self.logger {
            logger.log_routine_start(desc).context("logger failed")?;
        }
        Ok(())
    }

    /// Logs a routine end
    pub(crate) fn log_routine_end(&mut self) -> anyhow::Result<()> {
        self.open_routines = self.open_routines.saturating_sub(1);
        if let Some(logger) = &mut self.logger {
            logger.log_routine_end().context("logger failed")?;
        }
        Ok(())
    }
}

impl<O, OInit> Session<O, OInit>
where
    O: SolveIncremental + SolveStats + LimitConflicts,
{
    pub fn oracle_stats(&self) -> SolverStats {
        self.oracle.stats()
    }

    /// Asserts a clause in the innermost open scope
    pub fn add(&mut self, mut clause: Clause) -> Step {
        if let Some(scope) = self.scopes.last() {
            clause.add(!scope.activator);
        }
        self.stats.n_clauses += 1;
        self.oracle
            .add_clause(clause)
            .context("failed to add clause")?;
        Ok(())
    }

    /// Asserts clauses under a selector named `name`, so that they can show
    /// up in unsat cores. Fails if the name is already tracked.
    pub fn assert_and_track<I>(&mut self, name: EdgeKey, clauses: I) -> Step
    where
        I: IntoIterator<Item = Clause>,
    {
        let selector = self.cache.track(name, &mut self.var_manager)?.pos_lit();
        for mut clause in clauses {
            clause.add(!selector);
            self.add(clause)?;
        }
        self.tracked.push((selector, name));
        Ok(())
    }

    /// Retracts the innermost scope with everything asserted and tracked in it
    pub fn pop(&mut self) -> Step {
        let Some(scope) = self.scopes.pop() else {
            return Err(Error::internal(Stage::Encoding, "no open scope to retract").into());
        };
        self.oracle
            .add_unit(!scope.activator)
            .context("failed to retract scope")?;
        self.cache.forget_from(scope.cache_mark);
        self.tracked.truncate(scope.n_tracked);
        Ok(())
    }

    /// Checks satisfiability of everything asserted in open scopes
    pub fn check(&mut self) -> Step<CheckResult> {
        let assumps = self.assumptions();
        self.check_assumps(&assumps)
    }

    /// Checks satisfiability under additional assumptions
    pub fn check_under(&mut self, extra: &[Lit]) -> Step<CheckResult> {
        let mut assumps = self.assumptions();
        assumps.extend_from_slice(extra);
        self.check_assumps(&assumps)
    }

    fn check_assumps(&mut self, assumps: &[Lit]) -> Step<CheckResult> {
        Ok(
            match self.solve_limited(assumps, self.opts.conflict_limit)? {
                SolverResult::Sat => CheckResult::Sat,
                SolverResult::Unsat => CheckResult::Unsat,
                SolverResult::Interrupted => {
                    self.stats.n_indeterminate += 1;
                    CheckResult::Unknown
                }
            },
        )
    }

    /// Decides satisfiability, retrying unknown results with a doubled
    /// conflict limit. Returns whether the session is satisfiable.
    pub fn decide(&mut self, stage: Stage, round: usize) -> Step<bool> {
        let assumps = self.assumptions();
        self.decide_assumps(&assumps, stage, round)
    }

    /// Like [`Session::decide`], under additional assumptions
    pub fn decide_under(&mut self, extra: &[Lit], stage: Stage, round: usize) -> Step<bool> {
        let mut assumps = self.assumptions();
        assumps.extend_from_slice(extra);
        self.decide_assumps(&assumps, stage, round)
    }

    fn decide_assumps(&mut self, assumps: &[Lit], stage: Stage, round: usize) -> Step<bool> {
        let mut limit = self.opts.conflict_limit;
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.solve_limited(assumps, limit)? {
                SolverResult::Sat => return Ok(true),
                SolverResult::Unsat => return Ok(false),
                SolverResult::Interrupted => {
                    self.stats.n_indeterminate += 1;
                    if attempts > self.opts.indeterminate_retries {
                        return Err(Error::SolverIndeterminate {
                            stage,
                            round,
                            attempts,
                        }
                        .into());
                    }
                    limit = limit.map(|l| l.saturating_mul(2));
                    self.log_message(&format!(
                        "oracle returned unknown in round {round}, retrying with conflict limit {limit:?}"
                    ))?;
                }
            }
        }
    }

    /// Wrapper around the oracle with call logging, limits and interrupt detection
    fn solve_limited(&mut self, assumps: &[Lit], limit: Option<u32>) -> Step<SolverResult> {
        self.check_termination()?;
        self.log_routine_start("oracle call")?;
        self.oracle
            .limit_conflicts(limit)
            .context("failed to set conflict limit")?;
        let res = self
            .oracle
            .solve_assumps(assumps)
            .context("oracle call failed")?;
        self.log_routine_end()?;
        self.check_termination()?;
        self.log_oracle_call(res)?;
        Ok(res)
    }

    /// Gets the model of the last satisfiable check
    pub fn model(&mut self) -> Step<Assignment> {
        let Some(max_var) = self.var_manager.max_var() else {
            return Ok(Assignment::default());
        };
        Ok(self
            .oracle
            .solution(max_var)
            .context("failed to get solution")?)
    }

    /// Gets the names of the tracked constraints in the core of the last
    /// unsatisfiable check, reduced according to the options and ordered by
    /// (source, sink)
    pub fn unsat_core(&mut self) -> Step<Vec<EdgeKey>> {
        let core = self.oracle.core().context("failed to get core")?;
        let core = self.core_selectors(core);
        let len = core.len();
        let base = self.scope_assumps();
        let core = self.trim_core(core, &base)?;
        let core = self.minimize_core(core, &base)?;
        self.log_core(len, core.len())?;
        let mut names: Vec<_> = core.into_iter().filter_map(|l| self.name_of(l)).collect();
        names.sort_unstable();
        Ok(names)
    }

    /// Re-solves under the core until it stops shrinking
    fn trim_core(&mut self, mut core: Vec<Lit>, base_assumps: &[Lit]) -> Step<Vec<Lit>> {
        if !self.opts.core_trimming || core.len() <= 1 {
            return Ok(core);
        }

        self.log_routine_start("core-trimming")?;

        let mut assumps = Vec::from(base_assumps);

        while core.len() > 1 {
            let size_before = core.len();
            assumps.extend_from_slice(&core);
            let ret = self.solve_limited(&assumps, None)?;
            debug_assert_eq!(ret, SolverResult::Unsat);
            if ret != SolverResult::Unsat {
                break;
            }
            core = self.core_selectors(self.oracle.core().context("failed to get core")?);
            if core.len() == size_before {
                break;
            }
            assumps.truncate(base_assumps.len());
        }

        self.log_routine_end()?;

        Ok(core)
    }

    /// Deletion-based core minimization under a conflict limit. Members
    /// whose removal cannot be decided within the limit are kept.
    fn minimize_core(&mut self, mut core: Vec<Lit>, base_assumps: &[Lit]) -> Step<Vec<Lit>> {
        if !self.opts.core_minimization || core.len() <= 1 {
            return Ok(core);
        }

        self.log_routine_start("core-minimization")?;

        let mut assumps = Vec::from(base_assumps);

        for drop_lit in core.clone() {
            if !core.contains(&drop_lit) {
                continue;
            }
            assumps.extend(core.iter().copied().filter(|&l| l != drop_lit));
            let ret = self.solve_limited(&assumps, Some(MINIMIZATION_CONFLICTS))?;
            if ret == SolverResult::Unsat {
                core = self.core_selectors(self.oracle.core().context("failed to get core")?);
            }
            assumps.truncate(base_assumps.len());
        }

        self.log_routine_end()?;

        Ok(core)
    }

    /// Performs linear sat-unsat search on an objective, under all open
    /// scopes and tracked constraints. The incumbent is updated with every
    /// improving solution, so it stays valid when the search terminates
    /// early. Returns false if there is no solution at all.
    ///
    /// The clauses of the objective encoding are added at the top level.
    pub fn minimize<PBE, CE>(
        &mut self,
        objective: &Objective,
        encoding: &mut ObjEncoding<PBE, CE>,
        lower_bound: usize,
        incumbent: &mut Option<Incumbent>,
        stage: Stage,
    ) -> Step<bool>
    where
        PBE: pb::BoundUpperIncremental,
        CE: card::BoundUpperIncremental,
    {
        self.log_routine_start("linsu")?;

        let base_assumps = self.assumptions();
        let mut assumps = base_assumps.clone();

        if incumbent.is_none() {
            if !self.decide_assumps(&assumps, stage, 0)? {
                self.log_routine_end()?;
                return Ok(false);
            }
            let solution = self.model()?;
            let cost = objective.evaluate(&solution);
            self.log_candidate(cost, Phase::Linsu)?;
            *incumbent = Some(Incumbent { cost, solution });
        }

        while let Some(cost) = incumbent
            .as_ref()
            .map(|inc| inc.cost)
            .filter(|&cost| cost > lower_bound)
        {
            let bound = cost - 1;
            encoding
                .encode_ub_change(bound..bound + 1, &mut self.oracle, &mut self.var_manager)
                .context("failed to encode objective bound")?;
            assumps.truncate(base_assumps.len());
            match encoding.enforce_ub(bound) {
                Ok(lits) => assumps.extend(lits),
                Err(rustsat::encodings::Error::Unsat) => break,
                Err(err) => {
                    return Err(Error::internal(
                        Stage::Encoding,
                        format!("cannot enforce objective bound {bound}: {err:?}"),
                    )
                    .into())
                }
            }
            if !self.decide_assumps(&assumps, stage, 0)? {
                break;
            }
            let solution = self.model()?;
            let new_cost = objective.evaluate(&solution);
            debug_assert!(new_cost < cost);
            self.log_candidate(new_cost, Phase::Linsu)?;
            *incumbent = Some(Incumbent {
                cost: new_cost,
                solution,
            });
        }

        self.log_routine_end()?;
        Ok(true)
    }
}
