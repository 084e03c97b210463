use std::path::{Path, PathBuf};
use std::time::Instant;

use thiserror::Error;
use tracing::{info, warn};

use kstep_ir::{Scenario, ScenarioError};
use kstep_smt::backends::smtlib_printer::query_to_smt2_script;
use kstep_smt::backends::smtlib_process::{Dialect, SmtLibSolver};
use kstep_smt::backends::z3_backend::Z3Solver;
use kstep_smt::bmc::{
    reset_smt_run_profile, run_bmc_with_deadline, run_k_induction_up_to,
    run_k_induction_with_deadline, take_smt_run_profile, BmcError, BmcResult, KInductionResult,
    OVERALL_TIMEOUT_REASON,
};
use kstep_smt::encoder::euclid::EuclidSystem;
use kstep_smt::encoder::maritime::MaritimeSystem;
use kstep_smt::encoder::{
    encode_bmc, encode_k_induction_step, BmcEncoding, EncodeError, SafetyKind, TransitionSystem,
    Unroller,
};
use kstep_smt::solver::SmtSolver;

use crate::counterexample::{extract_trace, Trace};
use crate::result::{ProfileSummary, RunReport, Verdict};

mod timeout;

use timeout::{is_timeout_reason, timeout_unknown_reason, Budget};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),
    #[error("Solver error: {0}")]
    Solver(String),
    #[error("Encoding error: {0}")]
    Encode(String),
    #[error("Model inconsistency: {0}")]
    ModelInconsistency(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

impl<E: std::error::Error + 'static> From<BmcError<E>> for PipelineError {
    fn from(err: BmcError<E>) -> Self {
        match err {
            BmcError::Solver(e) => PipelineError::Solver(e.to_string()),
            BmcError::Encode(e) => PipelineError::Encode(e.to_string()),
        }
    }
}

/// Which solver backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverChoice {
    /// In-process Z3.
    #[default]
    Z3,
    /// `z3 -in -smt2` driven over SMT-LIB2.
    Z3Process,
    /// `cvc5 --incremental` driven over SMT-LIB2.
    Cvc5,
}

impl SolverChoice {
    pub fn name(self) -> &'static str {
        match self {
            SolverChoice::Z3 => "z3",
            SolverChoice::Z3Process => "z3-process",
            SolverChoice::Cvc5 => "cvc5",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "z3" => Some(SolverChoice::Z3),
            "z3-process" => Some(SolverChoice::Z3Process),
            "cvc5" => Some(SolverChoice::Cvc5),
            _ => None,
        }
    }
}

/// Options for the verification pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub solver: SolverChoice,
    pub max_depth: usize,
    /// Overall and per-check timeout; zero disables both.
    pub timeout_secs: u64,
    /// `None` selects the scenario's default predicate.
    pub safety: Option<SafetyKind>,
    /// Write the query as an SMT-LIB2 script before solving.
    pub dump_smt: Option<PathBuf>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            solver: SolverChoice::Z3,
            max_depth: 10,
            timeout_secs: 300,
            safety: None,
            dump_smt: None,
        }
    }
}

/// Validate a user-supplied bound (depth or k).
pub fn parse_bound(raw: i64) -> Result<usize, PipelineError> {
    Unroller::check_bound(raw).map_err(|e| PipelineError::Validation(e.to_string()))
}

/// A scenario compiled to its transition system.
#[derive(Debug, Clone)]
pub enum SystemModel {
    Maritime(MaritimeSystem),
    Euclid(EuclidSystem),
}

impl SystemModel {
    /// Validate `scenario` and build its system.
    pub fn build(scenario: &Scenario) -> Result<Self, PipelineError> {
        scenario.validate()?;
        let encode_err = |e: EncodeError| PipelineError::Encode(e.to_string());
        Ok(match scenario {
            Scenario::Maritime(s) => SystemModel::Maritime(MaritimeSystem::new(s).map_err(encode_err)?),
            Scenario::Euclid(s) => SystemModel::Euclid(EuclidSystem::new(s).map_err(encode_err)?),
        })
    }

    pub fn system(&self) -> &dyn TransitionSystem {
        match self {
            SystemModel::Maritime(s) => s,
            SystemModel::Euclid(s) => s,
        }
    }

    pub fn default_safety(&self) -> SafetyKind {
        match self {
            SystemModel::Maritime(_) => SafetyKind::Sufficient,
            SystemModel::Euclid(_) => SafetyKind::RemainderDecreasing,
        }
    }

    /// The requested predicate, or the default, checked against the system.
    pub fn resolve_safety(&self, requested: Option<SafetyKind>) -> Result<SafetyKind, PipelineError> {
        let kind = requested.unwrap_or_else(|| self.default_safety());
        let system = self.system();
        let mut unroller = Unroller::new(system.schema().clone());
        unroller
            .extend_to(0)
            .map_err(|e| PipelineError::Encode(e.to_string()))?;
        let state0 = unroller
            .state(0)
            .ok_or_else(|| PipelineError::Encode("unroller produced no state 0".into()))?;
        system
            .violation(kind, None, state0)
            .map_err(|e| PipelineError::Validation(e.to_string()))?;
        Ok(kind)
    }
}

#[derive(Debug, Clone, Copy)]
enum Query {
    Bmc { max_depth: usize },
    Induction { k: usize },
    InductionUpTo { max_k: usize },
}

impl Query {
    fn describe(self) -> String {
        match self {
            Query::Bmc { max_depth } => format!("BMC up to depth {max_depth}"),
            Query::Induction { k } => format!("k-induction at k = {k}"),
            Query::InductionUpTo { max_k } => format!("k-induction up to k = {max_k}"),
        }
    }
}

/// Bounded model checking: SAFE up to `options.max_depth`, or the shortest
/// counterexample.
pub fn check_bmc(scenario: &Scenario, options: &PipelineOptions) -> Result<Verdict, PipelineError> {
    Ok(check_bmc_report(scenario, options)?.verdict)
}

pub fn check_bmc_report(
    scenario: &Scenario,
    options: &PipelineOptions,
) -> Result<RunReport, PipelineError> {
    run(
        scenario,
        options,
        Query::Bmc {
            max_depth: options.max_depth,
        },
    )
}

/// k-induction at a single `k`: BMC base case up to `k`, then the inductive
/// step over `k + 2` states.
pub fn k_induction(
    scenario: &Scenario,
    k: usize,
    options: &PipelineOptions,
) -> Result<Verdict, PipelineError> {
    Ok(k_induction_report(scenario, k, options)?.verdict)
}

pub fn k_induction_report(
    scenario: &Scenario,
    k: usize,
    options: &PipelineOptions,
) -> Result<RunReport, PipelineError> {
    run(scenario, options, Query::Induction { k })
}

/// k-induction for every `k` in `0..=max_k`, stopping at the first proof or
/// counterexample.
pub fn prove_up_to(
    scenario: &Scenario,
    max_k: usize,
    options: &PipelineOptions,
) -> Result<Verdict, PipelineError> {
    Ok(prove_up_to_report(scenario, max_k, options)?.verdict)
}

pub fn prove_up_to_report(
    scenario: &Scenario,
    max_k: usize,
    options: &PipelineOptions,
) -> Result<RunReport, PipelineError> {
    run(scenario, options, Query::InductionUpTo { max_k })
}

fn run(scenario: &Scenario, options: &PipelineOptions, query: Query) -> Result<RunReport, PipelineError> {
    let model = SystemModel::build(scenario)?;
    let safety = model.resolve_safety(options.safety)?;
    let system = model.system();
    info!(
        scenario = system.name(),
        safety = %safety,
        solver = options.solver.name(),
        query = %query.describe(),
        "starting verification"
    );

    if let Some(path) = &options.dump_smt {
        dump_query(system, safety, query, path)?;
    }

    let budget = Budget::start(options.timeout_secs);
    let deadline = budget.deadline();
    let check_timeout_secs = budget.per_check_secs();
    reset_smt_run_profile();
    let outcome = match options.solver {
        SolverChoice::Z3 => {
            let mut solver = Z3Solver::with_timeout_secs(check_timeout_secs);
            run_query(&mut solver, system, safety, query, deadline)
        }
        SolverChoice::Z3Process => {
            let mut solver = SmtLibSolver::with_timeout_secs(Dialect::Z3, check_timeout_secs)
                .map_err(|e| PipelineError::Solver(e.to_string()))?;
            run_query(&mut solver, system, safety, query, deadline)
        }
        SolverChoice::Cvc5 => {
            let mut solver = SmtLibSolver::with_timeout_secs(Dialect::Cvc5, check_timeout_secs)
                .map_err(|e| PipelineError::Solver(e.to_string()))?;
            run_query(&mut solver, system, safety, query, deadline)
        }
    };
    let profile = take_smt_run_profile();
    let (verdict, cti) = outcome?;
    info!(
        verdict = verdict.verdict_class(),
        solve_calls = profile.solve_calls,
        solve_ms = profile.solve_elapsed_ms as u64,
        "verification finished"
    );

    Ok(RunReport::new(
        system.name().to_string(),
        safety.name().to_string(),
        verdict,
        cti,
        ProfileSummary::from(&profile),
    ))
}

fn run_query<S: SmtSolver>(
    solver: &mut S,
    system: &dyn TransitionSystem,
    safety: SafetyKind,
    query: Query,
    deadline: Option<Instant>,
) -> Result<(Verdict, Option<Trace>), PipelineError> {
    match query {
        Query::Bmc { max_depth } => {
            let result = run_bmc_with_deadline(solver, system, safety, max_depth, deadline)?;
            let verdict = match result {
                BmcResult::Safe { depth_checked } => Verdict::SafeUpTo {
                    depth: depth_checked,
                },
                BmcResult::Unsafe { depth, model } => Verdict::Unsafe {
                    trace: extract_trace(system, &model, depth, Some(depth))?,
                },
                BmcResult::Unknown { depth, reason } => Verdict::Unknown {
                    reason: unknown_reason(reason, &format!("BMC at depth {depth}")),
                },
            };
            Ok((verdict, None))
        }
        Query::Induction { k } => {
            let result = run_k_induction_with_deadline(solver, system, safety, k, deadline)?;
            induction_verdict(system, result, &format!("k-induction at k = {k}"))
        }
        Query::InductionUpTo { max_k } => {
            let result = run_k_induction_up_to(solver, system, safety, max_k, deadline)?;
            induction_verdict(system, result, &format!("k-induction up to k = {max_k}"))
        }
    }
}

fn induction_verdict(
    system: &dyn TransitionSystem,
    result: KInductionResult,
    context: &str,
) -> Result<(Verdict, Option<Trace>), PipelineError> {
    match result {
        KInductionResult::Proved { k } => Ok((Verdict::ProvedForAllK { k }, None)),
        KInductionResult::Unsafe { depth, model } => {
            let trace = extract_trace(system, &model, depth, Some(depth))?;
            Ok((Verdict::Unsafe { trace }, None))
        }
        KInductionResult::Unknown { reason } => Ok((
            Verdict::Unknown {
                reason: unknown_reason(reason, context),
            },
            None,
        )),
        KInductionResult::NotProved { k, cti } => {
            let cti = cti
                .map(|cti| extract_trace(system, &cti.model, cti.k + 1, Some(cti.k + 1)))
                .transpose()?;
            Ok((
                Verdict::Unknown {
                    reason: format!("induction depth k={k} insufficient"),
                },
                cti,
            ))
        }
    }
}

fn unknown_reason(reason: String, context: &str) -> String {
    if reason != OVERALL_TIMEOUT_REASON && is_timeout_reason(&reason) {
        timeout_unknown_reason(context)
    } else {
        reason
    }
}

/// Write the query at the run's bound: the BMC query at the maximum depth, or
/// the inductive-step query.
fn dump_query(
    system: &dyn TransitionSystem,
    safety: SafetyKind,
    query: Query,
    path: &Path,
) -> Result<(), PipelineError> {
    let encode_err = |e: EncodeError| PipelineError::Encode(e.to_string());
    let encoding: BmcEncoding = match query {
        Query::Bmc { max_depth } => {
            encode_bmc(system, safety, bound_i64(max_depth)).map_err(encode_err)?
        }
        Query::Induction { k } | Query::InductionUpTo { max_k: k } => {
            encode_k_induction_step(system, safety, bound_i64(k)).map_err(encode_err)?
        }
    };
    let smt = query_to_smt2_script(&encoding.declarations, &encoding.assertions);
    if let Err(e) = std::fs::write(path, smt) {
        warn!(path = %path.display(), error = %e, "could not write SMT dump");
    } else {
        info!(path = %path.display(), "SMT dump written");
    }
    Ok(())
}

fn bound_i64(bound: usize) -> i64 {
    i64::try_from(bound).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kstep_ir::{EuclidScenario, MaritimeScenario};

    #[test]
    fn negative_bound_is_a_validation_error() {
        assert!(matches!(parse_bound(-1), Err(PipelineError::Validation(_))));
        assert_eq!(parse_bound(30).unwrap(), 30);
    }

    #[test]
    fn default_safety_follows_scenario_kind() {
        let maritime = SystemModel::build(&Scenario::Maritime(MaritimeScenario::canonical())).unwrap();
        assert_eq!(maritime.resolve_safety(None).unwrap(), SafetyKind::Sufficient);
        let euclid = SystemModel::build(&Scenario::Euclid(EuclidScenario::canonical())).unwrap();
        assert_eq!(
            euclid.resolve_safety(None).unwrap(),
            SafetyKind::RemainderDecreasing
        );
    }

    #[test]
    fn mismatched_predicate_is_rejected_before_solving() {
        let euclid = Scenario::Euclid(EuclidScenario::canonical());
        let options = PipelineOptions {
            safety: Some(SafetyKind::Strong),
            // would fail to spawn if a solver were created
            solver: SolverChoice::Cvc5,
            ..PipelineOptions::default()
        };
        assert!(matches!(
            check_bmc(&euclid, &options),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn invalid_scenario_is_rejected_before_solving() {
        let mut scenario = MaritimeScenario::canonical();
        scenario.agents[0].adjacency = kstep_ir::AdjacencyMap::new();
        let err = check_bmc(&Scenario::Maritime(scenario), &PipelineOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Scenario(ScenarioError::EmptyAdjacency { .. })));
    }

    #[test]
    fn solver_names_parse_back() {
        for choice in [SolverChoice::Z3, SolverChoice::Z3Process, SolverChoice::Cvc5] {
            assert_eq!(SolverChoice::parse(choice.name()), Some(choice));
        }
        assert_eq!(SolverChoice::parse("yices"), None);
    }

    #[test]
    fn timeout_reasons_are_rewritten_with_context() {
        assert_eq!(
            unknown_reason("canceled".into(), "BMC at depth 3"),
            "BMC at depth 3 timed out before completion."
        );
        assert_eq!(
            unknown_reason(OVERALL_TIMEOUT_REASON.into(), "BMC at depth 3"),
            OVERALL_TIMEOUT_REASON
        );
        assert_eq!(unknown_reason("incomplete".into(), "x"), "incomplete");
    }
}
