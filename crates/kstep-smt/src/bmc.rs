//! Drivers that turn encodings into solver queries: incremental BMC and
//! k-induction (single `k` or iterated).

use std::cell::RefCell;
use std::collections::HashSet;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backends::smtlib_printer::to_smtlib;
use crate::encoder::{encode_bmc, encode_k_induction_step, BmcEncoding, EncodeError};
use crate::encoder::{SafetyKind, TransitionSystem};
use crate::solver::{Model, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

pub const OVERALL_TIMEOUT_REASON: &str = "Overall time budget ran out before the analysis finished.";

pub fn deadline_exceeded(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|at| Instant::now() >= at)
}

/// Counters accumulated over one pipeline run on the current thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmtRunProfile {
    pub encode_calls: u64,
    pub encode_elapsed_ms: u128,
    pub solve_calls: u64,
    pub solve_elapsed_ms: u128,
    pub assertion_candidates: u64,
    pub assertion_unique: u64,
    pub assertion_dedup_hits: u64,
    /// BMC depths that reused anything loaded at a shallower depth.
    pub incremental_depth_reuse_steps: u64,
    pub incremental_decl_reuse_hits: u64,
    pub incremental_assertion_reuse_hits: u64,
}

impl SmtRunProfile {
    fn note_encoding(&mut self, encoding: &BmcEncoding, elapsed_ms: u128) {
        let count = |n: usize| u64::try_from(n).unwrap_or(u64::MAX);
        self.encode_calls += 1;
        self.encode_elapsed_ms += elapsed_ms;
        self.assertion_candidates += count(encoding.assertion_candidates());
        self.assertion_unique += count(encoding.assertion_unique());
        self.assertion_dedup_hits += count(encoding.assertion_dedup_hits());
    }

    fn note_solve(&mut self, elapsed_ms: u128) {
        self.solve_calls += 1;
        self.solve_elapsed_ms += elapsed_ms;
    }

    fn note_reuse(&mut self, reuse: Reuse) {
        if reuse.declarations == 0 && reuse.assertions == 0 {
            return;
        }
        self.incremental_depth_reuse_steps += 1;
        self.incremental_decl_reuse_hits += reuse.declarations;
        self.incremental_assertion_reuse_hits += reuse.assertions;
    }
}

thread_local! {
    static PROFILE: RefCell<SmtRunProfile> = RefCell::new(SmtRunProfile::default());
}

fn with_profile<R>(f: impl FnOnce(&mut SmtRunProfile) -> R) -> R {
    PROFILE.with(|cell| f(&mut cell.borrow_mut()))
}

pub fn reset_smt_run_profile() {
    with_profile(|p| *p = SmtRunProfile::default());
}

pub fn current_smt_run_profile() -> SmtRunProfile {
    with_profile(|p| p.clone())
}

pub fn take_smt_run_profile() -> SmtRunProfile {
    with_profile(std::mem::take)
}

fn encode_timed(
    what: &'static str,
    encode: impl FnOnce() -> Result<BmcEncoding, EncodeError>,
) -> Result<BmcEncoding, EncodeError> {
    let started = Instant::now();
    let encoding = encode()?;
    with_profile(|p| p.note_encoding(&encoding, started.elapsed().as_millis()));
    debug!(
        query = what,
        declarations = encoding.declarations.len(),
        assertions = encoding.assertion_unique(),
        dedup_hits = encoding.assertion_dedup_hits(),
        "encoded"
    );
    Ok(encoding)
}

fn to_bound(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[derive(Debug, Error)]
pub enum BmcError<E>
where
    E: std::error::Error + 'static,
{
    #[error("solver error: {0}")]
    Solver(#[source] E),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Outcome of iterative-deepening BMC.
#[derive(Debug)]
pub enum BmcResult {
    /// Every depth up to and including `depth_checked` was unsat.
    Safe { depth_checked: usize },
    /// The shallowest violating run ends at `depth`.
    Unsafe { depth: usize, model: Model },
    Unknown { depth: usize, reason: String },
}

#[derive(Debug)]
pub enum KInductionResult {
    /// Base and step both closed at `k`.
    Proved { k: usize },
    /// The base case found a reachable violation.
    Unsafe { depth: usize, model: Model },
    Unknown { reason: String },
    /// The step was satisfiable at every `k` tried; `k` is the last one.
    NotProved {
        k: usize,
        cti: Option<KInductionCti>,
    },
}

/// Model of a satisfiable step query over states `0..=k+1`. The first state
/// is unconstrained by the initial predicate, so it need not be reachable.
#[derive(Debug, Clone)]
pub struct KInductionCti {
    pub k: usize,
    pub model: Model,
}

#[derive(Debug, Clone, Copy, Default)]
struct Reuse {
    declarations: u64,
    assertions: u64,
}

/// What has already been sent to a solver since its last reset. Lets BMC
/// extend the previous depth's query instead of rebuilding it.
#[derive(Default)]
struct LoadedQuery {
    declared: HashSet<String>,
    asserted: HashSet<String>,
}

impl LoadedQuery {
    fn load<S: SmtSolver + ?Sized>(
        &mut self,
        solver: &mut S,
        declarations: &[(String, SmtSort)],
        assertions: &[SmtTerm],
    ) -> Result<Reuse, S::Error> {
        let mut reuse = Reuse::default();
        for (name, sort) in declarations {
            if self.declared.insert(name.clone()) {
                solver.declare_var(name, sort)?;
            } else {
                reuse.declarations += 1;
            }
        }
        for assertion in assertions {
            if self.asserted.insert(to_smtlib(assertion)) {
                solver.assert(assertion)?;
            } else {
                reuse.assertions += 1;
            }
        }
        Ok(reuse)
    }
}

/// A single satisfiability answer, with `sat` guaranteed to carry a model.
enum Outcome {
    Holds,
    Witness(Model),
    Unknown(String),
}

fn check_violation<S: SmtSolver + ?Sized>(
    solver: &mut S,
    encoding: &BmcEncoding,
) -> Result<Outcome, S::Error> {
    let wanted: Vec<(&str, &SmtSort)> = encoding
        .model_vars
        .iter()
        .map(|(name, sort)| (name.as_str(), sort))
        .collect();
    let started = Instant::now();
    let answer = solver.check_sat_with_model(&wanted);
    with_profile(|p| p.note_solve(started.elapsed().as_millis()));
    Ok(match answer? {
        (SatResult::Unsat, _) => Outcome::Holds,
        (SatResult::Sat, Some(model)) => Outcome::Witness(model),
        (SatResult::Sat, None) => Outcome::Unknown("solver answered sat without a model".into()),
        (SatResult::Unknown(reason), _) => Outcome::Unknown(reason),
    })
}

pub fn run_bmc<S, T>(
    solver: &mut S,
    system: &T,
    safety: SafetyKind,
    max_depth: usize,
) -> Result<BmcResult, BmcError<S::Error>>
where
    S: SmtSolver + ?Sized,
    T: TransitionSystem + ?Sized,
{
    run_bmc_with_deadline(solver, system, safety, max_depth, None)
}

/// Check depths `0..=max_depth` in order, so the first `sat` is a shortest
/// counterexample. The prefix shared between depths stays asserted and only
/// each depth's violation disjunction is scoped by push/pop.
pub fn run_bmc_with_deadline<S, T>(
    solver: &mut S,
    system: &T,
    safety: SafetyKind,
    max_depth: usize,
    deadline: Option<Instant>,
) -> Result<BmcResult, BmcError<S::Error>>
where
    S: SmtSolver + ?Sized,
    T: TransitionSystem + ?Sized,
{
    solver.reset().map_err(BmcError::Solver)?;
    let mut loaded = LoadedQuery::default();

    for depth in 0..=max_depth {
        if deadline_exceeded(deadline) {
            warn!(depth, "bmc: out of time");
            return Ok(BmcResult::Unknown {
                depth,
                reason: OVERALL_TIMEOUT_REASON.into(),
            });
        }
        let encoding = encode_timed("bmc", || encode_bmc(system, safety, to_bound(depth)))?;
        let Some((violation, prefix)) = encoding.split_violation() else {
            return Ok(BmcResult::Unknown {
                depth,
                reason: format!("empty BMC encoding at depth {depth}"),
            });
        };
        let reuse = loaded
            .load(solver, &encoding.declarations, prefix)
            .map_err(BmcError::Solver)?;
        with_profile(|p| p.note_reuse(reuse));

        solver.push().map_err(BmcError::Solver)?;
        solver.assert(violation).map_err(BmcError::Solver)?;
        let answer = check_violation(solver, &encoding).map_err(BmcError::Solver)?;
        solver.pop().map_err(BmcError::Solver)?;

        match answer {
            Outcome::Holds => debug!(depth, "bmc: no violation"),
            Outcome::Witness(model) => {
                info!(depth, "bmc: violation reachable");
                return Ok(BmcResult::Unsafe { depth, model });
            }
            Outcome::Unknown(reason) => {
                warn!(depth, %reason, "bmc: inconclusive");
                return Ok(BmcResult::Unknown { depth, reason });
            }
        }
    }

    info!(max_depth, "bmc: no violation within bound");
    Ok(BmcResult::Safe {
        depth_checked: max_depth,
    })
}

pub fn run_k_induction<S, T>(
    solver: &mut S,
    system: &T,
    safety: SafetyKind,
    k: usize,
) -> Result<KInductionResult, BmcError<S::Error>>
where
    S: SmtSolver + ?Sized,
    T: TransitionSystem + ?Sized,
{
    run_k_induction_with_deadline(solver, system, safety, k, None)
}

/// k-induction at one `k`: the base case is BMC to depth `k`; the step asks
/// for `k + 1` consecutive safe states followed by an unsafe one, starting
/// anywhere.
pub fn run_k_induction_with_deadline<S, T>(
    solver: &mut S,
    system: &T,
    safety: SafetyKind,
    k: usize,
    deadline: Option<Instant>,
) -> Result<KInductionResult, BmcError<S::Error>>
where
    S: SmtSolver + ?Sized,
    T: TransitionSystem + ?Sized,
{
    match run_bmc_with_deadline(solver, system, safety, k, deadline)? {
        BmcResult::Safe { .. } => {}
        BmcResult::Unsafe { depth, model } => {
            return Ok(KInductionResult::Unsafe { depth, model })
        }
        BmcResult::Unknown { reason, .. } => return Ok(KInductionResult::Unknown { reason }),
    }
    if deadline_exceeded(deadline) {
        warn!(k, "k-induction: out of time before the step");
        return Ok(KInductionResult::Unknown {
            reason: OVERALL_TIMEOUT_REASON.into(),
        });
    }

    solver.reset().map_err(BmcError::Solver)?;
    let encoding = encode_timed("step", || encode_k_induction_step(system, safety, to_bound(k)))?;
    solver
        .declare_all(&encoding.declarations)
        .map_err(BmcError::Solver)?;
    solver
        .assert_all(&encoding.assertions)
        .map_err(BmcError::Solver)?;

    Ok(match check_violation(solver, &encoding).map_err(BmcError::Solver)? {
        Outcome::Holds => {
            info!(k, "k-induction: step closed");
            KInductionResult::Proved { k }
        }
        Outcome::Witness(model) => {
            info!(k, "k-induction: step open");
            KInductionResult::NotProved {
                k,
                cti: Some(KInductionCti { k, model }),
            }
        }
        Outcome::Unknown(reason) => {
            warn!(k, %reason, "k-induction: step inconclusive");
            KInductionResult::Unknown { reason }
        }
    })
}

/// k-induction for `k = 0, 1, ..., max_k` until something other than an open
/// step comes back. If every step stays open the shallowest CTI is kept.
pub fn run_k_induction_up_to<S, T>(
    solver: &mut S,
    system: &T,
    safety: SafetyKind,
    max_k: usize,
    deadline: Option<Instant>,
) -> Result<KInductionResult, BmcError<S::Error>>
where
    S: SmtSolver + ?Sized,
    T: TransitionSystem + ?Sized,
{
    let mut shallowest: Option<KInductionCti> = None;
    for k in 0..=max_k {
        if deadline_exceeded(deadline) {
            return Ok(KInductionResult::Unknown {
                reason: OVERALL_TIMEOUT_REASON.into(),
            });
        }
        match run_k_induction_with_deadline(solver, system, safety, k, deadline)? {
            KInductionResult::NotProved { cti, .. } => {
                shallowest = shallowest.or(cti);
            }
            settled => return Ok(settled),
        }
    }
    Ok(KInductionResult::NotProved {
        k: max_k,
        cti: shallowest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::euclid::EuclidSystem;
    use kstep_ir::EuclidScenario;
    use std::collections::VecDeque;
    use std::io;
    use std::time::Duration;

    /// Replays scripted check results and records how it was driven.
    #[derive(Default)]
    struct MockSolver {
        script: VecDeque<SatResult>,
        omit_model: bool,
        declared: HashSet<String>,
        assertions: usize,
        scope_depth: usize,
        max_scope_depth: usize,
        checks: usize,
        resets: usize,
    }

    impl MockSolver {
        fn scripted(results: impl IntoIterator<Item = SatResult>) -> Self {
            Self {
                script: results.into_iter().collect(),
                ..Self::default()
            }
        }
    }

    impl SmtSolver for MockSolver {
        type Error = io::Error;

        fn declare_var(&mut self, name: &str, _sort: &SmtSort) -> Result<(), io::Error> {
            if !self.declared.insert(name.to_string()) {
                return Err(io::Error::other(format!("`{name}` declared twice")));
            }
            Ok(())
        }

        fn assert(&mut self, _term: &SmtTerm) -> Result<(), io::Error> {
            self.assertions += 1;
            Ok(())
        }

        fn push(&mut self) -> Result<(), io::Error> {
            self.scope_depth += 1;
            self.max_scope_depth = self.max_scope_depth.max(self.scope_depth);
            Ok(())
        }

        fn pop(&mut self) -> Result<(), io::Error> {
            self.scope_depth = self
                .scope_depth
                .checked_sub(1)
                .ok_or_else(|| io::Error::other("pop without push"))?;
            Ok(())
        }

        fn check_sat(&mut self) -> Result<SatResult, io::Error> {
            self.checks += 1;
            Ok(self.script.pop_front().unwrap_or(SatResult::Unsat))
        }

        fn check_sat_with_model(
            &mut self,
            _var_names: &[(&str, &SmtSort)],
        ) -> Result<(SatResult, Option<Model>), io::Error> {
            let result = self.check_sat()?;
            let model = (result == SatResult::Sat && !self.omit_model).then(Model::default);
            Ok((result, model))
        }

        fn reset(&mut self) -> Result<(), io::Error> {
            self.resets += 1;
            self.declared.clear();
            self.scope_depth = 0;
            Ok(())
        }
    }

    fn euclid() -> EuclidSystem {
        EuclidSystem::new(&EuclidScenario::canonical()).unwrap()
    }

    const REMAINDER: SafetyKind = SafetyKind::RemainderDecreasing;

    #[test]
    fn bmc_reports_first_sat_depth() {
        let mut solver = MockSolver::scripted([SatResult::Unsat, SatResult::Unsat, SatResult::Sat]);
        let result = run_bmc(&mut solver, &euclid(), REMAINDER, 10).unwrap();
        match result {
            BmcResult::Unsafe { depth, .. } => assert_eq!(depth, 2),
            other => panic!("Expected Unsafe, got: {other:?}"),
        }
        assert_eq!(solver.checks, 3);
    }

    #[test]
    fn bmc_propagates_unknown_with_depth() {
        let mut solver = MockSolver::scripted([
            SatResult::Unsat,
            SatResult::Unknown("resource limit".into()),
        ]);
        match run_bmc(&mut solver, &euclid(), REMAINDER, 10).unwrap() {
            BmcResult::Unknown { depth, reason } => {
                assert_eq!(depth, 1);
                assert_eq!(reason, "resource limit");
            }
            other => panic!("Expected Unknown, got: {other:?}"),
        }
    }

    #[test]
    fn bmc_balances_push_and_pop_and_declares_once() {
        let mut solver = MockSolver::default();
        match run_bmc(&mut solver, &euclid(), REMAINDER, 4).unwrap() {
            BmcResult::Safe { depth_checked } => assert_eq!(depth_checked, 4),
            other => panic!("Expected Safe, got: {other:?}"),
        }
        assert_eq!(solver.scope_depth, 0);
        assert_eq!(solver.max_scope_depth, 1);
        assert_eq!(solver.checks, 5);
        // 9 fields x 5 states, each declared exactly once
        assert_eq!(solver.declared.len(), 45);
    }

    #[test]
    fn bmc_reuses_assertions_across_depths() {
        reset_smt_run_profile();
        let mut solver = MockSolver::default();
        run_bmc(&mut solver, &euclid(), REMAINDER, 2).unwrap();
        let profile = take_smt_run_profile();
        assert_eq!(profile.encode_calls, 3);
        assert_eq!(profile.solve_calls, 3);
        assert_eq!(profile.incremental_depth_reuse_steps, 2);
        // depth 0: init, depth 1: +1 transition, depth 2: +1 transition;
        // plus one violation per depth
        assert_eq!(solver.assertions, 3 + 3);
    }

    #[test]
    fn sat_without_model_is_unknown() {
        let mut solver = MockSolver::scripted([SatResult::Sat]);
        solver.omit_model = true;
        match run_bmc(&mut solver, &euclid(), REMAINDER, 3).unwrap() {
            BmcResult::Unknown { depth, reason } => {
                assert_eq!(depth, 0);
                assert!(reason.contains("without a model"), "{reason}");
            }
            other => panic!("Expected Unknown, got: {other:?}"),
        }
    }

    #[test]
    fn expired_deadline_stops_before_any_check() {
        let mut solver = MockSolver::default();
        let past = Instant::now()
            .checked_sub(Duration::from_millis(1))
            .unwrap_or_else(Instant::now);
        match run_bmc_with_deadline(&mut solver, &euclid(), REMAINDER, 3, Some(past)).unwrap() {
            BmcResult::Unknown { reason, .. } => assert_eq!(reason, OVERALL_TIMEOUT_REASON),
            other => panic!("Expected Unknown, got: {other:?}"),
        }
        assert_eq!(solver.checks, 0);
    }

    #[test]
    fn encode_errors_are_not_solver_errors() {
        let mut solver = MockSolver::default();
        let err = run_bmc(&mut solver, &euclid(), SafetyKind::Sufficient, 3).unwrap_err();
        assert!(matches!(
            err,
            BmcError::Encode(EncodeError::UnsupportedPredicate { .. })
        ));
    }

    #[test]
    fn k_induction_proves_when_step_is_unsat() {
        let mut solver = MockSolver::default();
        match run_k_induction(&mut solver, &euclid(), REMAINDER, 1).unwrap() {
            KInductionResult::Proved { k } => assert_eq!(k, 1),
            other => panic!("Expected Proved, got: {other:?}"),
        }
        // base depths 0 and 1, then the step query
        assert_eq!(solver.checks, 3);
        assert_eq!(solver.resets, 2);
    }

    #[test]
    fn k_induction_reports_cti_when_step_is_sat() {
        let mut solver = MockSolver::scripted([SatResult::Unsat, SatResult::Sat]);
        match run_k_induction(&mut solver, &euclid(), REMAINDER, 0).unwrap() {
            KInductionResult::NotProved { k, cti } => {
                assert_eq!(k, 0);
                assert_eq!(cti.map(|c| c.k), Some(0));
            }
            other => panic!("Expected NotProved, got: {other:?}"),
        }
    }

    #[test]
    fn k_induction_base_counterexample_wins() {
        let mut solver = MockSolver::scripted([SatResult::Sat]);
        match run_k_induction(&mut solver, &euclid(), REMAINDER, 2).unwrap() {
            KInductionResult::Unsafe { depth, .. } => assert_eq!(depth, 0),
            other => panic!("Expected Unsafe, got: {other:?}"),
        }
    }

    #[test]
    fn k_induction_up_to_keeps_first_cti() {
        // k=0: base unsat, step sat; k=1: base unsat x2, step sat
        let mut solver = MockSolver::scripted([
            SatResult::Unsat,
            SatResult::Sat,
            SatResult::Unsat,
            SatResult::Unsat,
            SatResult::Sat,
        ]);
        match run_k_induction_up_to(&mut solver, &euclid(), REMAINDER, 1, None).unwrap() {
            KInductionResult::NotProved { k, cti } => {
                assert_eq!(k, 1);
                assert_eq!(cti.map(|c| c.k), Some(0));
            }
            other => panic!("Expected NotProved, got: {other:?}"),
        }
    }

    #[test]
    fn profile_helpers_reset_and_take() {
        reset_smt_run_profile();
        with_profile(|p| {
            p.note_solve(50);
            p.note_solve(25);
            p.note_reuse(Reuse::default());
        });
        let p = current_smt_run_profile();
        assert_eq!(p.solve_calls, 2);
        assert_eq!(p.solve_elapsed_ms, 75);
        assert_eq!(p.incremental_depth_reuse_steps, 0);
        let taken = take_smt_run_profile();
        assert_eq!(taken, p);
        assert_eq!(current_smt_run_profile(), SmtRunProfile::default());
    }

    #[test]
    fn deadline_exceeded_handles_none_and_future() {
        assert!(!deadline_exceeded(None));
        assert!(!deadline_exceeded(Some(Instant::now() + Duration::from_secs(300))));
    }
}
