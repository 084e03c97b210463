use serde::Serialize;
use std::fmt;

use kstep_smt::bmc::SmtRunProfile;

use crate::counterexample::Trace;

/// Outcome of one verification run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// No violation at any index up to `depth`. This is a bounded guarantee.
    SafeUpTo { depth: usize },
    /// A run from the initial state violates the property. The trace is
    /// complete; it is deduplicated only for display.
    Unsafe { trace: Trace },
    /// The property holds at every depth; the inductive step closed at `k`.
    ProvedForAllK { k: usize },
    /// Inconclusive (solver unknown, timeout or insufficient induction depth).
    Unknown { reason: String },
}

impl Verdict {
    /// Machine-readable verdict class.
    ///
    /// Depends only on the variant, not on depth or trace content.
    pub fn verdict_class(&self) -> &'static str {
        match self {
            Verdict::SafeUpTo { .. } => "safe",
            Verdict::Unsafe { .. } => "unsafe",
            Verdict::ProvedForAllK { .. } => "proved",
            Verdict::Unknown { .. } => "unknown",
        }
    }

    pub fn is_unsafe(&self) -> bool {
        matches!(self, Verdict::Unsafe { .. })
    }

    pub fn trace(&self) -> Option<&Trace> {
        match self {
            Verdict::Unsafe { trace } => Some(trace),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::SafeUpTo { depth } => {
                writeln!(f, "RESULT: SAFE")?;
                write!(f, "Verified up to depth {depth}.")
            }
            Verdict::Unsafe { trace } => {
                writeln!(f, "RESULT: UNSAFE")?;
                write!(f, "{}", trace.deduplicated())
            }
            Verdict::ProvedForAllK { k } => {
                writeln!(f, "RESULT: SAFE (unbounded)")?;
                write!(f, "Inductive step closed with induction depth k = {k}.")
            }
            Verdict::Unknown { reason } => {
                writeln!(f, "RESULT: UNKNOWN")?;
                write!(f, "Reason: {reason}")
            }
        }
    }
}

/// Solver workload of one run, as surfaced in JSON output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileSummary {
    pub encode_calls: u64,
    pub encode_elapsed_ms: u128,
    pub solve_calls: u64,
    pub solve_elapsed_ms: u128,
    pub assertion_candidates: u64,
    pub assertion_unique: u64,
    pub assertion_dedup_hits: u64,
    pub incremental_decl_reuse_hits: u64,
    pub incremental_assertion_reuse_hits: u64,
}

impl From<&SmtRunProfile> for ProfileSummary {
    fn from(p: &SmtRunProfile) -> Self {
        Self {
            encode_calls: p.encode_calls,
            encode_elapsed_ms: p.encode_elapsed_ms,
            solve_calls: p.solve_calls,
            solve_elapsed_ms: p.solve_elapsed_ms,
            assertion_candidates: p.assertion_candidates,
            assertion_unique: p.assertion_unique,
            assertion_dedup_hits: p.assertion_dedup_hits,
            incremental_decl_reuse_hits: p.incremental_decl_reuse_hits,
            incremental_assertion_reuse_hits: p.incremental_assertion_reuse_hits,
        }
    }
}

/// A verdict together with its diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub scenario: String,
    pub safety: String,
    #[serde(flatten)]
    pub verdict: Verdict,
    /// Counterexample to induction from the smallest failed step query. It
    /// ignores the initial predicate and is not a reachable run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cti: Option<Trace>,
    /// The counterexample with repeated discrete states merged, as shown in
    /// text output. Present exactly when the verdict is unsafe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deduplicated_trace: Option<Trace>,
    pub profile: ProfileSummary,
}

impl RunReport {
    pub fn new(
        scenario: String,
        safety: String,
        verdict: Verdict,
        cti: Option<Trace>,
        profile: ProfileSummary,
    ) -> Self {
        let deduplicated_trace = verdict.trace().map(Trace::deduplicated);
        Self {
            scenario,
            safety,
            verdict,
            cti,
            deduplicated_trace,
            profile,
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.verdict)?;
        if let Some(cti) = &self.cti {
            writeln!(f)?;
            writeln!(f)?;
            writeln!(
                f,
                "Counterexample to induction (not necessarily reachable):"
            )?;
            write!(f, "{cti}")?;
        }
        Ok(())
    }
}
