use std::collections::HashSet;

use thiserror::Error;

use crate::backends::smtlib_printer::to_smtlib;
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

pub mod agent;
pub mod arbiter;
pub mod euclid;
mod k_induction;
pub mod maritime;
pub mod safety;
pub mod system;
pub mod variables;

pub use k_induction::encode_k_induction_step;
pub use safety::SafetyKind;
pub use system::{AgentView, TransitionSystem};
pub use variables::{FieldKind, StateVector, Unroller};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("bound must be non-negative, got {0}")]
    NegativeBound(i64),
    #[error("invalid state variable name `{0}` (expected [A-Za-z][A-Za-z0-9]*)")]
    InvalidBaseName(String),
    #[error("duplicate state variable `{0}`")]
    DuplicateField(String),
    #[error("variable `{name}` already exists with sort {existing}, requested {requested}")]
    SortConflict {
        name: String,
        existing: SmtSort,
        requested: SmtSort,
    },
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),
    #[error("agent {agent} has no parameters for resource {resource}")]
    MissingParams { agent: String, resource: i64 },
    #[error("safety predicate `{predicate}` does not apply to system `{system}`")]
    UnsupportedPredicate { predicate: String, system: String },
}

/// Declarations and assertions of one unrolled query.
///
/// Structurally equal assertions (up to operand order of commutative
/// operators) are kept once; the last assertion of a BMC query is always its
/// violation.
pub struct BmcEncoding {
    pub declarations: Vec<(String, SmtSort)>,
    pub assertions: Vec<SmtTerm>,
    /// Symbols read back from a model; currently every declared symbol.
    pub model_vars: Vec<(String, SmtSort)>,
    pub unroller: Unroller,
    seen: HashSet<String>,
    offered: usize,
    duplicates: usize,
}

impl BmcEncoding {
    fn new(unroller: Unroller) -> Self {
        let declarations = unroller.declarations();
        Self {
            model_vars: declarations.clone(),
            declarations,
            assertions: Vec::new(),
            unroller,
            seen: HashSet::new(),
            offered: 0,
            duplicates: 0,
        }
    }

    fn assert_term(&mut self, term: SmtTerm) {
        self.offered += 1;
        if self.seen.insert(dedup_key(&term)) {
            self.assertions.push(term);
        } else {
            self.duplicates += 1;
        }
    }

    fn push_violation(&mut self, term: SmtTerm) {
        self.offered += 1;
        self.assertions.push(term);
    }

    /// Assertions offered by the encoder, duplicates included.
    pub fn assertion_candidates(&self) -> usize {
        self.offered
    }

    pub fn assertion_unique(&self) -> usize {
        self.assertions.len()
    }

    pub fn assertion_dedup_hits(&self) -> usize {
        self.duplicates
    }

    /// Every symbol an assertion mentions must be declared.
    pub fn ensure_closed(&self) -> Result<(), EncodeError> {
        let declared: HashSet<&str> = self.declarations.iter().map(|(n, _)| n.as_str()).collect();
        let mut missing = None;
        for assertion in &self.assertions {
            assertion.for_each_symbol(&mut |s| {
                if missing.is_none() && !declared.contains(s.as_str()) {
                    missing = Some(s.to_string());
                }
            });
        }
        match missing {
            Some(name) => Err(EncodeError::UnknownVariable(name)),
            None => Ok(()),
        }
    }

    /// The final assertion and everything before it.
    pub fn split_violation(&self) -> Option<(&SmtTerm, &[SmtTerm])> {
        self.assertions.split_last()
    }
}

pub(crate) fn dedup_key(term: &SmtTerm) -> String {
    let mut key = String::new();
    write_key(term, &mut key);
    key
}

fn write_key(term: &SmtTerm, out: &mut String) {
    let (head, operands, commutative): (&str, Vec<&SmtTerm>, bool) = match term {
        SmtTerm::Var(_) | SmtTerm::IntLit(_) | SmtTerm::RealLit(_) | SmtTerm::BoolLit(_) => {
            out.push_str(&to_smtlib(term));
            return;
        }
        SmtTerm::Add(a, b) => ("+", vec![&**a, &**b], true),
        SmtTerm::Mul(a, b) => ("*", vec![&**a, &**b], true),
        SmtTerm::Eq(a, b) => ("=", vec![&**a, &**b], true),
        SmtTerm::Sub(a, b) => ("-", vec![&**a, &**b], false),
        SmtTerm::Lt(a, b) => ("<", vec![&**a, &**b], false),
        SmtTerm::Le(a, b) => ("<=", vec![&**a, &**b], false),
        SmtTerm::Gt(a, b) => (">", vec![&**a, &**b], false),
        SmtTerm::Ge(a, b) => (">=", vec![&**a, &**b], false),
        SmtTerm::Implies(a, b) => ("=>", vec![&**a, &**b], false),
        SmtTerm::Neg(a) => ("neg", vec![&**a], false),
        SmtTerm::Not(a) => ("not", vec![&**a], false),
        SmtTerm::Ite(c, t, e) => ("ite", vec![&**c, &**t, &**e], false),
        SmtTerm::And(parts) => ("and", parts.iter().collect(), true),
        SmtTerm::Or(parts) => ("or", parts.iter().collect(), true),
    };
    let mut keys: Vec<String> = operands.into_iter().map(dedup_key).collect();
    if commutative {
        keys.sort_unstable();
    }
    out.push('(');
    out.push_str(head);
    for key in keys {
        out.push(' ');
        out.push_str(&key);
    }
    out.push(')');
}

/// Unroll `system` over states `0..=depth`: invariants at every index,
/// transitions between consecutive indices and, optionally, the initial
/// predicate at index 0. Property assertions are added by the callers.
pub fn encode_unrolling<T: TransitionSystem + ?Sized>(
    system: &T,
    depth: i64,
    with_initial: bool,
) -> Result<BmcEncoding, EncodeError> {
    let mut unroller = Unroller::new(system.schema().clone());
    unroller.instantiate(depth)?;
    let mut enc = BmcEncoding::new(unroller.clone());

    let states = unroller.states();
    if with_initial {
        enc.assert_term(system.initial(&states[0]));
    }
    for state in states {
        for invariant in system.invariants(state) {
            enc.assert_term(invariant);
        }
    }
    for pair in states.windows(2) {
        enc.assert_term(system.transition(&pair[0], &pair[1]));
    }
    Ok(enc)
}

/// Encode the BMC query at exactly `depth`: an initial run of `depth` steps
/// whose last state violates the property.
///
/// The violation is always the last assertion.
pub fn encode_bmc<T: TransitionSystem + ?Sized>(
    system: &T,
    safety: SafetyKind,
    depth: i64,
) -> Result<BmcEncoding, EncodeError> {
    let mut enc = encode_unrolling(system, depth, true)?;
    let depth = Unroller::check_bound(depth)?;
    let states = enc.unroller.states();
    let prev = depth.checked_sub(1).map(|i| &states[i]);
    let violation = system.violation(safety, prev, &states[depth])?;
    enc.push_violation(violation);
    enc.ensure_closed()?;
    Ok(enc)
}
