//! Inductive-step encoding for k-induction.

use super::safety::SafetyKind;
use super::system::TransitionSystem;
use super::variables::Unroller;
use super::{encode_unrolling, BmcEncoding, EncodeError};

/// Encode the inductive-step query at depth `k`.
///
/// The query is SAT iff there exists a fragment of `k + 2` states such that:
/// - the invariants hold in every state
/// - the property holds in states `0..=k`
/// - the transition relation holds on each step `i -> i+1`
/// - the property is violated in state `k + 1`
///
/// Unlike [`encode_bmc`](super::encode_bmc), state 0 is not constrained to be
/// initial. UNSAT means every run that is safe for `k + 1` consecutive states
/// stays safe in the next one.
pub fn encode_k_induction_step<T: TransitionSystem + ?Sized>(
    system: &T,
    safety: SafetyKind,
    k: i64,
) -> Result<BmcEncoding, EncodeError> {
    let k = Unroller::check_bound(k)?;
    let last = k + 1;
    let mut enc = encode_unrolling(system, last as i64, false)?;

    let states = enc.unroller.states().to_vec();
    for i in 0..=k {
        let prev = i.checked_sub(1).map(|p| &states[p]);
        let violated = system.violation(safety, prev, &states[i])?;
        enc.assert_term(violated.not());
    }
    let violation = system.violation(safety, Some(&states[k]), &states[last])?;
    enc.push_violation(violation);
    enc.ensure_closed()?;
    Ok(enc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::smtlib_printer::to_smtlib;
    use crate::encoder::euclid::EuclidSystem;
    use crate::encoder::maritime::MaritimeSystem;
    use kstep_ir::{EuclidScenario, MaritimeScenario};

    #[test]
    fn step_query_has_k_plus_two_states_and_no_initial() {
        let system = EuclidSystem::new(&EuclidScenario::canonical()).unwrap();
        let enc = encode_k_induction_step(&system, SafetyKind::RemainderDecreasing, 1).unwrap();
        assert_eq!(enc.unroller.states().len(), 3);
        let printed: Vec<String> = enc.assertions.iter().map(to_smtlib).collect();
        assert!(printed.iter().all(|a| !a.contains("(= s_0 1)")));
        assert_eq!(
            printed.last().map(String::as_str),
            Some("(or (< rp_2 0) (and (not (= rp_1 0)) (>= rp_2 rp_1)))")
        );
        // 2 transitions + 2 property assumptions + violation
        assert_eq!(enc.assertions.len(), 5);
    }

    #[test]
    fn zero_k_is_plain_induction() {
        let system = MaritimeSystem::new(&MaritimeScenario::canonical()).unwrap();
        let enc = encode_k_induction_step(&system, SafetyKind::Sufficient, 0).unwrap();
        assert_eq!(enc.unroller.states().len(), 2);
        assert_eq!(enc.declarations.len(), 20);
    }

    #[test]
    fn negative_k_is_rejected() {
        let system = MaritimeSystem::new(&MaritimeScenario::canonical()).unwrap();
        assert!(matches!(
            encode_k_induction_step(&system, SafetyKind::Sufficient, -1),
            Err(EncodeError::NegativeBound(-1))
        ));
    }
}
