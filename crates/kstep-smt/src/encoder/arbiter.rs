//! Resource arbitration: may agent X enter resource `t` in this step?

use kstep_ir::{ArbitrationPolicy, ResourceId};

use crate::terms::SmtTerm;

/// Sector variables of another agent at the current and next index.
#[derive(Debug, Clone)]
pub struct Occupant {
    pub agent: usize,
    pub current: SmtTerm,
    pub next: SmtTerm,
}

/// Admission predicate for `agent` entering `target`.
///
/// Terminal resources have unbounded capacity and are always admitted.
pub fn can_enter(
    policy: ArbitrationPolicy,
    agent: usize,
    target: ResourceId,
    target_is_terminal: bool,
    others: &[Occupant],
) -> SmtTerm {
    if target_is_terminal {
        return SmtTerm::bool(true);
    }
    let t = || SmtTerm::int(target.value());
    let mut conjuncts = Vec::new();
    for other in others.iter().filter(|o| o.agent != agent) {
        conjuncts.push(other.current.clone().neq(t()));
        let check_next = match policy {
            ArbitrationPolicy::Symmetric => true,
            ArbitrationPolicy::CurrentOnly => false,
            ArbitrationPolicy::PriorityToFirst => other.agent < agent,
        };
        if check_next {
            conjuncts.push(other.next.clone().neq(t()));
        }
    }
    SmtTerm::and(conjuncts)
}
