//! Safety predicates, expressed as their negation ("violated at this state").

use std::fmt;

use super::system::AgentView;
use super::variables::StateVector;
use crate::terms::SmtTerm;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SafetyKind {
    /// No two agents share a non-terminal resource.
    Sufficient,
    /// Sufficient safety, and no agent waits outside a terminal resource.
    Strong,
    /// The Euclid remainder stays non-negative and strictly decreases.
    RemainderDecreasing,
    /// Euclid remainders fit an unsigned word and coefficients a signed one.
    NoOverflow,
    /// Both coefficient pairs satisfy Bézout's identity for the inputs.
    Bezout,
}

impl SafetyKind {
    pub fn name(self) -> &'static str {
        match self {
            SafetyKind::Sufficient => "sufficient",
            SafetyKind::Strong => "strong",
            SafetyKind::RemainderDecreasing => "remainder",
            SafetyKind::NoOverflow => "no-overflow",
            SafetyKind::Bezout => "bezout",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "sufficient" => Some(SafetyKind::Sufficient),
            "strong" => Some(SafetyKind::Strong),
            "remainder" | "remainder-decreasing" => Some(SafetyKind::RemainderDecreasing),
            "no-overflow" => Some(SafetyKind::NoOverflow),
            "bezout" => Some(SafetyKind::Bezout),
            _ => None,
        }
    }
}

impl fmt::Display for SafetyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn is_any_of(sector: SmtTerm, resources: &[i64]) -> SmtTerm {
    match resources {
        [] => SmtTerm::bool(false),
        [only] => sector.eq(SmtTerm::int(*only)),
        many => SmtTerm::or(
            many.iter()
                .map(|r| sector.clone().eq(SmtTerm::int(*r))),
        ),
    }
}

/// Two agents share a resource that is terminal for neither of them.
pub fn collision(agents: &[AgentView], cur: &StateVector) -> SmtTerm {
    let mut shared_terminals: Vec<i64> = agents
        .iter()
        .flat_map(|a| a.terminals.iter().copied())
        .collect();
    shared_terminals.sort_unstable();
    shared_terminals.dedup();

    let mut disjuncts = Vec::new();
    for (i, x) in agents.iter().enumerate() {
        for y in &agents[i + 1..] {
            let sx = cur.term(x.sector);
            let sy = cur.term(y.sector);
            disjuncts.push(SmtTerm::and(vec![
                sx.clone().eq(sy),
                is_any_of(sx, &shared_terminals).not(),
            ]));
        }
    }
    SmtTerm::or(disjuncts)
}

/// Some agent is forced to wait before reaching one of its terminals.
pub fn forced_wait(agents: &[AgentView], cur: &StateVector) -> SmtTerm {
    SmtTerm::or(
        agents
            .iter()
            .map(|a| {
                SmtTerm::and(vec![
                    cur.term(a.wait),
                    is_any_of(cur.term(a.sector), &a.terminals).not(),
                ])
            }),
    )
}

pub fn strong_violation(agents: &[AgentView], cur: &StateVector) -> SmtTerm {
    SmtTerm::or(vec![collision(agents, cur), forced_wait(agents, cur)])
}
