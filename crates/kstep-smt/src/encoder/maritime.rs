//! Multi-agent maritime sector system.

use kstep_ir::{ArbitrationPolicy, MaritimeScenario, PhysicsConfig, ResourceId};

use super::agent::AgentModel;
use super::arbiter::{can_enter, Occupant};
use super::safety::{collision, strong_violation, SafetyKind};
use super::system::{AgentView, TransitionSystem};
use super::variables::{StateSchema, StateVector};
use super::EncodeError;
use crate::terms::SmtTerm;

#[derive(Debug, Clone)]
pub struct MaritimeSystem {
    name: String,
    schema: StateSchema,
    physics: PhysicsConfig,
    policy: ArbitrationPolicy,
    agents: Vec<AgentModel>,
}

impl MaritimeSystem {
    pub fn new(scenario: &MaritimeScenario) -> Result<Self, EncodeError> {
        let mut schema = StateSchema::new();
        let agents = scenario
            .agents
            .iter()
            .enumerate()
            .map(|(i, spec)| AgentModel::new(i, spec, &mut schema))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: scenario.name.clone(),
            schema,
            physics: scenario.physics.clone(),
            policy: scenario.policy,
            agents,
        })
    }

    fn occupants(&self, cur: &StateVector, next: &StateVector) -> Vec<Occupant> {
        self.agents
            .iter()
            .map(|a| Occupant {
                agent: a.index,
                current: cur.term(a.fields.sector),
                next: next.term(a.fields.sector),
            })
            .collect()
    }
}

impl TransitionSystem for MaritimeSystem {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &StateSchema {
        &self.schema
    }

    fn initial(&self, state: &StateVector) -> SmtTerm {
        SmtTerm::and(self.agents.iter().map(|a| a.initial(state)))
    }

    fn transition(&self, cur: &StateVector, next: &StateVector) -> SmtTerm {
        let occupants = self.occupants(cur, next);
        SmtTerm::and(
            self.agents
                .iter()
                .map(|agent| {
                    let admit = |target: ResourceId| {
                        can_enter(
                            self.policy,
                            agent.index,
                            target,
                            agent.is_terminal(target),
                            &occupants,
                        )
                    };
                    agent.relation(&self.physics, cur, next, &admit)
                }),
        )
    }

    fn invariants(&self, state: &StateVector) -> Vec<SmtTerm> {
        self.agents
            .iter()
            .flat_map(|a| a.invariants(state))
            .collect()
    }

    fn violation(
        &self,
        kind: SafetyKind,
        _prev: Option<&StateVector>,
        cur: &StateVector,
    ) -> Result<SmtTerm, EncodeError> {
        let agents = self.agents();
        match kind {
            SafetyKind::Sufficient => Ok(collision(&agents, cur)),
            SafetyKind::Strong => Ok(strong_violation(&agents, cur)),
            SafetyKind::RemainderDecreasing | SafetyKind::NoOverflow | SafetyKind::Bezout => {
                Err(EncodeError::UnsupportedPredicate {
                    predicate: kind.name().into(),
                    system: self.name.clone(),
                })
            }
        }
    }

    fn agents(&self) -> Vec<AgentView> {
        self.agents
            .iter()
            .map(|a| AgentView {
                name: a.name.clone(),
                sector: a.fields.sector,
                wait: a.fields.wait,
                terminals: a.terminals().iter().map(|t| t.value()).collect(),
            })
            .collect()
    }
}
