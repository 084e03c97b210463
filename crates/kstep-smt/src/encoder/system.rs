//! The interface every verified system implements.

use super::safety::SafetyKind;
use super::variables::{FieldId, StateSchema, StateVector};
use super::EncodeError;
use crate::terms::SmtTerm;

/// Per-agent view used by safety predicates and trace projection.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentView {
    pub name: String,
    pub sector: FieldId,
    pub wait: FieldId,
    /// Resource ids at which the agent has finished its journey.
    pub terminals: Vec<i64>,
}

/// A symbolic discrete-time transition system over one [`StateSchema`].
pub trait TransitionSystem {
    fn name(&self) -> &str;

    fn schema(&self) -> &StateSchema;

    /// Initial-state predicate over state 0.
    fn initial(&self, state: &StateVector) -> SmtTerm;

    /// One-step relation between consecutive states.
    fn transition(&self, cur: &StateVector, next: &StateVector) -> SmtTerm;

    /// Domain constraints that hold in every state.
    fn invariants(&self, _state: &StateVector) -> Vec<SmtTerm> {
        Vec::new()
    }

    /// Negated safety predicate at `cur`. Two-state predicates also read
    /// `prev`, which is `None` at index 0.
    fn violation(
        &self,
        kind: SafetyKind,
        prev: Option<&StateVector>,
        cur: &StateVector,
    ) -> Result<SmtTerm, EncodeError>;

    fn agents(&self) -> Vec<AgentView> {
        Vec::new()
    }
}
