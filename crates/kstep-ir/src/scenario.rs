use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use num::rational::BigRational;
use num::{Signed, Zero};
use serde::{Deserialize, Serialize};

use crate::error::ScenarioError;
use crate::physics::{PhysicsConfig, SectorParams};
use crate::rational::serde_rational;
use crate::resource::{AdjacencyMap, ResourceId};

/// How an agent decides whether it may enter a target resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArbitrationPolicy {
    /// No other agent occupies the target now or in the next state.
    #[default]
    Symmetric,
    /// Only the other agents' current resources are checked.
    CurrentOnly,
    /// The first agent checks current occupancy only; later agents also
    /// yield to the next-state choices of every earlier agent.
    PriorityToFirst,
}

impl ArbitrationPolicy {
    pub fn name(self) -> &'static str {
        match self {
            ArbitrationPolicy::Symmetric => "symmetric",
            ArbitrationPolicy::CurrentOnly => "current-only",
            ArbitrationPolicy::PriorityToFirst => "priority-first",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "symmetric" => Some(ArbitrationPolicy::Symmetric),
            "current-only" => Some(ArbitrationPolicy::CurrentOnly),
            "priority-first" | "priority-to-first" => Some(ArbitrationPolicy::PriorityToFirst),
            _ => None,
        }
    }
}

impl fmt::Display for ArbitrationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One agent: its route graph, parameter table and starting point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    pub adjacency: AdjacencyMap,
    #[serde(default)]
    pub terminals: Vec<ResourceId>,
    pub params: IndexMap<ResourceId, SectorParams>,
    pub start: ResourceId,
    #[serde(with = "serde_rational", default = "BigRational::zero")]
    pub initial_displacement: BigRational,
    #[serde(with = "serde_rational")]
    pub initial_velocity: BigRational,
}

impl AgentSpec {
    pub fn is_terminal(&self, id: ResourceId) -> bool {
        self.terminals.contains(&id)
    }

    pub fn params_for(&self, id: ResourceId) -> Option<&SectorParams> {
        self.params.get(&id)
    }

    /// Resources this agent can ever occupy.
    pub fn domain(&self) -> Vec<ResourceId> {
        let mut domain = self.adjacency.domain();
        if !domain.contains(&self.start) {
            domain.push(self.start);
            domain.sort();
        }
        domain
    }

    fn validate(&self, physics: &PhysicsConfig) -> Result<(), ScenarioError> {
        if self.name.is_empty() || !self.name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ScenarioError::InvalidAgentName(self.name.clone()));
        }
        if self.adjacency.is_empty() {
            return Err(ScenarioError::EmptyAdjacency {
                agent: self.name.clone(),
            });
        }
        if !self.adjacency.contains_source(self.start) {
            return Err(ScenarioError::StartNotInMap {
                agent: self.name.clone(),
                start: self.start,
            });
        }
        for terminal in &self.terminals {
            if !self.adjacency.contains(*terminal) {
                return Err(ScenarioError::UnknownTerminal {
                    agent: self.name.clone(),
                    terminal: *terminal,
                });
            }
        }
        for resource in self.domain() {
            if !self.is_terminal(resource) && self.params_for(resource).is_none() {
                return Err(ScenarioError::MissingParams {
                    agent: self.name.clone(),
                    resource,
                });
            }
        }
        if self.initial_velocity.is_negative() {
            return Err(ScenarioError::InvalidInitialState {
                agent: self.name.clone(),
                message: format!("initial velocity {} is negative", self.initial_velocity),
            });
        }
        if self.initial_displacement.is_negative() {
            return Err(ScenarioError::InvalidInitialState {
                agent: self.name.clone(),
                message: format!(
                    "initial displacement {} is negative",
                    self.initial_displacement
                ),
            });
        }
        if self.initial_displacement > physics.boundary {
            return Err(ScenarioError::InvalidInitialState {
                agent: self.name.clone(),
                message: format!(
                    "initial displacement {} is past the sector boundary {}",
                    self.initial_displacement, physics.boundary
                ),
            });
        }
        Ok(())
    }
}

/// Multi-agent sector traffic: agents move along their own route graphs and
/// contend for shared sectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaritimeScenario {
    pub name: String,
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub policy: ArbitrationPolicy,
    pub agents: Vec<AgentSpec>,
}

impl MaritimeScenario {
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.agents.is_empty() {
            return Err(ScenarioError::NoAgents);
        }
        self.physics.validate()?;
        let mut seen = HashSet::new();
        for agent in &self.agents {
            agent.validate(&self.physics)?;
            if !seen.insert(agent.name.as_str()) {
                return Err(ScenarioError::DuplicateAgent(agent.name.clone()));
            }
        }
        Ok(())
    }

    pub fn with_policy(mut self, policy: ArbitrationPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Remainder recurrence of the extended Euclid algorithm over `bit_width`-bit
/// unsigned inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EuclidScenario {
    pub name: String,
    pub bit_width: u32,
}

impl EuclidScenario {
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if !(1..=62).contains(&self.bit_width) {
            return Err(ScenarioError::InvalidBitWidth(self.bit_width));
        }
        Ok(())
    }

    /// Exclusive upper bound of the input range, `2^bit_width`.
    pub fn input_bound(&self) -> i64 {
        1_i64 << self.bit_width
    }

    /// Magnitude bound of a signed `bit_width` word, `2^(bit_width - 1)`.
    pub fn signed_bound(&self) -> i64 {
        1_i64 << self.bit_width.saturating_sub(1)
    }
}

/// A verification scenario as loaded from a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scenario {
    Maritime(MaritimeScenario),
    Euclid(EuclidScenario),
}

impl Scenario {
    pub fn name(&self) -> &str {
        match self {
            Scenario::Maritime(s) => &s.name,
            Scenario::Euclid(s) => &s.name,
        }
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        match self {
            Scenario::Maritime(s) => s.validate(),
            Scenario::Euclid(s) => s.validate(),
        }
    }

    /// Parse and validate a JSON scenario.
    pub fn from_json_str(text: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = serde_json::from_str(text)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String, ScenarioError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
