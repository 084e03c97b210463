use miette::Diagnostic;
use thiserror::Error;

use crate::resource::ResourceId;

/// Configuration errors, raised before any solver is created.
#[derive(Debug, Error, Diagnostic)]
pub enum ScenarioError {
    #[error("Agent '{agent}' has an empty adjacency map")]
    #[diagnostic(
        code(kstep::scenario::empty_adjacency),
        help("declare at least one resource with its successors")
    )]
    EmptyAdjacency { agent: String },

    #[error("Agent '{agent}' starts in resource {start}, which is absent from its adjacency map")]
    #[diagnostic(code(kstep::scenario::start_not_in_map))]
    StartNotInMap { agent: String, start: ResourceId },

    #[error("Agent '{agent}' declares terminal resource {terminal}, which is absent from its adjacency map")]
    #[diagnostic(code(kstep::scenario::unknown_terminal))]
    UnknownTerminal { agent: String, terminal: ResourceId },

    #[error("Agent '{agent}' has no physical parameters for resource {resource}")]
    #[diagnostic(
        code(kstep::scenario::missing_params),
        help("every non-terminal resource an agent can occupy needs (gamma, epsilon, ceiling)")
    )]
    MissingParams { agent: String, resource: ResourceId },

    #[error("Invalid agent name '{0}'")]
    #[diagnostic(
        code(kstep::scenario::agent_name),
        help("agent names must be non-empty and ASCII alphanumeric")
    )]
    InvalidAgentName(String),

    #[error("Duplicate agent name '{0}'")]
    #[diagnostic(code(kstep::scenario::duplicate_agent))]
    DuplicateAgent(String),

    #[error("Scenario declares no agents")]
    #[diagnostic(code(kstep::scenario::no_agents))]
    NoAgents,

    #[error("Invalid physics: {0}")]
    #[diagnostic(code(kstep::scenario::physics))]
    InvalidPhysics(String),

    #[error("Agent '{agent}': {message}")]
    #[diagnostic(code(kstep::scenario::initial_state))]
    InvalidInitialState { agent: String, message: String },

    #[error("Bit width {0} is outside the supported range 1..=62")]
    #[diagnostic(code(kstep::scenario::bit_width))]
    InvalidBitWidth(u32),

    #[error("Failed to parse scenario: {0}")]
    #[diagnostic(code(kstep::scenario::parse))]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read scenario '{path}': {source}")]
    #[diagnostic(code(kstep::scenario::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
