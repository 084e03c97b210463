#![doc = include_str!("../README.md")]

//! Scenario configuration for the kstep verification engine.
//!
//! This crate defines resource identifiers, adjacency maps, per-resource
//! physical parameter tables, agent specifications, the maritime and Euclid
//! scenarios, their validation, JSON loading, and the built-in canonical
//! scenarios.

pub mod canonical;
pub mod error;
pub mod physics;
#[cfg(any(test, feature = "proptest"))]
pub mod proptest_generators;
pub mod rational;
pub mod resource;
pub mod scenario;

pub use error::ScenarioError;
pub use physics::{PhysicsConfig, SectorParams};
pub use resource::{AdjacencyMap, ResourceId};
pub use scenario::{AgentSpec, ArbitrationPolicy, EuclidScenario, MaritimeScenario, Scenario};
