use num::rational::BigRational;
use num::{Signed, Zero};
use serde::{Deserialize, Serialize};

use crate::error::ScenarioError;
use crate::rational::{integer, ratio, serde_rational};

/// Per-resource velocity law: accelerate by `gamma` while `v <= ceiling`,
/// drift by `epsilon` above it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorParams {
    #[serde(with = "serde_rational")]
    pub gamma: BigRational,
    #[serde(with = "serde_rational")]
    pub epsilon: BigRational,
    #[serde(with = "serde_rational")]
    pub ceiling: BigRational,
}

impl SectorParams {
    pub fn new(gamma: BigRational, epsilon: BigRational, ceiling: BigRational) -> Self {
        Self {
            gamma,
            epsilon,
            ceiling,
        }
    }

    /// Parameters of a port: no forcing, effectively no ceiling.
    pub fn port() -> Self {
        Self::new(integer(0), integer(0), integer(100))
    }
}

/// Global integration constants shared by all agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// Friction coefficient.
    #[serde(with = "serde_rational")]
    pub sigma: BigRational,
    /// Step size.
    #[serde(with = "serde_rational")]
    pub dt: BigRational,
    /// Normalized resource length; crossing happens at `z >= boundary`.
    #[serde(with = "serde_rational", default = "default_boundary")]
    pub boundary: BigRational,
}

fn default_boundary() -> BigRational {
    integer(1)
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            sigma: ratio(1, 2),
            dt: ratio(1, 4),
            boundary: default_boundary(),
        }
    }
}

impl PhysicsConfig {
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if !self.dt.is_positive() {
            return Err(ScenarioError::InvalidPhysics(format!(
                "step size dt must be positive, got {}",
                self.dt
            )));
        }
        if self.sigma.is_negative() {
            return Err(ScenarioError::InvalidPhysics(format!(
                "friction sigma must be non-negative, got {}",
                self.sigma
            )));
        }
        if self.boundary.is_zero() || self.boundary.is_negative() {
            return Err(ScenarioError::InvalidPhysics(format!(
                "boundary length must be positive, got {}",
                self.boundary
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_physics_matches_maritime_constants() {
        let physics = PhysicsConfig::default();
        assert_eq!(physics.sigma, ratio(1, 2));
        assert_eq!(physics.dt, ratio(1, 4));
        assert_eq!(physics.boundary, integer(1));
        assert!(physics.validate().is_ok());
    }

    #[test]
    fn non_positive_step_is_rejected() {
        let physics = PhysicsConfig {
            dt: integer(0),
            ..PhysicsConfig::default()
        };
        assert!(matches!(
            physics.validate(),
            Err(ScenarioError::InvalidPhysics(_))
        ));
    }

    #[test]
    fn boundary_defaults_when_omitted() {
        let physics: PhysicsConfig =
            serde_json::from_str(r#"{"sigma": "1/2", "dt": 0.25}"#).unwrap();
        assert_eq!(physics, PhysicsConfig::default());
    }
}
