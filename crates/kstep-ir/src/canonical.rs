//! Built-in scenarios.
//!
//! The maritime map is a mirrored fifteen-sector channel with a single-lane
//! bottleneck (sector 0). Agent A sails from the west column (11, 13) to the
//! east port (15); agent B sails from the east column (12, 14) to the west
//! port (-1).

use indexmap::IndexMap;

use crate::physics::{PhysicsConfig, SectorParams};
use crate::rational::{integer, ratio};
use crate::resource::{AdjacencyMap, ResourceId};
use crate::scenario::{AgentSpec, ArbitrationPolicy, EuclidScenario, MaritimeScenario};

pub const WEST_PORT: i64 = -1;
pub const EAST_PORT: i64 = 15;
pub const BOTTLENECK: i64 = 0;

const WEST_ACCEL: [i64; 4] = [11, 13, 2, 4];
const EAST_ACCEL: [i64; 4] = [1, 3, 12, 14];

pub fn eastbound_adjacency() -> AdjacencyMap {
    AdjacencyMap::from_pairs([
        (11, vec![5, 7]),
        (13, vec![9, 7]),
        (5, vec![1]),
        (7, vec![1, 3]),
        (9, vec![3]),
        (1, vec![0]),
        (3, vec![0]),
        (0, vec![2, 4]),
        (2, vec![6, 8]),
        (4, vec![8, 10]),
        (6, vec![12]),
        (8, vec![12, 14]),
        (10, vec![14]),
        (12, vec![EAST_PORT]),
        (14, vec![EAST_PORT]),
        (EAST_PORT, vec![EAST_PORT]),
    ])
}

pub fn westbound_adjacency() -> AdjacencyMap {
    AdjacencyMap::from_pairs([
        (12, vec![6, 8]),
        (14, vec![10, 8]),
        (6, vec![2]),
        (8, vec![2, 4]),
        (10, vec![4]),
        (2, vec![0]),
        (4, vec![0]),
        (0, vec![1, 3]),
        (1, vec![5, 7]),
        (3, vec![7, 9]),
        (5, vec![11]),
        (7, vec![11, 13]),
        (9, vec![13]),
        (11, vec![WEST_PORT]),
        (13, vec![WEST_PORT]),
        (WEST_PORT, vec![WEST_PORT]),
    ])
}

/// Parameter table for one direction of travel.
fn sector_table(adjacency: &AdjacencyMap, accel: &[i64]) -> IndexMap<ResourceId, SectorParams> {
    adjacency
        .domain()
        .into_iter()
        .map(|id| {
            let params = match id.value() {
                WEST_PORT | EAST_PORT => SectorParams::port(),
                BOTTLENECK => SectorParams::new(ratio(1, 5), integer(0), integer(1)),
                v if accel.contains(&v) => {
                    SectorParams::new(integer(1), ratio(1, 10), ratio(5, 2))
                }
                _ => SectorParams::new(integer(0), ratio(-1, 10), ratio(5, 2)),
            };
            (id, params)
        })
        .collect()
}

fn eastbound_agent(start: i64) -> AgentSpec {
    let adjacency = eastbound_adjacency();
    AgentSpec {
        name: "A".into(),
        params: sector_table(&adjacency, &WEST_ACCEL),
        adjacency,
        terminals: vec![ResourceId(EAST_PORT)],
        start: ResourceId(start),
        initial_displacement: integer(0),
        initial_velocity: ratio(3, 5),
    }
}

fn westbound_agent(start: i64) -> AgentSpec {
    let adjacency = westbound_adjacency();
    AgentSpec {
        name: "B".into(),
        params: sector_table(&adjacency, &EAST_ACCEL),
        adjacency,
        terminals: vec![ResourceId(WEST_PORT)],
        start: ResourceId(start),
        initial_displacement: integer(0),
        initial_velocity: ratio(3, 5),
    }
}

impl MaritimeScenario {
    /// Two ships at opposite ends of the channel, both at velocity 3/5.
    pub fn canonical() -> Self {
        MaritimeScenario {
            name: "maritime".into(),
            physics: PhysicsConfig::default(),
            policy: ArbitrationPolicy::Symmetric,
            agents: vec![eastbound_agent(11), westbound_agent(14)],
        }
    }

    /// Both ships sit at the boundary of a sector whose only successor is the
    /// empty bottleneck, so they try to enter it in the same step.
    pub fn race(policy: ArbitrationPolicy) -> Self {
        let mut a = eastbound_agent(1);
        a.initial_displacement = integer(1);
        let mut b = westbound_agent(2);
        b.initial_displacement = integer(1);
        MaritimeScenario {
            name: "maritime-race".into(),
            physics: PhysicsConfig::default(),
            policy,
            agents: vec![a, b],
        }
    }
}

impl EuclidScenario {
    pub fn canonical() -> Self {
        EuclidScenario {
            name: "euclid".into(),
            bit_width: 16,
        }
    }
}
