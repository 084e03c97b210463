//! Proptest strategies for generating well-formed `MaritimeScenario` instances.

use indexmap::IndexMap;
use num::rational::BigRational;
use proptest::prelude::*;

use crate::physics::{PhysicsConfig, SectorParams};
use crate::rational::{integer, ratio};
use crate::resource::{AdjacencyMap, ResourceId};
use crate::scenario::{AgentSpec, ArbitrationPolicy, MaritimeScenario};

fn arb_small_rational() -> impl Strategy<Value = BigRational> {
    prop_oneof![
        Just(integer(0)),
        Just(ratio(1, 4)),
        Just(ratio(1, 2)),
        Just(ratio(3, 5)),
        Just(integer(1)),
    ]
}

fn arb_sector_params() -> impl Strategy<Value = SectorParams> {
    (
        arb_small_rational(),
        prop_oneof![Just(ratio(-1, 10)), Just(integer(0)), Just(ratio(1, 10))],
        prop_oneof![Just(integer(1)), Just(ratio(5, 2))],
    )
        .prop_map(|(gamma, epsilon, ceiling)| SectorParams::new(gamma, epsilon, ceiling))
}

fn params_for(
    adjacency: &AdjacencyMap,
    table: &[SectorParams],
) -> IndexMap<ResourceId, SectorParams> {
    adjacency
        .domain()
        .into_iter()
        .enumerate()
        .map(|(i, id)| (id, table[i % table.len()].clone()))
        .collect()
}

/// Strategy for a two-agent scenario on a single-lane corridor.
///
/// Generated scenarios have:
/// - 2–5 corridor sectors `0..n`, plus a port at each end
/// - agent A travelling east to port `n`, agent B travelling west to port -1
/// - distinct start sectors, displacement in {0, 1/2, 1}
/// - random per-sector (gamma, epsilon, ceiling) from a small grid
/// - the symmetric arbitration policy
pub fn arb_corridor_scenario() -> impl Strategy<Value = MaritimeScenario> {
    (2..=5i64)
        .prop_flat_map(|n| {
            (
                Just(n),
                0..n,
                0..n,
                prop_oneof![Just(integer(0)), Just(ratio(1, 2)), Just(integer(1))],
                prop_oneof![Just(integer(0)), Just(ratio(1, 2)), Just(integer(1))],
                arb_small_rational(),
                arb_small_rational(),
                proptest::collection::vec(arb_sector_params(), 1..=3),
            )
        })
        .prop_filter("agents start in distinct sectors", |(_, a, b, ..)| a != b)
        .prop_map(|(n, a_start, b_start, a_z, b_z, a_v, b_v, table)| {
            let east = AdjacencyMap::from_pairs(
                (0..n)
                    .map(|i| (i, vec![i + 1]))
                    .chain(std::iter::once((n, vec![n]))),
            );
            let west = AdjacencyMap::from_pairs(
                (0..n)
                    .map(|i| (i, vec![i - 1]))
                    .chain(std::iter::once((-1, vec![-1]))),
            );
            let a = AgentSpec {
                name: "A".into(),
                params: params_for(&east, &table),
                adjacency: east,
                terminals: vec![ResourceId(n)],
                start: ResourceId(a_start),
                initial_displacement: a_z,
                initial_velocity: a_v,
            };
            let b = AgentSpec {
                name: "B".into(),
                params: params_for(&west, &table),
                adjacency: west,
                terminals: vec![ResourceId(-1)],
                start: ResourceId(b_start),
                initial_displacement: b_z,
                initial_velocity: b_v,
            };
            MaritimeScenario {
                name: format!("corridor-{n}"),
                physics: PhysicsConfig::default(),
                policy: ArbitrationPolicy::Symmetric,
                agents: vec![a, b],
            }
        })
}
