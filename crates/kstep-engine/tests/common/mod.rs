#![allow(dead_code)]

use kstep_engine::pipeline::{PipelineOptions, SolverChoice};
use kstep_ir::{ArbitrationPolicy, EuclidScenario, MaritimeScenario, Scenario};
use kstep_smt::encoder::SafetyKind;

pub fn load_scenario(name: &str) -> Scenario {
    let path = format!("{}/../../scenarios/{name}", env!("CARGO_MANIFEST_DIR"));
    Scenario::load(std::path::Path::new(&path)).unwrap_or_else(|e| panic!("Failed to load {path}: {e}"))
}

pub fn options(depth: usize, safety: Option<SafetyKind>) -> PipelineOptions {
    PipelineOptions {
        solver: SolverChoice::Z3,
        max_depth: depth,
        timeout_secs: 120,
        safety,
        dump_smt: None,
    }
}

pub fn canonical() -> Scenario {
    Scenario::Maritime(MaritimeScenario::canonical())
}

pub fn race(policy: ArbitrationPolicy) -> Scenario {
    Scenario::Maritime(MaritimeScenario::race(policy))
}

pub fn euclid() -> Scenario {
    Scenario::Euclid(EuclidScenario::canonical())
}
