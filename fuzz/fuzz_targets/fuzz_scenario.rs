#![no_main]
use kstep_ir::Scenario;
use kstep_smt::encoder::euclid::EuclidSystem;
use kstep_smt::encoder::maritime::MaritimeSystem;
use kstep_smt::encoder::{encode_bmc, SafetyKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Loading must never panic; validated scenarios must encode.
        match Scenario::from_json_str(s) {
            Ok(Scenario::Maritime(m)) => {
                if let Ok(system) = MaritimeSystem::new(&m) {
                    let _ = encode_bmc(&system, SafetyKind::Strong, 2);
                }
            }
            Ok(Scenario::Euclid(e)) => {
                if let Ok(system) = EuclidSystem::new(&e) {
                    let _ = encode_bmc(&system, SafetyKind::RemainderDecreasing, 2);
                }
            }
            Err(_) => {}
        }
    }
});
