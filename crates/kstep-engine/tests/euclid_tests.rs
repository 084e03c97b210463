mod common;

use common::{euclid, options};
use kstep_engine::counterexample::TraceValue;
use kstep_engine::pipeline::{
    check_bmc, check_bmc_report, k_induction, PipelineError, PipelineOptions,
};
use kstep_engine::result::Verdict;
use kstep_ir::{EuclidScenario, Scenario};
use kstep_smt::encoder::SafetyKind;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn remainder_decrease_is_one_inductive() -> TestResult {
    let verdict = k_induction(&euclid(), 1, &options(1, None))?;
    match verdict {
        Verdict::ProvedForAllK { k } => assert_eq!(k, 1),
        other => panic!("Expected PROVED, got: {other}"),
    }
    Ok(())
}

#[test]
fn bounded_check_agrees_with_proof() -> TestResult {
    let verdict = check_bmc(&euclid(), &options(10, None))?;
    assert!(matches!(verdict, Verdict::SafeUpTo { depth: 10 }), "got: {verdict}");
    Ok(())
}

#[test]
#[ignore = "slow: two hundred unrolled recurrence steps"]
fn bounded_check_at_depth_200() -> TestResult {
    let verdict = check_bmc(&euclid(), &options(200, None))?;
    assert!(matches!(verdict, Verdict::SafeUpTo { depth: 200 }), "got: {verdict}");
    Ok(())
}

fn narrow(bit_width: u32) -> Scenario {
    Scenario::Euclid(EuclidScenario {
        name: format!("euclid-{bit_width}"),
        bit_width,
    })
}

#[test]
fn bezout_identity_is_inductive() -> TestResult {
    let verdict = k_induction(&euclid(), 1, &options(1, Some(SafetyKind::Bezout)))?;
    assert!(matches!(verdict, Verdict::ProvedForAllK { .. }), "got: {verdict}");
    Ok(())
}

#[test]
fn narrow_width_coefficients_overflow() -> TestResult {
    let report = check_bmc_report(&narrow(4), &options(4, Some(SafetyKind::NoOverflow)))?;
    assert_eq!(report.safety, "no-overflow");
    let trace = report.verdict.trace().ok_or("expected an overflow trace")?;
    let index = trace.violation_index.ok_or("expected a violating step")?;
    // the initial state fits; the first quotient step can already leave the range
    assert!(index >= 1, "violation at {index}");
    let step = trace.step(index).ok_or("violating step missing")?;
    let out_of_range = ["s", "sp", "t", "tp"].iter().any(|name| {
        matches!(
            step.values.get(*name),
            Some(TraceValue::Int(v)) if !(-8..8).contains(v)
        )
    });
    assert!(out_of_range, "no coefficient out of range in {trace}");
    Ok(())
}

#[test]
fn maritime_predicate_is_rejected_for_euclid() {
    let result = check_bmc(&euclid(), &options(2, Some(SafetyKind::Strong)));
    assert!(matches!(result, Err(PipelineError::Validation(_))));
}

#[test]
fn dump_smt_writes_the_query() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("euclid.smt2");
    let opts = PipelineOptions {
        dump_smt: Some(path.clone()),
        ..options(2, None)
    };
    check_bmc(&euclid(), &opts)?;
    let script = std::fs::read_to_string(&path)?;
    assert!(script.contains("(declare-const"));
    assert!(script.contains("(check-sat)"));
    Ok(())
}
