//! Argument parsing and output rendering shared by the verification commands.

use miette::IntoDiagnostic;
use serde_json::json;

use kstep_engine::pipeline::{PipelineOptions, SolverChoice};
use kstep_engine::result::{RunReport, Verdict};
use kstep_ir::{ArbitrationPolicy, EuclidScenario, MaritimeScenario, Scenario};
use kstep_smt::encoder::SafetyKind;

use crate::cli::{RunArgs, TargetArgs};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

pub(crate) fn parse_output_format(raw: &str) -> miette::Result<OutputFormat> {
    match raw {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        other => Err(miette::miette!(
            "Unknown output format: {other}. Use 'text' or 'json'."
        )),
    }
}

pub(crate) fn parse_solver_choice(raw: &str) -> miette::Result<SolverChoice> {
    SolverChoice::parse(raw).ok_or_else(|| {
        miette::miette!("Unknown solver: {raw}. Use 'z3', 'z3-process' or 'cvc5'.")
    })
}

pub(crate) fn parse_policy(raw: &str) -> miette::Result<ArbitrationPolicy> {
    ArbitrationPolicy::parse(raw).ok_or_else(|| {
        miette::miette!(
            "Unknown policy: {raw}. Use 'symmetric', 'current-only' or 'priority-first'."
        )
    })
}

pub(crate) fn parse_safety(raw: &str) -> miette::Result<SafetyKind> {
    SafetyKind::parse(raw).ok_or_else(|| {
        miette::miette!(
            "Unknown safety predicate: {raw}. Use 'sufficient', 'strong', 'remainder-decreasing', 'no-overflow' or 'bezout'."
        )
    })
}

pub(crate) fn canonical_scenario(name: &str) -> miette::Result<Scenario> {
    match name {
        "maritime" => Ok(Scenario::Maritime(MaritimeScenario::canonical())),
        "race" => Ok(Scenario::Maritime(MaritimeScenario::race(
            ArbitrationPolicy::CurrentOnly,
        ))),
        "euclid" => Ok(Scenario::Euclid(EuclidScenario::canonical())),
        other => Err(miette::miette!(
            "Unknown built-in scenario: {other}. Use 'maritime', 'race' or 'euclid'."
        )),
    }
}

/// Resolve the scenario named on the command line and apply `--policy`.
pub(crate) fn load_target(target: &TargetArgs) -> miette::Result<Scenario> {
    let scenario = match (&target.file, &target.canonical) {
        (_, Some(name)) => canonical_scenario(name)?,
        (Some(path), None) => Scenario::load(path)?,
        (None, None) => {
            return Err(miette::miette!(
                "Either a scenario file or --canonical is required."
            ))
        }
    };
    match (scenario, &target.policy) {
        (scenario, None) => Ok(scenario),
        (Scenario::Maritime(s), Some(raw)) => {
            Ok(Scenario::Maritime(s.with_policy(parse_policy(raw)?)))
        }
        (Scenario::Euclid(_), Some(_)) => Err(miette::miette!(
            "--policy applies to maritime scenarios only."
        )),
    }
}

pub(crate) fn pipeline_options(run: &RunArgs, max_depth: usize) -> miette::Result<PipelineOptions> {
    Ok(PipelineOptions {
        solver: parse_solver_choice(&run.solver)?,
        max_depth,
        timeout_secs: run.timeout,
        safety: run.safety.as_deref().map(parse_safety).transpose()?,
        dump_smt: run.dump_smt.clone(),
    })
}

pub(crate) fn exit_code(verdict: &Verdict) -> i32 {
    match verdict {
        Verdict::SafeUpTo { .. } | Verdict::ProvedForAllK { .. } => 0,
        Verdict::Unsafe { .. } => 2,
        Verdict::Unknown { .. } => 3,
    }
}

/// Print `report` on stdout and return the process exit code for it.
pub(crate) fn emit_report(report: &RunReport, format: OutputFormat) -> miette::Result<i32> {
    match format {
        OutputFormat::Text => println!("{report}"),
        OutputFormat::Json => {
            let artifact = json!({
                "schema_version": 1,
                "result": report.verdict.verdict_class(),
                "report": report,
                "output": report.to_string(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&artifact).into_diagnostic()?
            );
        }
    }
    Ok(exit_code(&report.verdict))
}
