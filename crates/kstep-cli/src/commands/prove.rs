use kstep_engine::pipeline::{k_induction_report, parse_bound, prove_up_to_report};
use miette::IntoDiagnostic;
use tracing::info;

use crate::cli::{RunArgs, TargetArgs};

use super::helpers::{emit_report, load_target, parse_output_format, pipeline_options};

/// k-induction at `--k`, or at every depth up to it with `--iterate`.
pub(crate) fn run_prove_command(
    target: TargetArgs,
    k: i64,
    iterate: bool,
    run: RunArgs,
) -> miette::Result<i32> {
    let format = parse_output_format(&run.format)?;
    let k = parse_bound(k).into_diagnostic()?;
    let scenario = load_target(&target)?;
    let options = pipeline_options(&run, k)?;
    info!(scenario = scenario.name(), k, iterate, "running k-induction");
    let report = if iterate {
        prove_up_to_report(&scenario, k, &options)
    } else {
        k_induction_report(&scenario, k, &options)
    }
    .into_diagnostic()?;
    emit_report(&report, format)
}
