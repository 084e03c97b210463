use kstep_engine::pipeline::{check_bmc_report, parse_bound};
use miette::IntoDiagnostic;
use tracing::info;

use crate::cli::{RunArgs, TargetArgs};

use super::helpers::{emit_report, load_target, parse_output_format, pipeline_options};

pub(crate) fn run_bmc_command(target: TargetArgs, depth: i64, run: RunArgs) -> miette::Result<i32> {
    let format = parse_output_format(&run.format)?;
    let depth = parse_bound(depth).into_diagnostic()?;
    let scenario = load_target(&target)?;
    let options = pipeline_options(&run, depth)?;
    info!(scenario = scenario.name(), depth, "running bounded model check");
    let report = check_bmc_report(&scenario, &options).into_diagnostic()?;
    emit_report(&report, format)
}
