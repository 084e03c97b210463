use super::helpers::canonical_scenario;

/// Print a built-in scenario; the output loads back with `Scenario::load`.
pub(crate) fn run_scenario_command(name: &str) -> miette::Result<()> {
    let scenario = canonical_scenario(name)?;
    println!("{}", scenario.to_json_pretty()?);
    Ok(())
}
