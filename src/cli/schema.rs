use crate::config::Config;
use schemars::schema_for;

/// Print the JSON Schema for `stratgen.yaml` so editors and CI can
/// validate deadline, hook-quota, and enrichment-command settings before
/// a run ever spawns a provider.
pub fn execute() -> anyhow::Result<()> {
    let schema = schema_for!(Config);
    let json = serde_json::to_string_pretty(&schema)?;
    println!("{}", json);
    Ok(())
}
