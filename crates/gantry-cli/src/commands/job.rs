//! Single-job commands.

use anyhow::Result;
use gantry_pipelines::default_registry;

/// Produce and run one registered job.
pub async fn run(
    config_path: &str,
    secrets_path: Option<&str>,
    workspace: &str,
    name: &str,
    git_ref: Option<String>,
) -> Result<()> {
    let cfg = super::load_config(config_path)?;
    let secrets = super::load_secrets(secrets_path)?;
    let ctx = super::build_context("gantry/cli", "job", &cfg, git_ref, secrets, None)?;

    let registry = default_registry(&cfg)?;
    let spec = registry.produce(name, &ctx)?;
    super::run_single_job(spec, workspace).await
}

/// List registered job names.
pub fn list(config_path: &str) -> Result<()> {
    let cfg = super::load_config(config_path)?;
    let registry = default_registry(&cfg)?;
    for name in registry.names() {
        println!("{}", name);
    }
    Ok(())
}
