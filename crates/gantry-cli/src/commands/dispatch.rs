//! Event dispatch command.

use anyhow::Result;
use gantry_pipelines::{Dispatch, default_registry, dispatch};
use tracing::info;

/// Route an event and execute whatever it resolves to.
pub async fn run(
    config_path: &str,
    secrets_path: Option<&str>,
    workspace: &str,
    source: &str,
    event: &str,
    git_ref: Option<String>,
    payload_path: Option<&str>,
) -> Result<()> {
    let cfg = super::load_config(config_path)?;
    let secrets = super::load_secrets(secrets_path)?;
    let ctx = super::build_context(source, event, &cfg, git_ref, secrets, payload_path)?;
    let registry = default_registry(&cfg)?;

    match dispatch(&ctx, &cfg, &registry)? {
        Dispatch::Pipeline(pipeline) => {
            info!(event = %event, pipeline = %pipeline.name, "Event resolved to a pipeline");
            super::run_pipeline(pipeline, workspace).await
        }
        Dispatch::Job(spec) => {
            info!(event = %event, job = %spec.name, "Event resolved to a single job");
            super::run_single_job(spec, workspace).await
        }
        Dispatch::Skip { reason } => {
            println!("Nothing to do: {}", reason);
            Ok(())
        }
    }
}
