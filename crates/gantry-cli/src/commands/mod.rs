//! CLI command implementations.

use anyhow::{Context, Result};
use gantry_config::ProjectConfig;
use gantry_core::event::EventContext;
use gantry_core::job::{JobSpec, VolumeMount};
use gantry_core::pipeline::Pipeline;
use gantry_core::secret::SecretBag;
use gantry_executor::DockerExecutor;
use gantry_runner::{JobState, PipelineRunner, RunEvent};
use std::path::Path;
use std::sync::Arc;

pub mod dispatch;
pub mod job;

/// Load the project configuration; a missing file means defaults.
pub fn load_config(path: &str) -> Result<ProjectConfig> {
    if !Path::new(path).exists() {
        tracing::info!(path = %path, "No project configuration found, using defaults");
        return Ok(ProjectConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path))?;
    ProjectConfig::parse(&content)
        .with_context(|| format!("Failed to parse project config: {}", path))
}

/// Load project secrets from the given file, or from the environment.
pub fn load_secrets(path: Option<&str>) -> Result<SecretBag> {
    match path {
        Some(path) => gantry_config::load_secrets(Path::new(path))
            .with_context(|| format!("Failed to load secrets from {}", path)),
        None => Ok(gantry_config::secrets_from_env()),
    }
}

/// Build the event context for a trigger.
pub fn build_context(
    source: &str,
    event: &str,
    cfg: &ProjectConfig,
    git_ref: Option<String>,
    secrets: SecretBag,
    payload_path: Option<&str>,
) -> Result<EventContext> {
    let mut ctx = EventContext::new(source, event, cfg.name.clone()).with_secrets(secrets);
    if let Some(git_ref) = git_ref {
        ctx = ctx.with_ref(git_ref);
    }
    if let Some(path) = payload_path {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload file: {}", path))?;
        let payload = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse payload file: {}", path))?;
        ctx = ctx.with_payload(payload);
    }
    Ok(ctx)
}

/// Bind-mount the workspace directory where a job expects the project
/// source.
pub fn mount_workspace_into(spec: &mut JobSpec, workspace: &str) -> Result<()> {
    let Some(mount_path) = spec.source_mount_path.clone() else {
        return Ok(());
    };
    let host_dir = Path::new(workspace)
        .canonicalize()
        .with_context(|| format!("Failed to resolve workspace directory: {}", workspace))?;
    spec.volumes.push(VolumeMount {
        source: host_dir.to_string_lossy().to_string(),
        mount_path,
        read_only: false,
    });
    Ok(())
}

fn mount_workspace(pipeline: &mut Pipeline, workspace: &str) -> Result<()> {
    for stage in &mut pipeline.stages {
        for job in &mut stage.jobs {
            mount_workspace_into(job, workspace)?;
        }
    }
    Ok(())
}

/// Execute a pipeline, printing progress as it happens.
pub async fn run_pipeline(mut pipeline: Pipeline, workspace: &str) -> Result<()> {
    mount_workspace(&mut pipeline, workspace)?;

    let executor = DockerExecutor::new().context("Failed to connect to Docker")?;
    let runner = PipelineRunner::new(Arc::new(executor));

    println!(
        "Running pipeline '{}' ({} stages, {} jobs)\n",
        pipeline.name,
        pipeline.stages.len(),
        pipeline.job_count()
    );

    let (mut rx, result_handle) = runner.run(pipeline);

    while let Some(event) = rx.recv().await {
        match event {
            RunEvent::StageStarted { stage } => {
                println!("▶ Stage '{}' started", stage);
            }
            RunEvent::JobStarted { job, .. } => {
                println!("  ▶ Job '{}' started", job);
            }
            RunEvent::JobLog { job, line } => {
                println!("  [{}] {}", job, line.content);
            }
            RunEvent::JobCompleted {
                job,
                success,
                fallible,
                ..
            } => {
                if success {
                    println!("  ✓ Job '{}' succeeded", job);
                } else if fallible {
                    println!("  ⚠ Job '{}' failed (fallible, continuing)", job);
                } else {
                    println!("  ✗ Job '{}' failed", job);
                }
            }
            RunEvent::StageCompleted { stage, success } => {
                if success {
                    println!("✓ Stage '{}' completed\n", stage);
                } else {
                    println!("✗ Stage '{}' failed\n", stage);
                }
            }
            RunEvent::PipelineCompleted { success } => {
                if success {
                    println!("--- Pipeline completed successfully ---");
                } else {
                    println!("--- Pipeline failed ---");
                }
            }
        }
    }

    let outcome = result_handle
        .await
        .context("Pipeline execution task failed")?;

    println!("\n--- Summary ---");
    for stage in &outcome.stages {
        for job in &stage.jobs {
            let status = match &job.state {
                JobState::Succeeded => "✓ succeeded".to_string(),
                JobState::Failed { message } if job.fallible => {
                    format!("⚠ failed (fallible): {}", message)
                }
                JobState::Failed { message } => format!("✗ failed: {}", message),
            };
            println!("  {}/{} - {}", stage.name, job.name, status);
        }
    }

    outcome.result()?;
    Ok(())
}

/// Execute a single job, printing its logs.
pub async fn run_single_job(mut spec: JobSpec, workspace: &str) -> Result<()> {
    mount_workspace_into(&mut spec, workspace)?;

    let executor = DockerExecutor::new().context("Failed to connect to Docker")?;
    let runner = PipelineRunner::new(Arc::new(executor));

    println!("Running job '{}' ({})", spec.name, spec.image);
    let (mut rx, handle) = runner.run_job(spec);

    while let Some(event) = rx.recv().await {
        if let RunEvent::JobLog { job, line } = event {
            println!("  [{}] {}", job, line.content);
        }
    }

    let outcome = handle.await.context("Job execution task failed")??;
    match &outcome.state {
        JobState::Succeeded => println!("✓ Job '{}' succeeded", outcome.name),
        JobState::Failed { message } => {
            println!("⚠ Job '{}' failed (fallible): {}", outcome.name, message)
        }
    }
    Ok(())
}

/// Validate a project configuration file.
pub fn validate(path: &str) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path))?;
    let config = ProjectConfig::parse(&content)
        .with_context(|| format!("Invalid project config: {}", path))?;

    println!("✓ {} is valid", path);
    println!("  project:        {}", config.name);
    println!("  source path:    {}", config.source_path);
    println!("  default branch: {}", config.default_branch);
    Ok(())
}
