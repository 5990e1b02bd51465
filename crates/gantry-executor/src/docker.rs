//! Local Docker executor implementation.

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use chrono::Utc;
use futures::StreamExt;
use futures::stream::BoxStream;
use gantry_core::job::{JobHandle, JobResult, JobSpec, JobStatus, LogLine, LogStream, SidecarSpec};
use gantry_core::{Error, Result, executor::Executor};
use tracing::{debug, info, warn};

/// Runs jobs as local Docker containers. Sidecars share the primary
/// container's network namespace, mirroring the pod model the production
/// platform schedules onto.
pub struct DockerExecutor {
    docker: Docker,
}

impl DockerExecutor {
    /// Connect to the local Docker daemon.
    pub fn new() -> Result<Self> {
        let docker =
            Docker::connect_with_local_defaults().map_err(|e| Error::Internal(e.to_string()))?;
        Ok(Self { docker })
    }

    /// Create with a custom Docker client.
    pub fn with_client(docker: Docker) -> Self {
        Self { docker }
    }

    fn container_name(spec: &JobSpec) -> String {
        format!("gantry-{}-{}", spec.name, spec.id.short())
    }

    fn sidecar_name(primary: &str, sidecar: &SidecarSpec) -> String {
        format!("{}-{}", primary, sidecar.name)
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        info!(image = %image, "Pulling image");
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };
        let mut pull_stream = self.docker.create_image(Some(options), None, None);
        while let Some(result) = pull_stream.next().await {
            match result {
                Ok(progress) => {
                    if let Some(status) = progress.status {
                        debug!(status = %status, "Pull progress");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Pull warning");
                }
            }
        }
        Ok(())
    }

    /// Start a sidecar attached to the primary container's network
    /// namespace. Returns the sidecar's container id.
    async fn start_sidecar(
        &self,
        primary_name: &str,
        primary_id: &str,
        sidecar: &SidecarSpec,
    ) -> Result<String> {
        self.pull_image(&sidecar.image).await?;

        let name = Self::sidecar_name(primary_name, sidecar);
        let env: Vec<String> = sidecar
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let host_config = HostConfig {
            privileged: Some(sidecar.privileged),
            network_mode: Some(format!("container:{}", primary_id)),
            ..Default::default()
        };

        let config = Config {
            image: Some(sidecar.image.clone()),
            cmd: if sidecar.command.is_empty() {
                None
            } else {
                Some(sidecar.command.clone())
            },
            env: Some(env),
            host_config: Some(host_config),
            ..Default::default()
        };

        let create_options = CreateContainerOptions {
            name: name.clone(),
            platform: None,
        };

        info!(container = %name, privileged = sidecar.privileged, "Starting sidecar");
        let container = self
            .docker
            .create_container(Some(create_options), config)
            .await
            .map_err(|e| Error::ExecutionFailed(format!("Failed to create sidecar: {}", e)))?;

        self.docker
            .start_container(&name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Error::ExecutionFailed(format!("Failed to start sidecar: {}", e)))?;

        Ok(container.id)
    }

    async fn remove_container(&self, id: &str) {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        if let Err(e) = self.docker.remove_container(id, Some(options)).await {
            warn!(container = %id, error = %e, "Failed to remove container");
        }
    }

    async fn teardown_sidecars(&self, handle: &JobHandle) {
        for id in &handle.sidecar_ids {
            self.remove_container(id).await;
        }
    }
}

#[async_trait]
impl Executor for DockerExecutor {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn spawn(&self, spec: JobSpec) -> Result<JobHandle> {
        let container_name = Self::container_name(&spec);

        self.pull_image(&spec.image).await?;

        let env: Vec<String> = spec
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let mut cmd = spec.command.clone();
        cmd.extend(spec.args.iter().cloned());

        let binds: Option<Vec<String>> = if spec.volumes.is_empty() {
            None
        } else {
            Some(
                spec.volumes
                    .iter()
                    .map(|v| {
                        let mode = if v.read_only { "ro" } else { "rw" };
                        format!("{}:{}:{}", v.source, v.mount_path, mode)
                    })
                    .collect(),
            )
        };

        let host_config = HostConfig {
            binds,
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            cmd: if cmd.is_empty() { None } else { Some(cmd) },
            env: Some(env),
            working_dir: spec.working_dir.clone(),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            host_config: Some(host_config),
            ..Default::default()
        };

        let create_options = CreateContainerOptions {
            name: container_name.clone(),
            platform: None,
        };

        info!(container = %container_name, image = %spec.image, "Creating container");
        let container = self
            .docker
            .create_container(Some(create_options), config)
            .await
            .map_err(|e| Error::ExecutionFailed(format!("Failed to create container: {}", e)))?;

        info!(container = %container_name, "Starting container");
        self.docker
            .start_container(&container_name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Error::ExecutionFailed(format!("Failed to start container: {}", e)))?;

        // Sidecars join the primary's network namespace, so the primary
        // must be running before any of them start.
        let mut sidecar_ids = Vec::with_capacity(spec.sidecars.len());
        for sidecar in &spec.sidecars {
            match self
                .start_sidecar(&container_name, &container.id, sidecar)
                .await
            {
                Ok(id) => sidecar_ids.push(id),
                Err(e) => {
                    for id in &sidecar_ids {
                        self.remove_container(id).await;
                    }
                    self.remove_container(&container.id).await;
                    return Err(e);
                }
            }
        }

        Ok(JobHandle {
            id: spec.id,
            name: spec.name.clone(),
            executor_id: container.id,
            sidecar_ids,
            executor_name: self.name().to_string(),
            timeout: spec.timeout,
        })
    }

    async fn logs(&self, handle: &JobHandle) -> Result<BoxStream<'static, LogLine>> {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        let stream = self.docker.logs(&handle.executor_id, Some(options));

        let mapped_stream = stream.filter_map(|result| async move {
            match result {
                Ok(output) => {
                    let (stream, content) = match output {
                        LogOutput::StdErr { message } => (
                            LogStream::Stderr,
                            String::from_utf8_lossy(&message).to_string(),
                        ),
                        LogOutput::StdOut { message }
                        | LogOutput::Console { message }
                        | LogOutput::StdIn { message } => (
                            LogStream::Stdout,
                            String::from_utf8_lossy(&message).to_string(),
                        ),
                    };
                    Some(LogLine {
                        timestamp: Utc::now(),
                        stream,
                        content: content.trim_end().to_string(),
                    })
                }
                Err(e) => {
                    warn!(error = %e, "Log stream error");
                    None
                }
            }
        });

        Ok(Box::pin(mapped_stream))
    }

    async fn status(&self, handle: &JobHandle) -> Result<JobStatus> {
        let inspect = self
            .docker
            .inspect_container(&handle.executor_id, None)
            .await
            .map_err(|e| Error::NotFound(format!("Container not found: {}", e)))?;

        let state = inspect
            .state
            .ok_or_else(|| Error::Internal("No container state".to_string()))?;

        let parse_time = |s: Option<String>| {
            s.and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc))
        };

        let status = if state.running.unwrap_or(false) {
            JobStatus::Running {
                started_at: parse_time(state.started_at).unwrap_or_else(Utc::now),
            }
        } else if state.paused.unwrap_or(false) {
            JobStatus::Pending
        } else {
            // Container has exited
            let exit_code = state.exit_code.map(|c| c as i32);
            let started_at = parse_time(state.started_at);
            let finished_at = parse_time(state.finished_at).unwrap_or_else(Utc::now);

            if exit_code == Some(0) {
                JobStatus::Succeeded {
                    started_at: started_at.unwrap_or(finished_at),
                    finished_at,
                }
            } else {
                JobStatus::Failed {
                    started_at,
                    finished_at,
                    exit_code,
                    message: state.error.unwrap_or_default(),
                }
            }
        };

        Ok(status)
    }

    async fn wait(&self, handle: &JobHandle) -> Result<JobResult> {
        let current_status = self.status(handle).await?;
        if current_status.is_terminal() {
            self.teardown_sidecars(handle).await;
            let exit_code = match &current_status {
                JobStatus::Succeeded { .. } => Some(0),
                JobStatus::Failed { exit_code, .. } => *exit_code,
                _ => None,
            };
            return Ok(JobResult {
                status: current_status,
                exit_code,
            });
        }

        let options = WaitContainerOptions {
            condition: "not-running",
        };

        let mut stream = self
            .docker
            .wait_container(&handle.executor_id, Some(options));

        let next_exit = async {
            match stream.next().await {
                Some(Ok(response)) => Some(response.status_code as i32),
                Some(Err(e)) => {
                    warn!(error = %e, "Wait error");
                    None
                }
                None => None,
            }
        };

        let exit_code = match handle.timeout {
            Some(limit) => match tokio::time::timeout(limit, next_exit).await {
                Ok(code) => code,
                Err(_) => {
                    warn!(job = %handle.name, ?limit, "Job exceeded its timeout");
                    self.cancel(handle).await?;
                    return Ok(JobResult {
                        status: JobStatus::Failed {
                            started_at: None,
                            finished_at: Utc::now(),
                            exit_code: None,
                            message: format!("timed out after {:?}", limit),
                        },
                        exit_code: None,
                    });
                }
            },
            None => next_exit.await,
        };

        let status = self.status(handle).await?;
        self.teardown_sidecars(handle).await;

        Ok(JobResult { status, exit_code })
    }

    async fn cancel(&self, handle: &JobHandle) -> Result<()> {
        self.docker
            .stop_container(&handle.executor_id, None)
            .await
            .map_err(|e| Error::ExecutionFailed(format!("Failed to stop container: {}", e)))?;

        self.remove_container(&handle.executor_id).await;
        self.teardown_sidecars(handle).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn make_test_spec() -> JobSpec {
        let mut spec = JobSpec::new("test-unit", "brigadecore/go-tools:v0.1.0");
        spec.command = vec!["make".to_string()];
        spec.args = vec!["test-unit".to_string()];
        spec.env = HashMap::from([("SKIP_DOCKER".to_string(), "true".to_string())]);
        spec
    }

    #[test]
    fn test_container_name_carries_job_name() {
        let spec = make_test_spec();
        let name = DockerExecutor::container_name(&spec);
        assert!(name.starts_with("gantry-test-unit-"));
    }

    #[test]
    fn test_container_name_unique_per_invocation() {
        let a = DockerExecutor::container_name(&make_test_spec());
        let b = DockerExecutor::container_name(&make_test_spec());
        assert_ne!(a, b);
    }

    #[test]
    fn test_sidecar_name() {
        let sidecar = SidecarSpec {
            name: "dind".to_string(),
            image: "docker:24-dind".to_string(),
            command: vec![],
            env: HashMap::new(),
            privileged: true,
        };
        let name = DockerExecutor::sidecar_name("gantry-push-abc123", &sidecar);
        assert_eq!(name, "gantry-push-abc123-dind");
    }
}

/// Integration tests that require Docker to be running.
/// Run with: cargo test -- --ignored
#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::collections::HashMap;

    fn shell_spec(name: &str, script: &str) -> JobSpec {
        let mut spec = JobSpec::new(name, "alpine:latest");
        spec.command = vec!["/bin/sh".to_string(), "-c".to_string()];
        spec.args = vec![script.to_string()];
        spec
    }

    #[tokio::test]
    #[ignore]
    async fn test_job_lifecycle() {
        let executor = DockerExecutor::new().unwrap();

        let mut spec = shell_spec("echo", "echo \"hello from $GREETER\"");
        spec.env = HashMap::from([("GREETER".to_string(), "gantry".to_string())]);

        let handle = executor.spawn(spec).await.expect("Should spawn container");
        assert_eq!(handle.executor_name, "docker");

        let result = executor.wait(&handle).await.expect("Should wait");
        assert_eq!(result.exit_code, Some(0));
        assert!(result.status.is_success());

        let mut logs = executor.logs(&handle).await.expect("Should get logs");
        let mut found = false;
        while let Some(line) = logs.next().await {
            if line.content.contains("hello from gantry") {
                found = true;
                break;
            }
        }
        assert!(found, "Should find env-expanded output");

        executor.remove_container(&handle.executor_id).await;
    }

    #[tokio::test]
    #[ignore]
    async fn test_failing_job_reports_exit_code() {
        let executor = DockerExecutor::new().unwrap();

        let handle = executor
            .spawn(shell_spec("fail", "exit 42"))
            .await
            .expect("Should spawn container");
        let result = executor.wait(&handle).await.expect("Should wait");

        assert_eq!(result.exit_code, Some(42));
        match result.status {
            JobStatus::Failed { exit_code, .. } => assert_eq!(exit_code, Some(42)),
            other => panic!("Expected Failed, got {:?}", other),
        }

        executor.remove_container(&handle.executor_id).await;
    }

    #[tokio::test]
    #[ignore]
    async fn test_sidecar_shares_network_namespace() {
        let executor = DockerExecutor::new().unwrap();

        // The sidecar listens on localhost; the primary polls it through
        // the shared namespace.
        let mut spec = shell_spec(
            "probe",
            "for i in $(seq 1 30); do nc -z 127.0.0.1 7070 && exit 0; sleep 1; done; exit 1",
        );
        spec.sidecars = vec![SidecarSpec {
            name: "listener".to_string(),
            image: "alpine:latest".to_string(),
            command: vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                "while true; do echo ok | nc -l -p 7070; done".to_string(),
            ],
            env: HashMap::new(),
            privileged: false,
        }];

        let handle = executor.spawn(spec).await.expect("Should spawn with sidecar");
        assert_eq!(handle.sidecar_ids.len(), 1);

        let result = executor.wait(&handle).await.expect("Should wait");
        assert_eq!(result.exit_code, Some(0));

        executor.remove_container(&handle.executor_id).await;
    }

    #[tokio::test]
    #[ignore]
    async fn test_cancel_removes_containers() {
        let executor = DockerExecutor::new().unwrap();

        let handle = executor
            .spawn(shell_spec("sleeper", "sleep 300"))
            .await
            .expect("Should spawn container");

        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        executor.cancel(&handle).await.expect("Should cancel");

        assert!(executor.status(&handle).await.is_err());
    }
}
