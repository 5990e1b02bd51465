//! Job factories.
//!
//! Every job here is a wrapper around a make target, run in a tools
//! container against the mounted project source. Factories only build
//! descriptors; nothing is executed from this module.

use std::collections::HashMap;

use gantry_config::ProjectConfig;
use gantry_core::Result;
use gantry_core::event::EventContext;
use gantry_core::job::{JobSpec, SidecarSpec};
use gantry_core::registry::JobRegistry;

// Secret keys expected in the project's credential bag.
const DOCKERHUB_ORG: &str = "dockerhubOrg";
const DOCKERHUB_USERNAME: &str = "dockerhubUsername";
const DOCKERHUB_PASSWORD: &str = "dockerhubPassword";
const GHCR_USERNAME: &str = "ghcrUsername";
const GHCR_PASSWORD: &str = "ghcrPassword";
const HELM_REGISTRY: &str = "helmRegistry";
const HELM_ORG: &str = "helmOrg";
const HELM_USERNAME: &str = "helmUsername";
const HELM_PASSWORD: &str = "helmPassword";
const SIGNING_KEY: &str = "signingKey";
const GITHUB_TOKEN: &str = "githubToken";

/// Where the dind sidecar's daemon listens, from the primary's namespace.
const DIND_HOST: &str = "tcp://127.0.0.1:2375";

/// Build a job that runs one make target.
///
/// The base environment always disables nested container runs
/// (`SKIP_DOCKER=true`) and carries `VERSION` when the event's ref is a
/// release tag. Caller overrides win on key collision.
pub fn target_job(
    target: &str,
    image: &str,
    ctx: &EventContext,
    cfg: &ProjectConfig,
    overrides: HashMap<String, String>,
) -> JobSpec {
    let mut env = HashMap::from([("SKIP_DOCKER".to_string(), "true".to_string())]);
    if let Some(version) = ctx.release_version() {
        env.insert("VERSION".to_string(), version.to_string());
    }
    env.extend(overrides);

    let mut spec = JobSpec::new(target, image);
    spec.command = vec!["make".to_string()];
    spec.args = vec![target.to_string()];
    spec.env = env;
    spec.working_dir = Some(cfg.source_path.clone());
    spec.source_mount_path = Some(cfg.source_path.clone());
    spec
}

pub fn test_unit_job(ctx: &EventContext, cfg: &ProjectConfig) -> JobSpec {
    target_job("test-unit", &cfg.images.go, ctx, cfg, HashMap::new())
}

pub fn lint_job(ctx: &EventContext, cfg: &ProjectConfig) -> JobSpec {
    target_job("lint", &cfg.images.go, ctx, cfg, HashMap::new())
}

pub fn lint_chart_job(ctx: &EventContext, cfg: &ProjectConfig) -> JobSpec {
    target_job("lint-chart", &cfg.images.helm, ctx, cfg, HashMap::new())
}

/// Security scan. Fallible: a failed scan is reported but never blocks
/// the suite.
pub fn scan_job(ctx: &EventContext, cfg: &ProjectConfig) -> JobSpec {
    let mut spec = target_job("scan", &cfg.images.scanner, ctx, cfg, HashMap::new());
    spec.fallible = true;
    spec
}

/// Image build without publishing; runs in kaniko, no credentials.
pub fn build_job(ctx: &EventContext, cfg: &ProjectConfig) -> JobSpec {
    target_job("build", &cfg.images.kaniko, ctx, cfg, HashMap::new())
}

/// Publish variant: image push with registry credentials injected.
pub fn push_job(ctx: &EventContext, cfg: &ProjectConfig) -> Result<JobSpec> {
    let secrets = &ctx.secrets;
    let env = HashMap::from([
        (
            "DOCKER_ORG".to_string(),
            secrets.require(DOCKERHUB_ORG)?.to_string(),
        ),
        (
            "DOCKER_USERNAME".to_string(),
            secrets.require(DOCKERHUB_USERNAME)?.to_string(),
        ),
        (
            "DOCKER_PASSWORD".to_string(),
            secrets.require(DOCKERHUB_PASSWORD)?.to_string(),
        ),
    ]);
    Ok(target_job("push", &cfg.images.kaniko, ctx, cfg, env))
}

/// Publish variant: chart publishing with registry credentials injected.
pub fn publish_chart_job(ctx: &EventContext, cfg: &ProjectConfig) -> Result<JobSpec> {
    let secrets = &ctx.secrets;
    let env = HashMap::from([
        (
            "HELM_REGISTRY".to_string(),
            secrets.get_or(HELM_REGISTRY, "ghcr.io").to_string(),
        ),
        (
            "HELM_ORG".to_string(),
            secrets.require(HELM_ORG)?.to_string(),
        ),
        (
            "HELM_USERNAME".to_string(),
            secrets.require(HELM_USERNAME)?.to_string(),
        ),
        (
            "HELM_PASSWORD".to_string(),
            secrets.require(HELM_PASSWORD)?.to_string(),
        ),
    ]);
    Ok(target_job("publish-chart", &cfg.images.helm, ctx, cfg, env))
}

/// Publish variant: SBOM upload to the release page.
pub fn publish_sbom_job(ctx: &EventContext, cfg: &ProjectConfig) -> Result<JobSpec> {
    let env = HashMap::from([(
        "GITHUB_TOKEN".to_string(),
        ctx.secrets.require(GITHUB_TOKEN)?.to_string(),
    )]);
    Ok(target_job("publish-sbom", &cfg.images.go, ctx, cfg, env))
}

/// Build-and-sign variant: builds and pushes the release image against a
/// privileged docker-in-docker sidecar, signing it when a key is
/// configured.
///
/// The composed script preserves step order: registry authentication
/// before the build, the build before the signing step.
pub fn release_image_job(ctx: &EventContext, cfg: &ProjectConfig) -> Result<JobSpec> {
    let secrets = &ctx.secrets;

    let mut env = HashMap::from([
        ("DOCKER_HOST".to_string(), DIND_HOST.to_string()),
        (
            "DOCKER_ORG".to_string(),
            secrets.require(DOCKERHUB_ORG)?.to_string(),
        ),
        (
            "DOCKER_USERNAME".to_string(),
            secrets.require(DOCKERHUB_USERNAME)?.to_string(),
        ),
        (
            "DOCKER_PASSWORD".to_string(),
            secrets.require(DOCKERHUB_PASSWORD)?.to_string(),
        ),
    ]);

    let mut script = vec![
        "set -e".to_string(),
        // The daemon in the sidecar needs a moment to come up.
        "while ! docker info >/dev/null 2>&1; do sleep 1; done".to_string(),
        // Stage the build tool.
        "docker buildx create --name gantry --use".to_string(),
        // Registry authentication.
        "echo \"$DOCKER_PASSWORD\" | docker login -u \"$DOCKER_USERNAME\" --password-stdin"
            .to_string(),
    ];

    if let (Some(user), Some(password)) = (secrets.get(GHCR_USERNAME), secrets.get(GHCR_PASSWORD))
    {
        env.insert("GHCR_USERNAME".to_string(), user.to_string());
        env.insert("GHCR_PASSWORD".to_string(), password.to_string());
        script.push(
            "echo \"$GHCR_PASSWORD\" | docker login ghcr.io -u \"$GHCR_USERNAME\" --password-stdin"
                .to_string(),
        );
    }

    let signing_key = secrets.get(SIGNING_KEY);
    if let Some(key) = signing_key {
        env.insert("COSIGN_KEY".to_string(), key.to_string());
        script.push("printf '%s' \"$COSIGN_KEY\" > /tmp/cosign.key".to_string());
    }

    // The build itself.
    script.push("make push".to_string());

    // Signing only makes sense for a keyed, versioned release.
    if signing_key.is_some() && ctx.release_version().is_some() {
        script.push("make sign".to_string());
    }

    let mut spec = target_job("release-image", &cfg.images.docker, ctx, cfg, env);
    spec.command = vec!["sh".to_string(), "-c".to_string()];
    spec.args = vec![script.join("\n")];
    spec.sidecars = vec![SidecarSpec {
        name: "dind".to_string(),
        image: cfg.images.dind.clone(),
        command: vec![],
        env: HashMap::from([("DOCKER_TLS_CERTDIR".to_string(), String::new())]),
        privileged: true,
    }];
    Ok(spec)
}

/// Build the job registry for a project. Populated once at startup; a
/// re-run request resolves its job name here.
pub fn default_registry(cfg: &ProjectConfig) -> Result<JobRegistry> {
    let mut registry = JobRegistry::new();

    macro_rules! register {
        ($name:expr, $factory:expr) => {{
            let cfg = cfg.clone();
            registry.register($name, move |ctx: &EventContext| $factory(ctx, &cfg))?;
        }};
    }

    register!("test-unit", |ctx, cfg| Ok(test_unit_job(ctx, cfg)));
    register!("lint", |ctx, cfg| Ok(lint_job(ctx, cfg)));
    register!("lint-chart", |ctx, cfg| Ok(lint_chart_job(ctx, cfg)));
    register!("scan", |ctx, cfg| Ok(scan_job(ctx, cfg)));
    register!("build", |ctx, cfg| Ok(build_job(ctx, cfg)));
    register!("push", push_job);
    register!("release-image", release_image_job);
    register!("publish-chart", publish_chart_job);
    register!("publish-sbom", publish_sbom_job);

    Ok(registry)
}
