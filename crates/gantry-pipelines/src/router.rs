//! Event routing: maps trigger events to pipelines or single jobs.

use gantry_config::ProjectConfig;
use gantry_core::event::EventContext;
use gantry_core::job::JobSpec;
use gantry_core::pipeline::{Pipeline, Stage};
use gantry_core::registry::JobRegistry;
use gantry_core::{Error, Result};
use tracing::info;

use crate::jobs;

/// What an event resolves to.
#[derive(Debug)]
pub enum Dispatch {
    /// Run a full pipeline.
    Pipeline(Pipeline),
    /// Re-run a single registered job.
    Job(JobSpec),
    /// Nothing to do for this event.
    Skip { reason: String },
}

/// Route an event to a pipeline, a single job, or a no-op.
///
/// The subscription set is fixed; events outside it are skipped.
/// Routing is stateless aside from reading the registry and context.
pub fn dispatch(
    ctx: &EventContext,
    cfg: &ProjectConfig,
    registry: &JobRegistry,
) -> Result<Dispatch> {
    match ctx.event.as_str() {
        // Either event runs the entire suite.
        "check_suite:requested" | "check_suite:rerequested" => {
            Ok(Dispatch::Pipeline(ci_pipeline(ctx, cfg)?))
        }

        // A specific job is to be re-run.
        "check_run:rerequested" => {
            let job_name = rerun_job_name(ctx)?;
            registry.produce(&job_name, ctx).map(Dispatch::Job)
        }

        // Pushing commits triggers a check suite, handled above. Here we
        // only care about new tags that look like a release.
        "push" => match ctx.release_version() {
            Some(version) => {
                info!(version = %version, "Release tag pushed");
                Ok(Dispatch::Pipeline(release_pipeline(ctx, cfg)?))
            }
            None => {
                let reason = format!(
                    "ref {} does not match the release tag pattern; not releasing",
                    ctx.git_ref.as_deref().unwrap_or("(none)")
                );
                info!("{reason}");
                Ok(Dispatch::Skip { reason })
            }
        },

        other => Ok(Dispatch::Skip {
            reason: format!("no subscription for event {other}"),
        }),
    }
}

/// The full suite: concurrent checks, then the image build. A merge to
/// the default branch additionally publishes an edge image.
pub fn ci_pipeline(ctx: &EventContext, cfg: &ProjectConfig) -> Result<Pipeline> {
    let mut stages = vec![
        Stage::concurrent(
            "checks",
            vec![
                jobs::test_unit_job(ctx, cfg),
                jobs::lint_job(ctx, cfg),
                jobs::lint_chart_job(ctx, cfg),
                jobs::scan_job(ctx, cfg),
            ],
        ),
        Stage::serial("build", vec![jobs::build_job(ctx, cfg)]),
    ];

    if ctx.is_branch(&cfg.default_branch) {
        stages.push(Stage::serial(
            "publish-edge",
            vec![jobs::push_job(ctx, cfg)?],
        ));
    }

    Ok(Pipeline::new("ci", stages))
}

/// A formal release: build, push, and sign the versioned image, then
/// publish the chart and the SBOM.
pub fn release_pipeline(ctx: &EventContext, cfg: &ProjectConfig) -> Result<Pipeline> {
    Ok(Pipeline::new(
        "release",
        vec![
            Stage::serial(
                "publish-image",
                vec![jobs::release_image_job(ctx, cfg)?],
            ),
            Stage::concurrent(
                "publish-artifacts",
                vec![
                    jobs::publish_chart_job(ctx, cfg)?,
                    jobs::publish_sbom_job(ctx, cfg)?,
                ],
            ),
        ],
    ))
}

/// Check-run names are of the form `<project id>:<job name>`; strip the
/// project prefix to find the job name.
fn rerun_job_name(ctx: &EventContext) -> Result<String> {
    let check_run_name = ctx
        .payload
        .get("check_run")
        .and_then(|c| c.get("name"))
        .and_then(|n| n.as_str())
        .ok_or_else(|| Error::Internal("event payload carries no check_run.name".to_string()))?;

    let prefix = format!("{}:", ctx.project_id);
    Ok(check_run_name
        .strip_prefix(&prefix)
        .unwrap_or(check_run_name)
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::secret::SecretBag;
    use serde_json::json;

    fn secrets() -> SecretBag {
        [
            ("dockerhubOrg", "brigadecore"),
            ("dockerhubUsername", "ci-bot"),
            ("dockerhubPassword", "hunter2"),
            ("helmOrg", "brigadecore"),
            ("helmUsername", "ci-bot"),
            ("helmPassword", "hunter2"),
            ("githubToken", "ghp_token"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn ctx(event: &str, git_ref: Option<&str>) -> EventContext {
        let mut ctx = EventContext::new("brigade.sh/github", event, "gateway")
            .with_secrets(secrets());
        if let Some(r) = git_ref {
            ctx = ctx.with_ref(r);
        }
        ctx
    }

    fn cfg() -> ProjectConfig {
        ProjectConfig::default()
    }

    fn registry() -> JobRegistry {
        jobs::default_registry(&cfg()).unwrap()
    }

    #[test]
    fn test_check_suite_runs_the_ci_pipeline() {
        let dispatch =
            dispatch(&ctx("check_suite:requested", Some("refs/heads/topic")), &cfg(), &registry())
                .unwrap();

        let Dispatch::Pipeline(pipeline) = dispatch else {
            panic!("expected a pipeline");
        };
        assert_eq!(pipeline.name, "ci");
        assert_eq!(pipeline.stages.len(), 2);
        assert_eq!(pipeline.stages[0].name, "checks");
        assert_eq!(pipeline.stages[0].jobs.len(), 4);
        assert_eq!(pipeline.stages[1].name, "build");
    }

    #[test]
    fn test_default_branch_merge_adds_edge_publish() {
        let dispatch = dispatch(
            &ctx("check_suite:requested", Some("refs/heads/main")),
            &cfg(),
            &registry(),
        )
        .unwrap();

        let Dispatch::Pipeline(pipeline) = dispatch else {
            panic!("expected a pipeline");
        };
        assert_eq!(pipeline.stages.len(), 3);
        assert_eq!(pipeline.stages[2].name, "publish-edge");
        assert_eq!(pipeline.stages[2].jobs[0].name, "push");
    }

    #[test]
    fn test_push_of_release_tag_runs_the_release_pipeline() {
        let dispatch =
            dispatch(&ctx("push", Some("refs/tags/v1.2.3")), &cfg(), &registry()).unwrap();

        let Dispatch::Pipeline(pipeline) = dispatch else {
            panic!("expected a pipeline");
        };
        assert_eq!(pipeline.name, "release");
        assert_eq!(pipeline.stages[0].jobs[0].name, "release-image");
        let artifacts: Vec<&str> = pipeline.stages[1]
            .jobs
            .iter()
            .map(|j| j.name.as_str())
            .collect();
        assert_eq!(artifacts, vec!["publish-chart", "publish-sbom"]);
        // Every job in a release run knows the version.
        for stage in &pipeline.stages {
            for job in &stage.jobs {
                assert_eq!(job.env.get("VERSION").unwrap(), "v1.2.3");
            }
        }
    }

    #[test]
    fn test_push_of_non_release_ref_is_a_no_op() {
        for git_ref in ["refs/heads/main", "refs/tags/not-a-version"] {
            let dispatch = dispatch(&ctx("push", Some(git_ref)), &cfg(), &registry()).unwrap();
            let Dispatch::Skip { reason } = dispatch else {
                panic!("expected a skip for {git_ref}");
            };
            assert!(reason.contains(git_ref));
        }
    }

    #[test]
    fn test_check_run_rerun_resolves_a_single_job() {
        let context = ctx("check_run:rerequested", Some("refs/heads/main")).with_payload(json!({
            "check_run": { "name": "gateway:lint" }
        }));

        let dispatch = dispatch(&context, &cfg(), &registry()).unwrap();
        let Dispatch::Job(spec) = dispatch else {
            panic!("expected a single job");
        };
        assert_eq!(spec.name, "lint");
    }

    #[test]
    fn test_check_run_rerun_of_unknown_job_fails() {
        let context = ctx("check_run:rerequested", None).with_payload(json!({
            "check_run": { "name": "gateway:does-not-exist" }
        }));

        let err = dispatch(&context, &cfg(), &registry()).unwrap_err();
        assert!(matches!(err, Error::UnknownJob(name) if name == "does-not-exist"));
    }

    #[test]
    fn test_check_run_rerun_without_payload_is_malformed() {
        let context = ctx("check_run:rerequested", None);
        let err = dispatch(&context, &cfg(), &registry()).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn test_unsubscribed_events_are_skipped() {
        let dispatch = dispatch(&ctx("issue_comment:created", None), &cfg(), &registry()).unwrap();
        assert!(matches!(dispatch, Dispatch::Skip { .. }));
    }
}
