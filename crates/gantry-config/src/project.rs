//! Project configuration parsing.

use kdl::{KdlDocument, KdlNode};

use crate::{ConfigError, ConfigResult};

/// Container images used by the job factories.
#[derive(Debug, Clone)]
pub struct Images {
    /// Toolchain image for unit tests and linting.
    pub go: String,
    /// Image build tool for non-privileged image builds.
    pub kaniko: String,
    /// Chart lint/publish tooling.
    pub helm: String,
    /// Security scanner image.
    pub scanner: String,
    /// Docker CLI image for the build-and-sign job's primary container.
    pub docker: String,
    /// Docker-in-docker daemon image for the privileged sidecar.
    pub dind: String,
}

impl Default for Images {
    fn default() -> Self {
        Self {
            go: "brigadecore/go-tools:v0.1.0".to_string(),
            kaniko: "brigadecore/kaniko:v0.2.0".to_string(),
            helm: "brigadecore/helm-tools:v0.1.0".to_string(),
            scanner: "anchore/grype:latest".to_string(),
            docker: "brigadecore/docker-tools:v0.1.0".to_string(),
            dind: "docker:24-dind".to_string(),
        }
    }
}

/// Project-level settings for the glue layer.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    /// Project name; also the check-run name prefix.
    pub name: String,
    /// Where the project source is mounted inside job containers.
    pub source_path: String,
    /// Branch whose merges publish edge images.
    pub default_branch: String,
    /// Images for the job factories.
    pub images: Images,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "gantry".to_string(),
            source_path: "/workspaces/gantry".to_string(),
            default_branch: "main".to_string(),
            images: Images::default(),
        }
    }
}

impl ProjectConfig {
    /// Parse a project configuration from KDL text. Every field has a
    /// default, so an empty document is valid.
    pub fn parse(kdl: &str) -> ConfigResult<Self> {
        let doc: KdlDocument = kdl.parse()?;
        let mut config = Self::default();

        for node in doc.nodes() {
            match node.name().value() {
                "project" => {
                    config.name = get_first_string_arg(node)
                        .ok_or_else(|| ConfigError::MissingField("project name".to_string()))?;
                    config.source_path = format!("/workspaces/{}", config.name);
                }
                "source-path" => {
                    config.source_path = get_first_string_arg(node)
                        .ok_or_else(|| ConfigError::MissingField("source-path".to_string()))?;
                }
                "default-branch" => {
                    config.default_branch = get_first_string_arg(node)
                        .ok_or_else(|| ConfigError::MissingField("default-branch".to_string()))?;
                }
                "images" => {
                    parse_images(node, &mut config.images)?;
                }
                _ => {} // Ignore unknown nodes
            }
        }

        Ok(config)
    }
}

fn parse_images(node: &KdlNode, images: &mut Images) -> ConfigResult<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };
    for child in children.nodes() {
        let value = get_first_string_arg(child).ok_or_else(|| ConfigError::InvalidValue {
            field: format!("images.{}", child.name().value()),
            message: "expected an image reference".to_string(),
        })?;
        match child.name().value() {
            "go" => images.go = value,
            "kaniko" => images.kaniko = value,
            "helm" => images.helm = value,
            "scanner" => images.scanner = value,
            "docker" => images.docker = value,
            "dind" => images.dind = value,
            other => {
                return Err(ConfigError::InvalidValue {
                    field: format!("images.{other}"),
                    message: "unknown image role".to_string(),
                });
            }
        }
    }
    Ok(())
}

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let kdl = r#"
            project "cloudevents-gateway"
            source-path "/workspaces/brigade-cloudevents-gateway"
            default-branch "master"

            images {
                go "brigadecore/go-tools:v0.6.0"
                dind "docker:25-dind"
            }
        "#;

        let config = ProjectConfig::parse(kdl).unwrap();
        assert_eq!(config.name, "cloudevents-gateway");
        assert_eq!(config.source_path, "/workspaces/brigade-cloudevents-gateway");
        assert_eq!(config.default_branch, "master");
        assert_eq!(config.images.go, "brigadecore/go-tools:v0.6.0");
        assert_eq!(config.images.dind, "docker:25-dind");
        // Unspecified images keep their defaults.
        assert_eq!(config.images.helm, "brigadecore/helm-tools:v0.1.0");
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ProjectConfig::parse("").unwrap();
        assert_eq!(config.default_branch, "main");
        assert_eq!(config.images.kaniko, "brigadecore/kaniko:v0.2.0");
    }

    #[test]
    fn test_project_name_sets_source_path() {
        let config = ProjectConfig::parse(r#"project "gateway""#).unwrap();
        assert_eq!(config.source_path, "/workspaces/gateway");
    }

    #[test]
    fn test_unknown_image_role_rejected() {
        let kdl = r#"
            images {
                podman "quay.io/podman/stable"
            }
        "#;
        let result = ProjectConfig::parse(kdl);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue { field, .. } if field == "images.podman"
        ));
    }
}
