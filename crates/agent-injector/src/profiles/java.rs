//! Contrast Java agent profile
//!
//! Downloads `contrast.jar` in an init container into a shared `emptyDir`,
//! mounts `contrast_security.yaml` from the configured secret, and loads the
//! agent through `JAVA_TOOL_OPTIONS`.

use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, EnvVar, KeyToPath, PodSpec, SecretVolumeSource, Volume,
    VolumeMount,
};
use tracing::info;

use super::{target_container, AgentProfile, DesiredObjectSet};
use crate::annotations::InjectionConfig;
use crate::error::InjectionResult;

pub const AGENT_VOLUME_NAME: &str = "contrast-agent-injector";
pub const CONFIG_VOLUME_NAME: &str = "contrast-agent-injector-yaml";
pub const INIT_CONTAINER_NAME: &str = "contrast-agent-injector";
pub const INIT_CONTAINER_IMAGE: &str = "busybox:1.34.0";

pub const AGENT_DIR: &str = "/opt/contrast";
pub const AGENT_JAR_PATH: &str = "/opt/contrast/contrast.jar";
pub const CONFIG_FILE_NAME: &str = "contrast_security.yaml";
pub const CONFIG_FILE_PATH: &str = "/opt/contrast/contrast_security.yaml";

const DOWNLOAD_URL_BASE: &str = "https://repository.sonatype.org/service/local/artifact/maven/redirect?r=central-proxy&g=com.contrastsecurity&a=contrast-agent&v=";

/// Profile for JVM workloads
#[derive(Debug, Clone, Copy, Default)]
pub struct JavaAgentProfile;

impl JavaAgentProfile {
    /// Maven redirect URL for the requested agent version
    #[must_use]
    pub fn download_url(version: &str) -> String {
        format!("{DOWNLOAD_URL_BASE}{}", version.to_uppercase())
    }

    fn init_container(version: &str) -> Container {
        let script = format!(
            "echo downloading Contrast agent;\n\
             DOWNLOAD_URL_AGENT_JAVA=\"{url}\";\n\
             wget -q -O {AGENT_JAR_PATH} \"$DOWNLOAD_URL_AGENT_JAVA\";\n\
             echo finished downloading Contrast agent;",
            url = Self::download_url(version),
        );

        Container {
            name: INIT_CONTAINER_NAME.to_string(),
            image: Some(INIT_CONTAINER_IMAGE.to_string()),
            command: Some(vec!["/bin/sh".to_string(), "-c".to_string()]),
            args: Some(vec![script]),
            volume_mounts: Some(vec![VolumeMount {
                name: AGENT_VOLUME_NAME.to_string(),
                mount_path: AGENT_DIR.to_string(),
                ..VolumeMount::default()
            }]),
            ..Container::default()
        }
    }

    fn volumes(secret_name: &str) -> Vec<Volume> {
        vec![
            Volume {
                name: AGENT_VOLUME_NAME.to_string(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Volume::default()
            },
            Volume {
                name: CONFIG_VOLUME_NAME.to_string(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some(secret_name.to_string()),
                    items: Some(vec![KeyToPath {
                        key: CONFIG_FILE_NAME.to_string(),
                        path: CONFIG_FILE_NAME.to_string(),
                        ..KeyToPath::default()
                    }]),
                    ..SecretVolumeSource::default()
                }),
                ..Volume::default()
            },
        ]
    }

    fn volume_mounts() -> Vec<VolumeMount> {
        vec![
            VolumeMount {
                name: AGENT_VOLUME_NAME.to_string(),
                mount_path: AGENT_DIR.to_string(),
                ..VolumeMount::default()
            },
            VolumeMount {
                name: CONFIG_VOLUME_NAME.to_string(),
                mount_path: CONFIG_FILE_PATH.to_string(),
                sub_path: Some(CONFIG_FILE_NAME.to_string()),
                ..VolumeMount::default()
            },
        ]
    }

    fn env_vars(app_name: &str, extra: &[EnvVar]) -> Vec<EnvVar> {
        let builtin = [
            ("JAVA_TOOL_OPTIONS", format!("-javaagent:{AGENT_JAR_PATH}")),
            ("CONTRAST_CONFIG_PATH", CONFIG_FILE_PATH.to_string()),
            (
                "CONTRAST__AGENT__JAVA__STANDALONE_APP_NAME",
                app_name.to_string(),
            ),
        ];

        builtin
            .into_iter()
            .map(|(name, value)| EnvVar {
                name: name.to_string(),
                value: Some(value),
                ..EnvVar::default()
            })
            .chain(extra.iter().cloned())
            .collect()
    }
}

impl AgentProfile for JavaAgentProfile {
    fn language(&self) -> &'static str {
        "java"
    }

    fn generate_injection_set(
        &self,
        pod_spec: &PodSpec,
        config: &InjectionConfig,
        secret_name: &str,
    ) -> InjectionResult<DesiredObjectSet> {
        let target = target_container(pod_spec)?;

        info!(
            container = %target.name,
            version = %config.version,
            extra_env_vars = config.extra_env_vars.len(),
            "Generating Java agent configuration"
        );

        Ok(DesiredObjectSet {
            init_containers: vec![Self::init_container(&config.version)],
            volumes: Self::volumes(secret_name),
            volume_mounts: Self::volume_mounts(),
            env_vars: Self::env_vars(&target.name, &config.extra_env_vars),
        })
    }
}
