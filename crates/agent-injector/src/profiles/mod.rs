//! Agent Profiles
//!
//! A profile knows how to wire one language agent into a pod: which init
//! containers download it, which volumes and mounts expose it, and which
//! environment variables make the runtime load it. Profiles are looked up by
//! lowercased language name, so new ones are added with [`ProfileRegistry::register`]
//! without touching the admission handler.

pub mod java;

use k8s_openapi::api::core::v1::{Container, EnvVar, PodSpec, Volume, VolumeMount};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::annotations::InjectionConfig;
use crate::error::{InjectionError, InjectionResult};

pub use java::JavaAgentProfile;

/// Objects a profile wants merged into the pod, each list in application order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredObjectSet {
    pub init_containers: Vec<Container>,
    pub volumes: Vec<Volume>,
    /// Mounts for the target container
    pub volume_mounts: Vec<VolumeMount>,
    /// Environment for the target container
    pub env_vars: Vec<EnvVar>,
}

/// Per-language injection strategy
pub trait AgentProfile: Send + Sync + fmt::Debug {
    /// Language this profile serves, lowercase
    fn language(&self) -> &'static str;

    /// Build the objects to inject into `pod_spec`.
    ///
    /// The agent always targets the first container of the pod.
    fn generate_injection_set(
        &self,
        pod_spec: &PodSpec,
        config: &InjectionConfig,
        secret_name: &str,
    ) -> InjectionResult<DesiredObjectSet>;
}

/// Container that receives the agent; always index 0.
pub fn target_container(pod_spec: &PodSpec) -> InjectionResult<&Container> {
    pod_spec
        .containers
        .first()
        .ok_or_else(|| InjectionError::Validation {
            details: "No containers defined in the Pod".to_string(),
        })
}

/// Registry of agent profiles keyed by lowercased language
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: HashMap<String, Arc<dyn AgentProfile>>,
}

impl ProfileRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in profile
    #[must_use]
    pub fn with_default_profiles() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(JavaAgentProfile));
        registry
    }

    /// Register a profile, returning the one it replaced for the same language
    pub fn register(&mut self, profile: Arc<dyn AgentProfile>) -> Option<Arc<dyn AgentProfile>> {
        let language = profile.language().to_lowercase();
        debug!(language = %language, "Registering agent profile");
        self.profiles.insert(language, profile)
    }

    /// Look up the profile for `language`, ignoring case
    pub fn lookup(&self, language: &str) -> InjectionResult<Arc<dyn AgentProfile>> {
        self.profiles
            .get(&language.to_lowercase())
            .cloned()
            .ok_or_else(|| InjectionError::UnsupportedLanguage {
                language: language.to_string(),
            })
    }

    /// Registered languages, sorted
    #[must_use]
    pub fn languages(&self) -> Vec<&str> {
        let mut languages: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        languages.sort_unstable();
        languages
    }
}
