//! Admission decision handling
//!
//! Takes a decoded admission request and decides whether and how to inject the
//! agent into the pod. Injection is advisory: once the pod itself decoded, every
//! failure becomes an allowed response with a message and no patch.

use json_patch::{Patch, PatchOperation};
use jsonptr::PointerBuf;
use k8s_openapi::api::core::v1::{Pod, PodSpec};
use kube::core::admission::{AdmissionRequest, AdmissionResponse};
use kube::core::DynamicObject;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::annotations::{is_injection_enabled, parse_annotations, ENABLED_ANNOTATION};
use crate::error::{InjectionError, InjectionResult};
use crate::patch::plan_merge;
use crate::profiles::{target_container, ProfileRegistry};

static NO_ANNOTATIONS: BTreeMap<String, String> = BTreeMap::new();

/// Everything needed to plan one injection
#[derive(Debug, Clone, Copy)]
pub struct InjectionRequest<'a> {
    pub pod_spec: &'a PodSpec,
    pub annotations: &'a BTreeMap<String, String>,
    pub secret_name: &'a str,
}

impl<'a> InjectionRequest<'a> {
    /// Build a request for `pod`, rejecting pods without containers
    pub fn from_pod(pod: &'a Pod, secret_name: &'a str) -> InjectionResult<Self> {
        let pod_spec = pod
            .spec
            .as_ref()
            .filter(|spec| !spec.containers.is_empty())
            .ok_or_else(|| InjectionError::Validation {
                details: "No containers defined in the Pod".to_string(),
            })?;

        Ok(Self {
            pod_spec,
            annotations: pod.metadata.annotations.as_ref().unwrap_or(&NO_ANNOTATIONS),
            secret_name,
        })
    }
}

/// Decides on agent injection for admission requests
#[derive(Debug, Clone)]
pub struct AgentInjector {
    registry: ProfileRegistry,
    secret_name: String,
}

impl AgentInjector {
    #[must_use]
    pub fn new(registry: ProfileRegistry, secret_name: impl Into<String>) -> Self {
        Self {
            registry,
            secret_name: secret_name.into(),
        }
    }

    #[must_use]
    pub fn secret_name(&self) -> &str {
        &self.secret_name
    }

    /// Build the admission response for `request`.
    ///
    /// Only a pod that cannot be decoded is returned as an error; everything
    /// else is an allowed response, patched when injection applies.
    pub fn review(
        &self,
        request: &AdmissionRequest<DynamicObject>,
    ) -> InjectionResult<AdmissionResponse> {
        let outcome = self
            .mutate(request)
            .and_then(|ops| attach_patch(AdmissionResponse::from(request), ops));

        match outcome {
            Ok(response) => Ok(response),
            Err(err) if err.is_fail_open() => {
                err.log(&request.uid);
                let mut response = AdmissionResponse::from(request);
                response.result.message = err.to_string();
                Ok(response)
            }
            Err(err) => {
                err.log(&request.uid);
                Err(err)
            }
        }
    }

    /// Compute the patch for an admission request.
    ///
    /// Requests for anything other than core/v1 pods yield an empty patch.
    pub fn mutate(
        &self,
        request: &AdmissionRequest<DynamicObject>,
    ) -> InjectionResult<Vec<PatchOperation>> {
        let resource = &request.resource;
        if !(resource.group.is_empty() && resource.version == "v1" && resource.resource == "pods")
        {
            info!(
                uid = %request.uid,
                group = %resource.group,
                version = %resource.version,
                resource = %resource.resource,
                "Expected core/v1 pods, allowing unchanged"
            );
            return Ok(Vec::new());
        }

        let pod = decode_pod(request)?;
        let injection = InjectionRequest::from_pod(&pod, &self.secret_name)?;

        let ops = self.plan(&injection)?;
        info!(
            uid = %request.uid,
            pod = ?pod.metadata.name.as_ref().or(pod.metadata.generate_name.as_ref()),
            patches = ops.len(),
            "Planned agent injection"
        );
        Ok(ops)
    }

    /// Plan the injection patch for a pod spec and its annotations.
    pub fn plan(&self, request: &InjectionRequest<'_>) -> InjectionResult<Vec<PatchOperation>> {
        if !is_injection_enabled(request.annotations) {
            return Err(InjectionError::NotEnabled {
                annotation: ENABLED_ANNOTATION,
            });
        }

        let config = parse_annotations(request.annotations)?;
        let profile = self.registry.lookup(&config.language)?;
        debug!(language = %config.language, version = %config.version, "Selected agent profile");

        let desired =
            profile.generate_injection_set(request.pod_spec, &config, request.secret_name)?;
        let spec = request.pod_spec;
        let target = target_container(spec)?;

        let mut ops = plan_merge(
            spec.volumes.as_deref().unwrap_or_default(),
            &desired.volumes,
            &PointerBuf::from_tokens(["spec", "volumes"]),
        )?;
        ops.extend(plan_merge(
            spec.init_containers.as_deref().unwrap_or_default(),
            &desired.init_containers,
            &PointerBuf::from_tokens(["spec", "initContainers"]),
        )?);
        ops.extend(plan_merge(
            target.volume_mounts.as_deref().unwrap_or_default(),
            &desired.volume_mounts,
            &PointerBuf::from_tokens(["spec", "containers", "0", "volumeMounts"]),
        )?);
        ops.extend(plan_merge(
            target.env.as_deref().unwrap_or_default(),
            &desired.env_vars,
            &PointerBuf::from_tokens(["spec", "containers", "0", "env"]),
        )?);

        Ok(ops)
    }
}

fn attach_patch(
    response: AdmissionResponse,
    ops: Vec<PatchOperation>,
) -> InjectionResult<AdmissionResponse> {
    if ops.is_empty() {
        return Ok(response);
    }

    response
        .with_patch(Patch(ops))
        .map_err(|e| InjectionError::Serialization {
            details: format!("could not serialize JSON patch: {e}"),
        })
}

fn decode_pod(request: &AdmissionRequest<DynamicObject>) -> InjectionResult<Pod> {
    let object = request
        .object
        .as_ref()
        .ok_or_else(|| InjectionError::Decode {
            details: "admission request carries no object".to_string(),
        })?;

    serde_json::to_value(object)
        .and_then(serde_json::from_value::<Pod>)
        .map_err(|e| InjectionError::Decode {
            details: format!("could not deserialize pod object: {e}"),
        })
}
