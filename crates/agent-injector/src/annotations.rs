//! Pod annotation parsing
//!
//! Turns the `contrast-agent-injector/*` annotations on a pod into an
//! [`InjectionConfig`]. Parsing is pure; callers decide what to do with errors.

use k8s_openapi::api::core::v1::EnvVar;
use std::collections::BTreeMap;

use crate::error::{InjectionError, InjectionResult};

/// Opt-in switch; `true` or `enabled` (any case) turns injection on
pub const ENABLED_ANNOTATION: &str = "contrast-agent-injector/enabled";
/// Selects the agent profile, case-insensitive
pub const LANGUAGE_ANNOTATION: &str = "contrast-agent-injector/language";
/// Agent version, passed through to the download URL
pub const VERSION_ANNOTATION: &str = "contrast-agent-injector/version";
/// Comma-separated `KEY=VALUE` pairs exported as extra environment variables
pub const CONFIG_ANNOTATION: &str = "contrast-agent-injector/config";

/// Injection settings extracted from pod annotations
#[derive(Debug, Clone, PartialEq)]
pub struct InjectionConfig {
    /// Requested agent language as written on the pod
    pub language: String,
    /// Opaque agent version string
    pub version: String,
    /// Extra environment variables in annotation order, duplicates kept
    pub extra_env_vars: Vec<EnvVar>,
}

/// Returns `true` when the pod opted in to agent injection.
#[must_use]
pub fn is_injection_enabled(annotations: &BTreeMap<String, String>) -> bool {
    annotations
        .get(ENABLED_ANNOTATION)
        .is_some_and(|value| {
            value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("enabled")
        })
}

/// Parse the injection annotations of a pod.
pub fn parse_annotations(
    annotations: &BTreeMap<String, String>,
) -> InjectionResult<InjectionConfig> {
    let language = non_empty(annotations, LANGUAGE_ANNOTATION);
    let version = non_empty(annotations, VERSION_ANNOTATION);

    let (Some(language), Some(version)) = (language, version) else {
        return Err(InjectionError::Configuration {
            details: format!(
                "language and version required: both {LANGUAGE_ANNOTATION} and {VERSION_ANNOTATION} need to be set"
            ),
        });
    };

    let extra_env_vars = match annotations.get(CONFIG_ANNOTATION).map(String::as_str) {
        Some(raw) => parse_config_annotation(raw)?,
        None => Vec::new(),
    };

    Ok(InjectionConfig {
        language: language.to_string(),
        version: version.to_string(),
        extra_env_vars,
    })
}

fn non_empty<'a>(annotations: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    annotations
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

/// Parse `KEY=VALUE, KEY2=VALUE2` into environment variables.
///
/// Blank segments are skipped. A segment without `=` or with an empty key
/// rejects the whole annotation.
pub fn parse_config_annotation(raw: &str) -> InjectionResult<Vec<EnvVar>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok(EnvVar {
                name: key.to_string(),
                value: Some(value.to_string()),
                ..EnvVar::default()
            }),
            _ => Err(InjectionError::Configuration {
                details: format!(
                    "failed to parse {CONFIG_ANNOTATION} entry '{pair}' in '{raw}', expected KEY=VALUE"
                ),
            }),
        })
        .collect()
}
