//! JSON Patch planning for list fields of a pod spec
//!
//! Merges a desired list of objects into an existing list using RFC 6902 `add`
//! and `replace` operations only. Elements are matched by their identity key;
//! nothing outside the desired set is touched, removed or reordered.

use json_patch::{AddOperation, PatchOperation, ReplaceOperation};
use jsonptr::PointerBuf;
use k8s_openapi::api::core::v1::{Container, EnvVar, Volume, VolumeMount};
use serde::Serialize;
use tracing::debug;

use crate::error::InjectionResult;

/// Field used to match a desired list element against an existing one
pub trait IdentityKey {
    fn identity_key(&self) -> &str;
}

impl IdentityKey for Container {
    fn identity_key(&self) -> &str {
        &self.name
    }
}

impl IdentityKey for Volume {
    fn identity_key(&self) -> &str {
        &self.name
    }
}

impl IdentityKey for VolumeMount {
    fn identity_key(&self) -> &str {
        &self.mount_path
    }
}

impl IdentityKey for EnvVar {
    fn identity_key(&self) -> &str {
        &self.name
    }
}

/// Plan the operations that merge `desired` into `existing` at `base_path`.
///
/// Operations are emitted in `desired` order and must be applied in sequence:
/// - an empty target gets one `add` of the whole single-element array first,
/// - an element whose key already exists is replaced at its index,
/// - anything else is appended with `/-`.
///
/// The key layout of the target array is tracked as operations are planned,
/// so a later element sharing a key with an earlier appended one replaces it
/// at the index it was appended to.
pub fn plan_merge<T>(
    existing: &[T],
    desired: &[T],
    base_path: &PointerBuf,
) -> InjectionResult<Vec<PatchOperation>>
where
    T: IdentityKey + Serialize,
{
    let mut keys: Vec<&str> = existing.iter().map(IdentityKey::identity_key).collect();
    let mut ops = Vec::with_capacity(desired.len());

    for element in desired {
        let key = element.identity_key();

        if keys.is_empty() {
            debug!(path = %base_path, key, "Seeding empty list");
            ops.push(PatchOperation::Add(AddOperation {
                path: base_path.clone(),
                value: serde_json::to_value([element])?,
            }));
            keys.push(key);
            continue;
        }

        let value = serde_json::to_value(element)?;
        let mut path = base_path.clone();

        if let Some(index) = keys.iter().position(|existing_key| *existing_key == key) {
            path.push_back(index.to_string().as_str());
            debug!(path = %path, key, "Replacing existing entry");
            ops.push(PatchOperation::Replace(ReplaceOperation { path, value }));
        } else {
            path.push_back("-");
            debug!(path = %path, key, "Appending entry");
            ops.push(PatchOperation::Add(AddOperation { path, value }));
            // Later duplicates replace this entry instead of matching only the original list
            keys.push(key);
        }
    }

    Ok(ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(name: &str, value: &str) -> EnvVar {
        EnvVar {
            name: name.to_string(),
            value: Some(value.to_string()),
            ..EnvVar::default()
        }
    }

    fn env_path() -> PointerBuf {
        PointerBuf::from_tokens(["spec", "containers", "0", "env"])
    }

    fn as_json(ops: &[PatchOperation]) -> serde_json::Value {
        serde_json::to_value(ops).unwrap()
    }

    #[test]
    fn test_empty_target_seeds_whole_array_then_appends() {
        let desired = vec![env("A", "1"), env("B", "2"), env("C", "3")];
        let ops = plan_merge(&[], &desired, &env_path()).unwrap();

        assert_eq!(
            as_json(&ops),
            json!([
                {"op": "add", "path": "/spec/containers/0/env", "value": [{"name": "A", "value": "1"}]},
                {"op": "add", "path": "/spec/containers/0/env/-", "value": {"name": "B", "value": "2"}},
                {"op": "add", "path": "/spec/containers/0/env/-", "value": {"name": "C", "value": "3"}},
            ])
        );
    }

    #[test]
    fn test_matching_keys_are_replaced_in_place() {
        let existing = vec![env("KEEP", "x"), env("B", "old"), env("A", "old")];
        let desired = vec![env("A", "new"), env("B", "new")];
        let ops = plan_merge(&existing, &desired, &env_path()).unwrap();

        assert_eq!(
            as_json(&ops),
            json!([
                {"op": "replace", "path": "/spec/containers/0/env/2", "value": {"name": "A", "value": "new"}},
                {"op": "replace", "path": "/spec/containers/0/env/1", "value": {"name": "B", "value": "new"}},
            ])
        );
    }

    #[test]
    fn test_non_empty_target_appends_unknown_keys() {
        let existing = vec![env("EXAMPLE_VAR", "test")];
        let desired = vec![env("A", "1"), env("EXAMPLE_VAR", "override")];
        let ops = plan_merge(&existing, &desired, &env_path()).unwrap();

        assert_eq!(
            as_json(&ops),
            json!([
                {"op": "add", "path": "/spec/containers/0/env/-", "value": {"name": "A", "value": "1"}},
                {"op": "replace", "path": "/spec/containers/0/env/0", "value": {"name": "EXAMPLE_VAR", "value": "override"}},
            ])
        );
    }

    #[test]
    fn test_first_match_wins_for_duplicate_existing_keys() {
        let existing = vec![env("A", "1"), env("A", "2")];
        let ops = plan_merge(&existing, &[env("A", "3")], &env_path()).unwrap();

        assert_eq!(
            as_json(&ops),
            json!([{"op": "replace", "path": "/spec/containers/0/env/0", "value": {"name": "A", "value": "3"}}])
        );
    }

    #[test]
    fn test_repeated_desired_key_targets_appended_index() {
        let existing = vec![env("KEEP", "x")];
        let desired = vec![env("A", "1"), env("A", "2")];
        let ops = plan_merge(&existing, &desired, &env_path()).unwrap();

        assert_eq!(
            as_json(&ops),
            json!([
                {"op": "add", "path": "/spec/containers/0/env/-", "value": {"name": "A", "value": "1"}},
                {"op": "replace", "path": "/spec/containers/0/env/1", "value": {"name": "A", "value": "2"}},
            ])
        );
    }

    #[test]
    fn test_repeated_desired_key_after_seed_replaces_seed() {
        let desired = vec![env("A", "1"), env("A", "2")];
        let ops = plan_merge(&[], &desired, &env_path()).unwrap();

        assert_eq!(
            as_json(&ops),
            json!([
                {"op": "add", "path": "/spec/containers/0/env", "value": [{"name": "A", "value": "1"}]},
                {"op": "replace", "path": "/spec/containers/0/env/0", "value": {"name": "A", "value": "2"}},
            ])
        );
    }

    #[test]
    fn test_volume_mounts_match_on_mount_path() {
        let existing = vec![VolumeMount {
            name: "other-name".to_string(),
            mount_path: "/opt/contrast".to_string(),
            ..VolumeMount::default()
        }];
        let desired = vec![VolumeMount {
            name: "contrast-agent-injector".to_string(),
            mount_path: "/opt/contrast".to_string(),
            ..VolumeMount::default()
        }];
        let path = PointerBuf::from_tokens(["spec", "containers", "0", "volumeMounts"]);
        let ops = plan_merge(&existing, &desired, &path).unwrap();

        assert_eq!(ops.len(), 1);
        let PatchOperation::Replace(op) = &ops[0] else {
            panic!("expected replace, got {:?}", ops[0]);
        };
        assert_eq!(op.path.to_string(), "/spec/containers/0/volumeMounts/0");
    }

    #[test]
    fn test_no_desired_elements_plans_nothing() {
        let existing = vec![env("A", "1")];
        assert!(plan_merge(&existing, &[], &env_path()).unwrap().is_empty());
        assert!(plan_merge::<EnvVar>(&[], &[], &env_path()).unwrap().is_empty());
    }
}
