use super::{is_placeholder, EnvVarSpec};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Merge remote variables, code-detected names and fresh user values.
///
/// For each remote variable still used by the code, the value is chosen as:
///
/// 1. topic variables take the fresh user value,
/// 2. placeholder or empty values are replaced by a fresh value when one exists,
/// 3. otherwise the remote value wins unless `force` is set.
///
/// Remote variables the code no longer reads are dropped. Names read by the
/// code but unknown remotely become optional FreeText variables defaulted to
/// the user value, if any.
pub fn reconcile(
    existing: &[EnvVarSpec],
    detected: &BTreeSet<String>,
    user_values: &BTreeMap<String, String>,
    force: bool,
) -> Vec<EnvVarSpec> {
    let mut result = Vec::with_capacity(detected.len());

    for var in existing {
        if !detected.contains(&var.name) {
            debug!("Dropping variable '{}': no longer read by the code", var.name);
            continue;
        }
        if result.iter().any(|v: &EnvVarSpec| v.name == var.name) {
            continue;
        }

        let fresh = user_values.get(&var.name).filter(|v| !v.trim().is_empty());
        let remote = var.default_value.as_ref();
        let remote_is_stale = remote.map_or(true, |v| v.trim().is_empty() || is_placeholder(v));

        let value = match (fresh, remote) {
            (Some(fresh), _) if var.input_type.is_topic() => Some(fresh.clone()),
            (Some(fresh), _) if remote_is_stale => Some(fresh.clone()),
            (Some(fresh), Some(_)) if force => Some(fresh.clone()),
            (_, remote) => remote.cloned(),
        };

        result.push(EnvVarSpec {
            default_value: value,
            ..var.clone()
        });
    }

    for name in detected {
        if result.iter().any(|v| &v.name == name) {
            continue;
        }
        let mut var = EnvVarSpec::free_text(name.clone());
        var.default_value = user_values.get(name).cloned();
        result.push(var);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env_vars::InputType;

    fn var(name: &str, input_type: InputType, value: Option<&str>) -> EnvVarSpec {
        EnvVarSpec {
            name: name.to_string(),
            input_type,
            description: None,
            default_value: value.map(str::to_string),
            required: true,
        }
    }

    fn names(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn value_of<'a>(vars: &'a [EnvVarSpec], name: &str) -> Option<&'a str> {
        vars.iter()
            .find(|v| v.name == name)
            .and_then(|v| v.default_value.as_deref())
    }

    #[test]
    fn test_placeholder_replaced_by_fresh_value() {
        let existing = vec![var("PG_HOST", InputType::FreeText, Some("{{PG_HOST}}"))];
        let result = reconcile(
            &existing,
            &names(&["PG_HOST"]),
            &values(&[("PG_HOST", "db.internal")]),
            false,
        );
        assert_eq!(value_of(&result, "PG_HOST"), Some("db.internal"));
    }

    #[test]
    fn test_concrete_remote_value_kept_without_force() {
        let existing = vec![var("PG_HOST", InputType::FreeText, Some("prod.internal"))];
        let detected = names(&["PG_HOST"]);
        let fresh = values(&[("PG_HOST", "db.internal")]);

        let kept = reconcile(&existing, &detected, &fresh, false);
        assert_eq!(value_of(&kept, "PG_HOST"), Some("prod.internal"));

        let forced = reconcile(&existing, &detected, &fresh, true);
        assert_eq!(value_of(&forced, "PG_HOST"), Some("db.internal"));
    }

    #[test]
    fn test_topic_always_takes_user_value() {
        let existing = vec![var("input", InputType::InputTopic, Some("old-topic"))];
        let result = reconcile(
            &existing,
            &names(&["input"]),
            &values(&[("input", "new-topic")]),
            false,
        );
        assert_eq!(value_of(&result, "input"), Some("new-topic"));
    }

    #[test]
    fn test_remote_variables_not_in_code_are_pruned() {
        let existing = vec![
            var("PG_HOST", InputType::FreeText, Some("h")),
            var("LEGACY_FLAG", InputType::FreeText, Some("1")),
            var("OLD_SECRET", InputType::Secret, Some("old-secret")),
        ];
        let result = reconcile(&existing, &names(&["PG_HOST"]), &BTreeMap::new(), true);
        let kept: Vec<_> = result.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(kept, vec!["PG_HOST"]);
    }

    #[test]
    fn test_detected_unknown_vars_added_as_optional_free_text() {
        let result = reconcile(
            &[],
            &names(&["BATCH_SIZE", "PG_TABLE"]),
            &values(&[("PG_TABLE", "events")]),
            false,
        );
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|v| v.input_type == InputType::FreeText && !v.required));
        assert_eq!(value_of(&result, "BATCH_SIZE"), None);
        assert_eq!(value_of(&result, "PG_TABLE"), Some("events"));
    }

    #[test]
    fn test_remote_order_and_metadata_preserved() {
        let mut secret = var("PG_PASSWORD", InputType::Secret, Some("pg-password"));
        secret.description = Some("Database password".to_string());
        let existing = vec![secret, var("PG_HOST", InputType::FreeText, None)];
        let result = reconcile(
            &existing,
            &names(&["PG_HOST", "PG_PASSWORD"]),
            &values(&[("PG_HOST", "h")]),
            false,
        );
        assert_eq!(result[0].name, "PG_PASSWORD");
        assert_eq!(result[0].description.as_deref(), Some("Database password"));
        assert_eq!(result[0].input_type, InputType::Secret);
        assert_eq!(value_of(&result, "PG_HOST"), Some("h"));
    }
}
