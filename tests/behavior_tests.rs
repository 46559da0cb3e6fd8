//! Behavior checks for the pure helpers: dependency inference, variable
//! reconciliation, credential mapping and the artifact cache

use quixforge::cache::{Artifact, CacheKey, CacheStore};
use quixforge::context::WorkflowType;
use quixforge::credentials::{map_to_standard, normalize_field_name};
use quixforge::dependencies::extract_dependencies;
use quixforge::env_vars::{reconcile, EnvVarSpec, InputType};
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};
use tempfile::TempDir;

fn var(name: &str, input_type: InputType, value: Option<&str>) -> EnvVarSpec {
    EnvVarSpec {
        name: name.to_string(),
        input_type,
        description: None,
        default_value: value.map(str::to_string),
        required: true,
    }
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_third_party_imports_are_sorted_with_framework() {
    let code = "import requests\nimport pandas as pd\nimport os, json\n";
    assert_eq!(
        extract_dependencies(code),
        vec!["pandas", "quixstreams", "requests"]
    );
}

#[test]
fn test_stdlib_only_code_needs_only_framework() {
    let code = "import os\nimport sys\nfrom datetime import datetime\nimport logging.handlers\n";
    assert_eq!(extract_dependencies(code), vec!["quixstreams"]);
}

#[test]
fn test_dependency_block_overrides_imports() {
    let code = "# DEPENDENCIES:\n# pip install foo==1.2\n# END_DEPENDENCIES\nimport requests\nimport numpy\n";
    assert_eq!(extract_dependencies(code), vec!["foo==1.2"]);
}

#[test]
fn test_placeholder_is_replaced_by_fresh_value() {
    let merged = reconcile(
        &[var("X", InputType::FreeText, Some("{{placeholder}}"))],
        &set(&["X"]),
        &values(&[("X", "val")]),
        false,
    );
    assert_eq!(merged[0].default_value.as_deref(), Some("val"));
}

#[test]
fn test_existing_value_kept_unless_forced() {
    let existing = [var("X", InputType::FreeText, Some("remote"))];
    let fresh = values(&[("X", "local")]);

    let kept = reconcile(&existing, &set(&["X"]), &fresh, false);
    assert_eq!(kept[0].default_value.as_deref(), Some("remote"));

    let forced = reconcile(&existing, &set(&["X"]), &fresh, true);
    assert_eq!(forced[0].default_value.as_deref(), Some("local"));
}

#[test]
fn test_topic_variable_always_takes_fresh_value() {
    let merged = reconcile(
        &[var("input", InputType::InputTopic, Some("old-topic"))],
        &set(&["input"]),
        &values(&[("input", "new-topic")]),
        false,
    );
    assert_eq!(merged[0].default_value.as_deref(), Some("new-topic"));
}

/// Variables the code no longer reads are dropped, even ones a user added by
/// hand and reads through a computed key
#[test]
fn test_unread_remote_variables_are_pruned() {
    let existing = [
        var("PG_HOST", InputType::FreeText, Some("db.local")),
        var("MANUAL_SETTING", InputType::FreeText, Some("keep me?")),
    ];
    let merged = reconcile(&existing, &set(&["PG_HOST"]), &BTreeMap::new(), false);

    let names: Vec<_> = merged.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["PG_HOST"]);
}

#[test]
fn test_host_spellings_share_canonical_name() {
    assert_eq!(normalize_field_name("Host Name"), "host");
    assert_eq!(normalize_field_name("hostname"), "host");
}

#[test]
fn test_map_to_standard_is_idempotent() {
    let credentials: IndexMap<String, String> = [
        ("Host Name", "db.example.com"),
        ("server", "backup.example.com"),
        ("DB_PASSWORD", "secret"),
        ("sslmode", "require"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    let once = map_to_standard(&credentials);
    assert_eq!(map_to_standard(&once), once);
    assert_eq!(once["host"], "db.example.com");
    assert_eq!(once["password"], "secret");
}

#[test]
fn test_every_artifact_kind_round_trips() {
    let dir = TempDir::new().unwrap();
    let app_dir = dir.path().join("app");
    std::fs::create_dir_all(&app_dir).unwrap();
    std::fs::write(app_dir.join("main.py"), "print('hi')\n").unwrap();

    let cache = CacheStore::new(dir.path().join("cache"));
    let key = CacheKey::new(WorkflowType::Source, "weather-source");
    let artifacts = [
        Artifact::UserPrompt {
            prompt: "poll the weather api".to_string(),
        },
        Artifact::Template {
            template: "Polling source".to_string(),
            technology: Some("OpenWeather".to_string()),
        },
        Artifact::EnvVars {
            values: values(&[("WEATHER_CITY", "Berlin")]),
        },
        Artifact::Code {
            code: "print('hi')\n".to_string(),
            dependencies: vec!["quixstreams".to_string()],
        },
        Artifact::Schema {
            sample: r#"{"temp": 21.5}"#.to_string(),
        },
    ];

    for artifact in &artifacts {
        assert!(cache.save(&key, artifact));
        assert_eq!(cache.check(artifact.kind(), &key).as_ref(), Some(artifact));
    }

    assert!(cache.save(&key, &Artifact::AppDirectory { path: app_dir }));
    match cache.check(quixforge::cache::ArtifactKind::AppDirectory, &key) {
        Some(Artifact::AppDirectory { path }) => {
            assert_eq!(std::fs::read_to_string(path.join("main.py")).unwrap(), "print('hi')\n");
        }
        other => panic!("expected a cached app directory, got {other:?}"),
    }
}
