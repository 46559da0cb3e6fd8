//! Integration tests for the CLI interface
//!
//! Covers the commands that work without platform credentials

use assert_cmd::Command;
use predicates::prelude::*;
use quixforge::cache::{Artifact, CacheKey, CacheStore};
use quixforge::context::WorkflowType;
use std::fs;
use tempfile::TempDir;

fn quixforge(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("quixforge").unwrap();
    cmd.current_dir(dir.path())
        .arg("-C")
        .arg(dir.path())
        .env("QUIXFORGE_WORKING_DIR", dir.path().join("working_files"))
        .env_remove("QUIXFORGE_LOG_LEVEL")
        .env_remove("QUIXFORGE_MAX_RETRIES")
        .env_remove("QUIXFORGE_RUN_TIMEOUT");
    cmd
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = Command::cargo_bin("quixforge").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("sink"))
        .stdout(predicate::str::contains("update-requirements"));
}

#[test]
fn test_sink_help_lists_options() {
    let mut cmd = Command::cargo_bin("quixforge").unwrap();
    cmd.args(["sink", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--force-env"))
        .stdout(predicate::str::contains("--max-retries"));
}

#[test]
fn test_map_credentials_prints_canonical_names() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("creds.json");
    fs::write(
        &file,
        r#"{"Host Name": "db.example.com", "Port Number": "5432", "sslmode": "require"}"#,
    )
    .unwrap();

    quixforge(&dir)
        .arg("map-credentials")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""host": "db.example.com""#))
        .stdout(predicate::str::contains(r#""port": "5432""#))
        .stdout(predicate::str::contains(r#""sslmode": "require""#));
}

#[test]
fn test_map_credentials_earliest_synonym_claims_name() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("creds.json");
    fs::write(&file, r#"{"server": "primary", "hostname": "fallback"}"#).unwrap();

    quixforge(&dir)
        .arg("map-credentials")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""host": "primary""#))
        .stdout(predicate::str::contains(r#""hostname": "fallback""#));
}

#[test]
fn test_map_credentials_rejects_non_object() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("creds.json");
    fs::write(&file, "[1, 2, 3]").unwrap();

    quixforge(&dir)
        .arg("map-credentials")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a flat JSON object"));
}

#[test]
fn test_cache_list_and_clear() {
    let dir = TempDir::new().unwrap();
    let cache = CacheStore::new(dir.path().join("working_files"));
    let key = CacheKey::new(WorkflowType::Sink, "pg-sink");
    assert!(cache.save(
        &key,
        &Artifact::UserPrompt {
            prompt: "write to postgres".to_string(),
        },
    ));
    assert!(cache.save(
        &key,
        &Artifact::Code {
            code: "print('hi')\n".to_string(),
            dependencies: vec!["quixstreams".to_string()],
        },
    ));

    quixforge(&dir)
        .args(["cache", "list", "--workflow", "sink"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pg-sink"));

    quixforge(&dir)
        .args(["cache", "clear", "--workflow", "sink", "--app", "pg-sink"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 2 cached artifact(s)"));

    assert!(cache.list(WorkflowType::Sink).is_empty());
}

#[test]
fn test_cache_list_empty() {
    let dir = TempDir::new().unwrap();
    quixforge(&dir)
        .args(["cache", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No cached applications"));
}

#[test]
fn test_wizard_requires_token() {
    let dir = TempDir::new().unwrap();
    quixforge(&dir)
        .env_remove("QUIX_TOKEN")
        .env_remove("QUIX_PAT")
        .env_remove("QUIX_SDK_TOKEN")
        .args(["source", "--app", "demo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("QUIX_TOKEN"));
}
