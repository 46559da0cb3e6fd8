//! End-to-end wizard runs against scripted collaborators

use quixforge::ai::CodeGenerator;
use quixforge::cache::{Artifact, ArtifactKind, CacheKey, CacheStore};
use quixforge::config::{ForgeConfig, SandboxSettings};
use quixforge::context::WorkflowType;
use quixforge::env_vars::load_manifest;
use quixforge::interaction::UserInteraction;
use quixforge::platform::{PlatformApi, SessionManager, VariableSet};
use quixforge::sandbox::{SandboxOrchestrator, TestMode, TestSubject};
use quixforge::testing::{MockGenerator, MockPlatform, MockRun, MockSecretStore, MockUserInteraction};
use quixforge::workflow::{WorkflowOptions, WorkflowRunner};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const SOURCE_CODE: &str = r#"import os
import requests
from quixstreams import Application

city = os.environ.get("WEATHER_CITY")
topic = os.environ["output"]
requests.get(f"https://weather.example/{city}")
"#;

const FIXED_CODE: &str = r#"import os
import requests
from quixstreams import Application

city = os.environ.get("WEATHER_CITY", "Berlin")
topic = os.environ["output"]
requests.get(f"https://weather.example/{city}", timeout=10)
"#;

const PROBE_CODE: &str = "import requests\nprint('CONNECTION_TEST_PASSED')\n";

const FAILING_LOGS: &str =
    "Traceback (most recent call last):\n  File \"main.py\", line 7\nConnectionError: timed out";

fn config(dir: &TempDir) -> ForgeConfig {
    let mut config = ForgeConfig {
        working_dir: dir.path().to_path_buf(),
        ..ForgeConfig::default()
    };
    config.sandbox.poll_interval = Duration::from_millis(1);
    config.sandbox.poll_attempts = 3;
    config
}

#[tokio::test]
async fn test_source_wizard_applies_claude_fix_and_deploys() {
    let dir = TempDir::new().unwrap();
    let platform = Arc::new(
        MockPlatform::new()
            .with_topics(&["raw-weather"])
            .with_runs(vec![
                MockRun::Logs("CONNECTION_TEST_PASSED".to_string()),
                MockRun::Logs(FAILING_LOGS.to_string()),
            ])
            .with_default_logs("Successfully produced 10 messages"),
    );
    let generator = Arc::new(
        MockGenerator::new()
            .with_generated(&[SOURCE_CODE, PROBE_CODE])
            .with_fixes(&[Some(FIXED_CODE)]),
    );
    let ui = Arc::new(
        MockUserInteraction::new()
            // topic, template, then "Let Claude fix the code"
            .with_choices(&[0, 0, 0])
            .with_text(&["poll the weather api", "OpenWeather", "WEATHER_CITY", "", "Berlin"])
            // accept the generated code, then deploy
            .with_yes_no(&[true, true]),
    );

    let runner = WorkflowRunner::new(
        config(&dir),
        WorkflowOptions {
            app_name: Some("Weather Source".to_string()),
            ..WorkflowOptions::default()
        },
        platform.clone() as Arc<dyn PlatformApi>,
        generator.clone() as Arc<dyn CodeGenerator>,
        Arc::new(MockSecretStore::new()),
        ui.clone() as Arc<dyn UserInteraction>,
    );
    let (outcome, ctx) = runner.run(WorkflowType::Source).await.unwrap();

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(ui.remaining_answers(), 0);
    assert_eq!(
        platform.entry_points(),
        vec!["connection_test.py", "main.py", "main.py"]
    );

    let debug_requests = generator.debug_requests();
    assert_eq!(debug_requests.len(), 1);
    assert!(debug_requests[0].logs.contains("ConnectionError"));
    assert_eq!(debug_requests[0].code, SOURCE_CODE);

    // The fixed code is what gets uploaded, cached and deployed
    assert_eq!(ctx.code_generation.code.as_deref(), Some(FIXED_CODE));
    assert_eq!(platform.app_file("app-1", "main.py").as_deref(), Some(FIXED_CODE));
    let build = dir.path().join("build/source/weather-source");
    assert_eq!(fs::read_to_string(build.join("main.py")).unwrap(), FIXED_CODE);

    let cache = CacheStore::new(dir.path());
    let key = CacheKey::new(WorkflowType::Source, "weather-source");
    match cache.check(ArtifactKind::Code, &key) {
        Some(Artifact::Code { code, dependencies }) => {
            assert_eq!(code, FIXED_CODE);
            assert_eq!(dependencies, vec!["quixstreams", "requests"]);
        }
        other => panic!("expected cached code, got {other:?}"),
    }

    let manifest = load_manifest(&build.join("app.yaml")).unwrap();
    assert_eq!(manifest.get("output").unwrap().default_value.as_deref(), Some("raw-weather"));
    assert_eq!(manifest.get("WEATHER_CITY").unwrap().default_value.as_deref(), Some("Berlin"));

    let deployments = platform.deployments();
    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0].name, "weather-source");
    assert_eq!(deployments[0].variables["WEATHER_CITY"], "Berlin");
    assert_eq!(platform.sessions_stopped(), 1);
}

#[tokio::test]
async fn test_declining_deployment_still_succeeds() {
    let dir = TempDir::new().unwrap();
    let platform = Arc::new(
        MockPlatform::new()
            .with_topics(&["raw-weather"])
            .with_default_logs("CONNECTION_TEST_PASSED"),
    );
    let ui = Arc::new(
        MockUserInteraction::new()
            .with_choices(&[0, 0])
            .with_text(&["poll the weather api", "OpenWeather", "WEATHER_CITY", "", "Berlin"])
            .with_yes_no(&[true, false]),
    );

    let runner = WorkflowRunner::new(
        config(&dir),
        WorkflowOptions {
            app_name: Some("Weather Source".to_string()),
            ..WorkflowOptions::default()
        },
        platform.clone() as Arc<dyn PlatformApi>,
        Arc::new(MockGenerator::new().with_generated(&[SOURCE_CODE, PROBE_CODE])),
        Arc::new(MockSecretStore::new()),
        ui.clone() as Arc<dyn UserInteraction>,
    );
    let (outcome, ctx) = runner.run(WorkflowType::Source).await.unwrap();

    assert!(outcome.success);
    assert!(ctx.code_generation.sandbox_test_passed);
    assert!(platform.deployments().is_empty());
    assert_eq!(platform.app_file("app-1", "main.py").as_deref(), Some(SOURCE_CODE));
}

#[tokio::test]
async fn test_always_failing_sandbox_runs_exactly_max_retries() {
    let dir = TempDir::new().unwrap();
    let platform = Arc::new(MockPlatform::new().with_default_logs(FAILING_LOGS));
    let generator = MockGenerator::new().with_fixes(&[
        Some("attempt_2()\n"),
        Some("attempt_3()\n"),
        Some("attempt_4()\n"),
    ]);
    // Switch to auto-debug on the first failure
    let ui = MockUserInteraction::new().with_choices(&[2]);
    let settings = SandboxSettings {
        max_retries: 4,
        run_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(1),
        poll_attempts: 3,
    };
    let mut session = SessionManager::new(
        platform.clone() as Arc<dyn PlatformApi>,
        "app-1",
        Duration::from_millis(1),
        3,
    );
    let mut subject = TestSubject {
        mode: TestMode::Sandbox,
        code: "attempt_1()\n".to_string(),
        dependencies: vec!["quixstreams".to_string()],
        manifest: None,
        variables: VariableSet::default(),
        app_dir: dir.path().to_path_buf(),
        goal: "produce weather readings".to_string(),
    };

    let outcome = SandboxOrchestrator::new(&mut session, &generator, &ui, &settings)
        .run(&mut subject)
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(platform.run_count(), 4);
    assert_eq!(generator.debug_requests().len(), 3);
    assert_eq!(subject.code, "attempt_4()\n");
    assert_eq!(fs::read_to_string(dir.path().join("main.py")).unwrap(), "attempt_4()\n");
}
