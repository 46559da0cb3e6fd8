use super::debug::{prompt_action, request_fix};
use super::{DebugAction, PhaseOutcome, RunStatus, SandboxRunResult, TestMode};
use crate::ai::{CodeGenerator, DebugRequest};
use crate::config::SandboxSettings;
use crate::error::{ErrorCode, ForgeError, ForgeResult};
use crate::interaction::{preview_lines, UserInteraction};
use crate::platform::{SessionManager, VariableSet};
use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Code under test plus everything uploaded next to it
#[derive(Debug, Clone)]
pub struct TestSubject {
    pub mode: TestMode,
    pub code: String,
    pub dependencies: Vec<String>,
    /// Rendered `app.yaml`, uploaded when present
    pub manifest: Option<String>,
    pub variables: VariableSet,
    /// Local application directory; fixes are mirrored here
    pub app_dir: PathBuf,
    /// What the code is supposed to do, for the generator
    pub goal: String,
}

impl TestSubject {
    fn local_path(&self) -> PathBuf {
        self.app_dir.join(self.mode.entry_point())
    }
}

/// Drives the configure, run, classify and debug loop for one phase
pub struct SandboxOrchestrator<'a> {
    session: &'a mut SessionManager,
    generator: &'a dyn CodeGenerator,
    ui: &'a dyn UserInteraction,
    max_retries: u32,
    run_timeout: Duration,
    /// Requirements installed in the current session
    installed: Option<Vec<String>>,
}

impl<'a> SandboxOrchestrator<'a> {
    pub fn new(
        session: &'a mut SessionManager,
        generator: &'a dyn CodeGenerator,
        ui: &'a dyn UserInteraction,
        settings: &SandboxSettings,
    ) -> Self {
        Self {
            session,
            generator,
            ui,
            max_retries: settings.max_retries.max(1),
            run_timeout: settings.run_timeout,
            installed: None,
        }
    }

    /// Test `subject` until it passes, the user gives up, or the run ceiling
    /// is reached. Fixes are applied to `subject.code`.
    pub async fn run(&mut self, subject: &mut TestSubject) -> Result<PhaseOutcome> {
        let label = subject.mode.label();
        let mut runs = 0u32;
        let mut auto_debug = false;
        let mut needs_upload = true;
        let mut edited_in_ide = false;

        loop {
            runs += 1;
            self.ui.display_progress(&format!(
                "Running {label} (attempt {runs}/{})",
                self.max_retries
            ));
            let result = match self.attempt(subject, &mut needs_upload).await {
                Ok(result) => result,
                Err(e) if ends_phase(&e) => {
                    error!("{} cannot continue: {}", label, e);
                    self.ui.display_error(&e.user_message());
                    return Ok(PhaseOutcome::failure(format!(
                        "The {label} could not be run: {}",
                        e.user_message()
                    )));
                }
                Err(e) => {
                    warn!("{} attempt {} failed on the platform: {}", label, runs, e);
                    self.ui.display_warning(&e.user_message());
                    SandboxRunResult::platform_error(e.user_message())
                }
            };
            debug!(
                "{} run {} classified as {:?} (timeout: {})",
                label, runs, result.status, result.is_timeout
            );

            if !result.logs.trim().is_empty() {
                self.ui
                    .display_block(&format!("{label} logs"), &preview_lines(&result.logs, 40));
            }

            let passed = match (result.is_timeout, result.status) {
                (false, RunStatus::Success) => true,
                (false, RunStatus::Uncertain) => {
                    self.ui
                        .prompt_yes_no(&format!("Did the {label} behave as expected?"))
                        .await?
                }
                (true, _) => {
                    self.ui.display_warning(&format!(
                        "The {label} timed out after {}s",
                        self.run_timeout.as_secs_f32()
                    ));
                    false
                }
                (false, RunStatus::Error) => false,
            };

            if passed {
                if edited_in_ide {
                    self.sync_from_platform(subject).await;
                }
                self.ui.display_success(&format!("The {label} passed"));
                info!("{} passed after {} run(s)", label, runs);
                return Ok(PhaseOutcome::success(format!(
                    "The {label} passed after {runs} run(s)"
                )));
            }

            if runs >= self.max_retries {
                warn!("{} still failing after {} runs", label, runs);
                return Ok(PhaseOutcome::failure(format!(
                    "The {label} still failed after {runs} runs"
                )));
            }

            let logs = result.logs;
            let mut action = if auto_debug {
                request_fix(self.ui, self.generator, debug_request(subject, &logs, None)).await
            } else {
                prompt_action(self.ui, self.generator, debug_request(subject, &logs, None)).await?
            };

            let reupload = loop {
                match action {
                    DebugAction::ClaudeFixed(code) => {
                        self.apply_fix(subject, code);
                        break true;
                    }
                    DebugAction::ManualFeedback(feedback) => {
                        let feedback = (!feedback.is_empty()).then_some(feedback);
                        action = request_fix(
                            self.ui,
                            self.generator,
                            debug_request(subject, &logs, feedback),
                        )
                        .await;
                    }
                    DebugAction::AutoDebug => {
                        info!("Entering auto-debug for {}", label);
                        auto_debug = true;
                        // The failed run's logs are reused rather than running again
                        action =
                            request_fix(self.ui, self.generator, debug_request(subject, &logs, None))
                                .await;
                    }
                    DebugAction::AutoDebugFailed => {
                        auto_debug = false;
                        self.ui
                            .display_warning("Claude could not fix the code; choose how to continue");
                        action = prompt_action(
                            self.ui,
                            self.generator,
                            debug_request(subject, &logs, None),
                        )
                        .await?;
                    }
                    DebugAction::ManualFix => {
                        self.manual_fix(subject).await?;
                        break true;
                    }
                    DebugAction::FixedInIde => {
                        edited_in_ide = true;
                        break false;
                    }
                    DebugAction::Abort => {
                        return Ok(PhaseOutcome::failure(format!("The {label} was aborted")));
                    }
                }
            };
            needs_upload |= reupload;
        }
    }

    /// One configure-and-run cycle. `needs_upload` is cleared once the
    /// files are in place, even if the run itself then fails.
    async fn attempt(
        &mut self,
        subject: &TestSubject,
        needs_upload: &mut bool,
    ) -> ForgeResult<SandboxRunResult> {
        if *needs_upload {
            self.configure(subject).await?;
            *needs_upload = false;
        }
        self.execute(subject).await
    }

    /// Upload code and manifest files, set variables, install requirements
    async fn configure(&mut self, subject: &TestSubject) -> ForgeResult<()> {
        let session_before = self.session.ensure_session().await?;
        self.upload(subject).await?;

        // Files written before a recovery went to the old session
        if self.session.session_id() != Some(session_before.as_str()) {
            debug!("Session replaced during upload; uploading again");
            self.installed = None;
            self.upload(subject).await?;
        }
        Ok(())
    }

    async fn upload(&mut self, subject: &TestSubject) -> ForgeResult<()> {
        let mut requirements = subject.dependencies.join("\n");
        requirements.push('\n');

        let mut files = vec![
            (subject.mode.entry_point(), subject.code.as_str()),
            ("requirements.txt", requirements.as_str()),
        ];
        if let Some(manifest) = &subject.manifest {
            files.push(("app.yaml", manifest.as_str()));
        }

        for (path, content) in files {
            self.session
                .call(&format!("upload of {path}"), move |api, session_id| async move {
                    api.write_session_file(&session_id, path, content).await
                })
                .await?;
        }

        let variables = &subject.variables;
        self.session
            .call("variable update", move |api, session_id| async move {
                api.set_session_variables(&session_id, variables).await
            })
            .await?;

        if self.installed.as_ref() != Some(&subject.dependencies) {
            self.ui.display_progress("Installing dependencies...");
            let output = self
                .session
                .call("dependency install", |api, session_id| async move {
                    api.install_dependencies(&session_id).await
                })
                .await?;
            debug!("Install output:\n{}", output);
            self.installed = Some(subject.dependencies.clone());
        }
        Ok(())
    }

    /// Run the entry point once. A lost session is recreated, reconfigured
    /// and the run retried once.
    async fn execute(&mut self, subject: &TestSubject) -> ForgeResult<SandboxRunResult> {
        let entry_point = subject.mode.entry_point();
        match self.run_once(entry_point).await {
            Err(e) if e.is_session_not_found() => {
                warn!("Session lost while running {}; recreating it", entry_point);
                self.session.recover().await?;
                self.installed = None;
                self.configure(subject).await?;
                self.run_once(entry_point).await
            }
            result => result,
        }
    }

    async fn run_once(&mut self, entry_point: &str) -> ForgeResult<SandboxRunResult> {
        let session_id = self.session.ensure_session().await?;
        let api = self.session.api();
        match tokio::time::timeout(self.run_timeout, api.run_script(&session_id, entry_point)).await
        {
            Ok(Ok(logs)) => Ok(SandboxRunResult::from_logs(logs)),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(SandboxRunResult::timed_out(format!(
                "Execution of {entry_point} timed out after {}s",
                self.run_timeout.as_secs_f32()
            ))),
        }
    }

    fn apply_fix(&self, subject: &mut TestSubject, code: String) {
        self.ui.display_block("Proposed fix", &preview_lines(&code, 25));
        subject.code = code;
        mirror_locally(subject);
    }

    async fn manual_fix(&self, subject: &mut TestSubject) -> Result<()> {
        mirror_locally(subject);
        let path = subject.local_path();
        self.ui
            .display_info(&format!("Edit {} and save your changes", path.display()));
        self.ui
            .prompt_text("Press Enter to run the test again", Some(""))
            .await?;

        match fs::read_to_string(&path) {
            Ok(code) => subject.code = code,
            Err(e) => {
                warn!("Could not read {}: {}", path.display(), e);
                self.ui.display_warning(&format!(
                    "Could not read {}; re-running the previous code",
                    path.display()
                ));
            }
        }
        Ok(())
    }

    /// Pull code edited in the IDE back into `subject`
    async fn sync_from_platform(&self, subject: &mut TestSubject) {
        let api = self.session.api();
        match api
            .download_file(self.session.app_id(), subject.mode.entry_point())
            .await
        {
            Ok(Some(code)) => {
                subject.code = code;
                mirror_locally(subject);
            }
            Ok(None) => debug!("No remote copy of {}", subject.mode.entry_point()),
            Err(e) => warn!("Could not fetch code edited in the IDE: {}", e),
        }
    }
}

fn debug_request(subject: &TestSubject, logs: &str, feedback: Option<String>) -> DebugRequest {
    DebugRequest {
        code: subject.code.clone(),
        logs: logs.to_string(),
        feedback,
        goal: subject.goal.clone(),
        app_dir: subject.app_dir.clone(),
    }
}

/// Errors that no fix or rerun can clear
fn ends_phase(err: &ForgeError) -> bool {
    matches!(
        err,
        ForgeError::Config { .. }
            | ForgeError::Platform {
                code: ErrorCode::PLATFORM_UNAUTHORIZED,
                ..
            }
    )
}

/// Keep the local application directory in step with the code under test
fn mirror_locally(subject: &TestSubject) {
    let path = subject.local_path();
    if let Err(e) = fs::create_dir_all(&subject.app_dir).and_then(|_| fs::write(&path, &subject.code))
    {
        warn!("Could not write {}: {}", path.display(), e);
    }
}
