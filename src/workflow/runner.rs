use super::deploy::DeployPhase;
use super::prompts::{connection_test_prompt, generation_prompt};
use super::WorkflowStep;
use crate::ai::{CodeGenerator, GenerationRequest};
use crate::cache::{Artifact, ArtifactKind, CacheDecision, CacheKey, CacheStore};
use crate::config::{ForgeConfig, SandboxSettings};
use crate::context::{slugify_app_name, WorkflowContext, WorkflowType};
use crate::credentials::canonical_field;
use crate::dependencies::{extract_dependencies, extract_dependencies_for_app, write_requirements};
use crate::env_vars::{
    collect_interactive, detect_vars, load_manifest, reconcile, save_manifest, split_by_input_type,
    AppManifest, EnvVarSpec, InputType,
};
use crate::error::ForgeError;
use crate::interaction::{preview_lines, UserInteraction};
use crate::platform::{PlatformApi, SessionManager};
use crate::sandbox::{PhaseOutcome, SandboxOrchestrator, TestMode, TestSubject};
use crate::secrets::SecretStore;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Command-line choices that shape one wizard run
#[derive(Debug, Clone, Default)]
pub struct WorkflowOptions {
    /// Skip the name prompt
    pub app_name: Option<String>,
    /// Prefer freshly entered variable values over values already in `app.yaml`
    pub force_env: bool,
    /// Override the configured sandbox run ceiling
    pub max_retries: Option<u32>,
}

/// Templates offered per workflow type
fn templates(workflow: WorkflowType) -> &'static [&'static str] {
    match workflow {
        WorkflowType::Source => &["Polling source", "Streaming source", "Change data capture source"],
        WorkflowType::Sink => &["Batching sink", "Per-message sink", "Upsert sink"],
    }
}

/// Canonical credential fields whose values belong in a workspace secret
const SECRET_FIELDS: &[&str] = &["password", "secret", "token", "api_key"];

fn spec_for_name(name: &str) -> EnvVarSpec {
    let input_type = match canonical_field(name) {
        Some(field) if SECRET_FIELDS.contains(&field) => InputType::Secret,
        _ => InputType::FreeText,
    };
    EnvVarSpec {
        name: name.to_string(),
        input_type,
        description: None,
        default_value: None,
        required: true,
    }
}

/// What the runner does after a step
#[derive(Debug)]
enum StepFlow {
    Next,
    Repeat,
    Finish(PhaseOutcome),
}

/// Mutable state of one run
struct RunState {
    ctx: WorkflowContext,
    manifest: AppManifest,
    session: Option<SessionManager>,
}

/// Drives the source and sink wizards
pub struct WorkflowRunner {
    config: ForgeConfig,
    options: WorkflowOptions,
    platform: Arc<dyn PlatformApi>,
    generator: Arc<dyn CodeGenerator>,
    secrets: Arc<dyn SecretStore>,
    ui: Arc<dyn UserInteraction>,
    cache: CacheStore,
}

impl WorkflowRunner {
    pub fn new(
        config: ForgeConfig,
        options: WorkflowOptions,
        platform: Arc<dyn PlatformApi>,
        generator: Arc<dyn CodeGenerator>,
        secrets: Arc<dyn SecretStore>,
        ui: Arc<dyn UserInteraction>,
    ) -> Self {
        let cache = CacheStore::new(config.working_dir.clone());
        Self {
            config,
            options,
            platform,
            generator,
            secrets,
            ui,
            cache,
        }
    }

    /// Run the wizard. Ctrl-C ends it with a failed outcome.
    pub async fn run(&self, workflow: WorkflowType) -> Result<(PhaseOutcome, WorkflowContext)> {
        let mut state = RunState {
            ctx: WorkflowContext::new(workflow),
            manifest: AppManifest::default(),
            session: None,
        };
        info!("Starting {} workflow", workflow);

        let result = tokio::select! {
            result = self.run_steps(&mut state) => result,
            () = wait_for_interrupt() => Err(ForgeError::Interrupted.into()),
        };

        if let Some(session) = state.session.as_mut() {
            session.shutdown().await;
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) if matches!(e.downcast_ref::<ForgeError>(), Some(ForgeError::Interrupted)) => {
                self.ui.display_warning("Workflow aborted");
                PhaseOutcome::failure("Workflow aborted by user")
            }
            Err(e) => return Err(e),
        };
        Ok((outcome, state.ctx))
    }

    async fn run_steps(&self, state: &mut RunState) -> Result<PhaseOutcome> {
        let steps = WorkflowStep::sequence(state.ctx.workflow_type);
        let mut index = 0;

        while index < steps.len() {
            let step = steps[index];
            debug!("Step {}/{}: {}", index + 1, steps.len(), step);

            match self.run_step(step, state).await {
                Ok(StepFlow::Next) => index += 1,
                Ok(StepFlow::Repeat) => {}
                Ok(StepFlow::Finish(outcome)) => return Ok(outcome),
                Err(e) if matches!(e.downcast_ref::<ForgeError>(), Some(ForgeError::NavigateBack)) => {
                    if index == 0 {
                        self.ui.display_info("Already at the first step");
                    } else {
                        index -= 1;
                        self.ui.display_info(&format!("Back to: {}", steps[index]));
                    }
                }
                Err(e) => return Err(e),
            }
        }

        let name = state.ctx.app_name().unwrap_or("application");
        Ok(PhaseOutcome::success(format!("{name} is ready")))
    }

    async fn run_step(&self, step: WorkflowStep, state: &mut RunState) -> Result<StepFlow> {
        match step {
            WorkflowStep::Prerequisites => self.prerequisites(state).await,
            WorkflowStep::Requirements => self.requirements(state).await,
            WorkflowStep::Technology => self.technology(state).await,
            WorkflowStep::Schema => self.schema(state).await,
            WorkflowStep::Credentials => self.credentials(state).await,
            WorkflowStep::CodeGeneration => self.code_generation(state).await,
            WorkflowStep::ConnectionTest => self.connection_test(state).await,
            WorkflowStep::SandboxTest => self.sandbox_test(state).await,
            WorkflowStep::Deployment => self.deployment(state).await,
        }
    }

    fn key(&self, state: &RunState) -> CacheKey {
        CacheKey::new(
            state.ctx.workflow_type,
            state.ctx.app_name().unwrap_or_default(),
        )
    }

    /// Local build directory for the application
    fn app_dir(&self, key: &CacheKey) -> PathBuf {
        self.config
            .working_dir
            .join("build")
            .join(key.workflow.as_str())
            .join(key.file_stem())
    }

    /// Read-through cache lookup with user confirmation
    async fn cached(&self, kind: ArtifactKind, key: &CacheKey) -> Result<Option<Artifact>> {
        let Some(artifact) = self.cache.check(kind, key) else {
            return Ok(None);
        };
        match self.cache.confirm(self.ui.as_ref(), &artifact).await? {
            CacheDecision::Use => Ok(Some(artifact)),
            CacheDecision::Reject => Ok(None),
            CacheDecision::Back => Err(ForgeError::NavigateBack.into()),
        }
    }

    /// Let the user retry, step back or stop after a failed phase
    async fn after_failure(&self, outcome: PhaseOutcome) -> Result<StepFlow> {
        self.ui.display_error(&outcome.message);
        let choices = vec![
            "Try this step again".to_string(),
            "Go back to the previous step".to_string(),
            "Stop the workflow".to_string(),
        ];
        match self.ui.prompt_choice("What would you like to do?", &choices).await? {
            0 => Ok(StepFlow::Repeat),
            1 => Err(ForgeError::NavigateBack.into()),
            _ => Ok(StepFlow::Finish(outcome)),
        }
    }

    async fn prompt_required(&self, message: &str, default: Option<&str>) -> Result<String> {
        loop {
            let answer = self.ui.prompt_text(message, default).await?;
            let answer = answer.trim();
            if !answer.is_empty() {
                return Ok(answer.to_string());
            }
            self.ui.display_warning("A value is required");
        }
    }

    async fn prerequisites(&self, state: &mut RunState) -> Result<StepFlow> {
        let workspace = match self.platform.get_workspace().await {
            Ok(workspace) => workspace,
            Err(e) => {
                self.ui.display_error(&e.user_message());
                return Ok(StepFlow::Finish(PhaseOutcome::failure(format!(
                    "Workspace check failed: {}",
                    e.user_message()
                ))));
            }
        };
        self.ui
            .display_info(&format!("Using workspace '{}' ({})", workspace.name, workspace.id));
        state.ctx.workspace.workspace_id = Some(workspace.id);
        state.ctx.workspace.workspace_name = Some(workspace.name);
        state.ctx.workspace.repository_id = workspace.repository_id;

        let topics = match self.platform.list_topics().await {
            Ok(topics) => topics,
            Err(e) => {
                warn!("Could not list topics: {}", e);
                Vec::new()
            }
        };

        let question = match state.ctx.workflow_type {
            WorkflowType::Source => "Which topic should the source write to?",
            WorkflowType::Sink => "Which topic should the sink read from?",
        };
        let topic = if topics.is_empty() {
            self.prompt_required(question, None).await?
        } else {
            let mut choices: Vec<String> = topics.iter().map(|t| t.name.clone()).collect();
            choices.push("Enter another topic name".to_string());
            let choice = self.ui.prompt_choice(question, &choices).await?;
            match topics.get(choice) {
                Some(topic) => topic.name.clone(),
                None => self.prompt_required("Topic name", None).await?,
            }
        };
        state.ctx.workspace.topic_name = Some(topic);
        Ok(StepFlow::Next)
    }

    async fn requirements(&self, state: &mut RunState) -> Result<StepFlow> {
        let name = match &self.options.app_name {
            Some(name) => name.clone(),
            None => {
                let current = state.ctx.app_name().map(str::to_string);
                self.prompt_required("Application name", current.as_deref())
                    .await?
            }
        };
        let slug = slugify_app_name(&name);
        if slug.is_empty() {
            self.ui
                .display_warning("The name needs at least one letter or digit");
            return Ok(StepFlow::Repeat);
        }
        state.ctx.deployment.application_name = Some(slug);
        let key = self.key(state);

        if let Some(Artifact::UserPrompt { prompt }) =
            self.cached(ArtifactKind::UserPrompt, &key).await?
        {
            state.ctx.technology.requirements = Some(prompt);
            return Ok(StepFlow::Next);
        }

        let prompt = self
            .prompt_required(
                &format!("Describe what the {} should do", state.ctx.workflow_type),
                None,
            )
            .await?;
        self.cache.save(
            &key,
            &Artifact::UserPrompt {
                prompt: prompt.clone(),
            },
        );
        state.ctx.technology.requirements = Some(prompt);
        Ok(StepFlow::Next)
    }

    async fn technology(&self, state: &mut RunState) -> Result<StepFlow> {
        let key = self.key(state);
        if let Some(Artifact::Template {
            template,
            technology,
        }) = self.cached(ArtifactKind::Template, &key).await?
        {
            state.ctx.technology.template = Some(template);
            state.ctx.technology.technology = technology;
            return Ok(StepFlow::Next);
        }

        let technology = self
            .prompt_required(
                &format!(
                    "Which technology does the {} connect to? (e.g. PostgreSQL)",
                    state.ctx.workflow_type
                ),
                state.ctx.technology.technology.as_deref(),
            )
            .await?;

        let options = templates(state.ctx.workflow_type);
        let mut choices: Vec<String> = options.iter().map(|t| t.to_string()).collect();
        choices.push("Go back".to_string());
        let choice = self
            .ui
            .prompt_choice("Which template should the code follow?", &choices)
            .await?;
        let Some(template) = options.get(choice) else {
            return Err(ForgeError::NavigateBack.into());
        };

        self.cache.save(
            &key,
            &Artifact::Template {
                template: template.to_string(),
                technology: Some(technology.clone()),
            },
        );
        state.ctx.technology.template = Some(template.to_string());
        state.ctx.technology.technology = Some(technology);
        Ok(StepFlow::Next)
    }

    async fn schema(&self, state: &mut RunState) -> Result<StepFlow> {
        let key = self.key(state);
        if let Some(Artifact::Schema { sample }) = self.cached(ArtifactKind::Schema, &key).await? {
            state.ctx.code_generation.schema_sample = Some(sample);
            return Ok(StepFlow::Next);
        }

        let topic = state.ctx.workspace.topic_name.as_deref().unwrap_or("the topic");
        let sample = self
            .ui
            .prompt_text(
                &format!("Paste a sample message from '{topic}' (blank to skip)"),
                Some(""),
            )
            .await?;
        let sample = sample.trim();
        if sample.is_empty() {
            state.ctx.code_generation.schema_sample = None;
        } else {
            self.cache.save(
                &key,
                &Artifact::Schema {
                    sample: sample.to_string(),
                },
            );
            state.ctx.code_generation.schema_sample = Some(sample.to_string());
        }
        Ok(StepFlow::Next)
    }

    /// Load `app.yaml` from the build directory, or start one with the
    /// topic variable
    fn initial_manifest(&self, state: &RunState, app_dir: &std::path::Path) -> AppManifest {
        let path = app_dir.join("app.yaml");
        let mut manifest = if path.exists() {
            match load_manifest(&path) {
                Ok(manifest) => manifest,
                Err(e) => {
                    warn!("Ignoring unreadable {}: {}", path.display(), e);
                    AppManifest::default()
                }
            }
        } else {
            AppManifest::default()
        };

        let workflow = state.ctx.workflow_type;
        let topic_var = workflow.topic_variable();
        let topic = state.ctx.workspace.topic_name.clone();
        match manifest.variables.iter_mut().find(|v| v.name == topic_var) {
            Some(var) => var.default_value = topic.or(var.default_value.take()),
            None => manifest.variables.insert(
                0,
                EnvVarSpec {
                    name: topic_var.to_string(),
                    input_type: match workflow {
                        WorkflowType::Source => InputType::OutputTopic,
                        WorkflowType::Sink => InputType::InputTopic,
                    },
                    description: Some(format!("Topic the {workflow} uses")),
                    default_value: topic,
                    required: true,
                },
            ),
        }
        manifest
    }

    fn write_manifest(&self, state: &RunState, app_dir: &std::path::Path) {
        if let Err(e) = fs::create_dir_all(app_dir) {
            warn!("Could not create {}: {}", app_dir.display(), e);
            return;
        }
        if let Err(e) = save_manifest(&app_dir.join("app.yaml"), &state.manifest) {
            warn!("Could not save app.yaml: {}", e);
        }
    }

    async fn credentials(&self, state: &mut RunState) -> Result<StepFlow> {
        let key = self.key(state);
        let app_dir = self.app_dir(&key);
        state.manifest = self.initial_manifest(state, &app_dir);
        state.ctx.code_generation.app_directory = Some(app_dir.clone());

        if let Some(Artifact::EnvVars { values }) = self.cached(ArtifactKind::EnvVars, &key).await? {
            for name in values.keys() {
                if state.manifest.get(name).is_none() {
                    state.manifest.variables.push(spec_for_name(name));
                }
            }
            state.ctx.credentials.values = values;
            self.write_manifest(state, &app_dir);
            return Ok(StepFlow::Next);
        }

        if state.manifest.variables.len() <= 1 {
            let names = self
                .ui
                .prompt_text(
                    "Which settings does the connector need? (comma separated, e.g. PG_HOST, PG_PASSWORD)",
                    Some(""),
                )
                .await?;
            for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                if state.manifest.get(name).is_none() {
                    state.manifest.variables.push(spec_for_name(name));
                }
            }
        }

        let app_name = key.app_name.clone();
        let values = collect_interactive(
            self.ui.as_ref(),
            self.secrets.as_ref(),
            &app_name,
            &state.manifest.variables,
        )
        .await?;

        self.cache.save(
            &key,
            &Artifact::EnvVars {
                values: values.clone(),
            },
        );
        state.ctx.credentials.values = values;
        self.write_manifest(state, &app_dir);
        Ok(StepFlow::Next)
    }

    async fn code_generation(&self, state: &mut RunState) -> Result<StepFlow> {
        let key = self.key(state);
        let app_dir = self.app_dir(&key);

        let code = match self.cached(ArtifactKind::Code, &key).await? {
            Some(Artifact::Code { code, .. }) => code,
            _ => {
                let request = GenerationRequest {
                    prompt: generation_prompt(&state.ctx, &state.manifest.variables),
                    app_dir: app_dir.clone(),
                };
                let mut spinner = self.ui.start_spinner("Generating code...");
                let code = match self.generator.generate(&request).await {
                    Ok(code) => {
                        spinner.success("Code generated");
                        code
                    }
                    Err(e) => {
                        spinner.fail("Code generation failed");
                        return self
                            .after_failure(PhaseOutcome::failure(e.user_message()))
                            .await;
                    }
                };
                self.ui
                    .display_block("Generated code", &preview_lines(&code, 40));
                if !self.ui.prompt_yes_no("Use this code?").await? {
                    return Ok(StepFlow::Repeat);
                }
                code
            }
        };

        self.adopt_code(state, &key, code).await?;
        Ok(StepFlow::Next)
    }

    /// Make `code` the application's code: write it out, derive requirements
    /// and bring the variable manifest in line with what it reads
    async fn adopt_code(&self, state: &mut RunState, key: &CacheKey, code: String) -> Result<()> {
        let app_dir = self.app_dir(key);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("Failed to create {}", app_dir.display()))?;
        fs::write(app_dir.join("main.py"), &code)
            .with_context(|| format!("Failed to write main.py in {}", app_dir.display()))?;

        let dependencies = extract_dependencies_for_app(&code, &app_dir);
        write_requirements(&app_dir.join("requirements.txt"), &dependencies)?;

        // Remote entries come first so values edited on the platform win
        let mut existing = self
            .remote_manifest(state)
            .await
            .map(|remote| remote.variables)
            .unwrap_or_default();
        existing.extend(state.manifest.variables.iter().cloned());

        let detected = detect_vars(&code);
        let values = &state.ctx.credentials.values;
        let reconciled = reconcile(&existing, &detected, values, self.options.force_env);

        // Names the code reads that nobody has supplied yet
        let missing: Vec<EnvVarSpec> = reconciled
            .iter()
            .filter(|v| v.default_value.is_none() && !values.contains_key(&v.name))
            .cloned()
            .collect();
        let mut fresh = BTreeMap::new();
        if !missing.is_empty() {
            self.ui.display_info("The generated code reads more settings:");
            fresh = collect_interactive(
                self.ui.as_ref(),
                self.secrets.as_ref(),
                &key.app_name,
                &missing,
            )
            .await?;
        }

        let mut final_values = BTreeMap::new();
        for var in &reconciled {
            let value = fresh
                .get(&var.name)
                .or(var.default_value.as_ref())
                .or(values.get(&var.name));
            if let Some(value) = value {
                final_values.insert(var.name.clone(), value.clone());
            }
        }
        state.manifest.variables = reconciled;
        state.ctx.credentials.values = final_values.clone();
        self.write_manifest(state, &app_dir);

        self.cache.save(key, &Artifact::EnvVars { values: final_values });
        self.cache.save(
            key,
            &Artifact::Code {
                code: code.clone(),
                dependencies: dependencies.clone(),
            },
        );
        state.ctx.code_generation.code = Some(code);
        state.ctx.code_generation.dependencies = dependencies;
        state.ctx.code_generation.app_directory = Some(app_dir);
        Ok(())
    }

    /// The application's `app.yaml` as stored on the platform. Missing or
    /// unreadable manifests yield `None`.
    async fn remote_manifest(&self, state: &RunState) -> Option<AppManifest> {
        let app_id = match &state.ctx.deployment.application_id {
            Some(id) => id.clone(),
            None => {
                let name = state.ctx.app_name()?;
                match self.platform.find_application(name).await {
                    Ok(app) => app?.id,
                    Err(e) => {
                        warn!("Could not look up application {}: {}", name, e);
                        return None;
                    }
                }
            }
        };

        let content = match self.platform.download_file(&app_id, "app.yaml").await {
            Ok(content) => content?,
            Err(e) => {
                warn!("Could not fetch app.yaml of {}: {}", app_id, e);
                return None;
            }
        };
        match AppManifest::parse(&content) {
            Ok(manifest) => {
                debug!(
                    "Merging {} variable(s) from the platform copy of app.yaml",
                    manifest.variables.len()
                );
                Some(manifest)
            }
            Err(e) => {
                warn!("Ignoring unreadable remote app.yaml: {}", e);
                None
            }
        }
    }

    /// Find or create the platform application and its sandbox session
    async fn ensure_application(&self, state: &mut RunState) -> Result<(), PhaseOutcome> {
        if state.session.is_some() {
            return Ok(());
        }
        let name = state.ctx.app_name().unwrap_or_default().to_string();
        let application = match self.platform.find_application(&name).await {
            Ok(Some(app)) => Ok(app),
            Ok(None) => self.platform.create_application(&name).await,
            Err(e) => Err(e),
        }
        .map_err(|e| PhaseOutcome::failure(format!("Could not set up application: {}", e.user_message())))?;

        info!("Using application {} ({})", application.name, application.id);
        state.ctx.deployment.application_id = Some(application.id.clone());
        state.ctx.deployment.application_path = application.path.clone();
        state.session = Some(SessionManager::new(
            Arc::clone(&self.platform),
            application.id,
            self.config.sandbox.poll_interval,
            self.config.sandbox.poll_attempts,
        ));
        Ok(())
    }

    fn sandbox_settings(&self) -> SandboxSettings {
        let mut settings = self.config.sandbox.clone();
        if let Some(max_retries) = self.options.max_retries {
            settings.max_retries = max_retries;
        }
        settings
    }

    fn goal(&self, state: &RunState) -> String {
        state
            .ctx
            .technology
            .requirements
            .clone()
            .unwrap_or_else(|| format!("run a {} connector", state.ctx.workflow_type))
    }

    async fn run_test(&self, state: &mut RunState, subject: &mut TestSubject) -> Result<PhaseOutcome> {
        let settings = self.sandbox_settings();
        let Some(session) = state.session.as_mut() else {
            return Ok(PhaseOutcome::failure("No sandbox session"));
        };
        let outcome = SandboxOrchestrator::new(
            session,
            self.generator.as_ref(),
            self.ui.as_ref(),
            &settings,
        )
        .run(subject)
        .await?;
        state.ctx.deployment.session_id = session.session_id().map(str::to_string);
        Ok(outcome)
    }

    fn rendered_manifest(&self, state: &RunState) -> Option<String> {
        match state.manifest.render() {
            Ok(rendered) => Some(rendered),
            Err(e) => {
                warn!("Could not render app.yaml: {}", e);
                None
            }
        }
    }

    async fn connection_test(&self, state: &mut RunState) -> Result<StepFlow> {
        if let Err(outcome) = self.ensure_application(state).await {
            return self.after_failure(outcome).await;
        }
        let key = self.key(state);
        let app_dir = self.app_dir(&key);

        let request = GenerationRequest {
            prompt: connection_test_prompt(&state.ctx, &state.manifest.variables),
            app_dir: app_dir.clone(),
        };
        let mut spinner = self.ui.start_spinner("Generating connection test...");
        let code = match self.generator.generate(&request).await {
            Ok(code) => {
                spinner.success("Connection test generated");
                code
            }
            Err(e) => {
                spinner.fail("Could not generate a connection test");
                return self
                    .after_failure(PhaseOutcome::failure(e.user_message()))
                    .await;
            }
        };

        let mut subject = TestSubject {
            mode: TestMode::ConnectionTest,
            dependencies: extract_dependencies(&code),
            code,
            manifest: self.rendered_manifest(state),
            variables: split_by_input_type(&state.manifest.variables, &state.ctx.credentials.values),
            app_dir,
            goal: format!(
                "connect to {}",
                state.ctx.technology.technology.as_deref().unwrap_or("the external system")
            ),
        };
        let outcome = self.run_test(state, &mut subject).await?;
        if !outcome.success {
            return self.after_failure(outcome).await;
        }
        state.ctx.code_generation.connection_test_passed = true;
        Ok(StepFlow::Next)
    }

    async fn sandbox_test(&self, state: &mut RunState) -> Result<StepFlow> {
        if let Err(outcome) = self.ensure_application(state).await {
            return self.after_failure(outcome).await;
        }
        let key = self.key(state);
        let Some(code) = state.ctx.code_generation.code.clone() else {
            return Err(ForgeError::NavigateBack.into());
        };

        let mut subject = TestSubject {
            mode: TestMode::Sandbox,
            code,
            dependencies: state.ctx.code_generation.dependencies.clone(),
            manifest: self.rendered_manifest(state),
            variables: split_by_input_type(&state.manifest.variables, &state.ctx.credentials.values),
            app_dir: self.app_dir(&key),
            goal: self.goal(state),
        };
        let outcome = self.run_test(state, &mut subject).await?;
        if !outcome.success {
            return self.after_failure(outcome).await;
        }

        if state.ctx.code_generation.code.as_deref() != Some(subject.code.as_str()) {
            self.adopt_code(state, &key, subject.code).await?;
        }
        state.ctx.code_generation.sandbox_test_passed = true;
        self.publish(state, &key).await;
        Ok(StepFlow::Next)
    }

    /// Cache the tested application and upload it to the platform
    async fn publish(&self, state: &RunState, key: &CacheKey) {
        let app_dir = self.app_dir(key);
        self.cache
            .save(key, &Artifact::AppDirectory { path: app_dir.clone() });

        let Some(app_id) = state.ctx.deployment.application_id.as_deref() else {
            return;
        };
        for file in ["main.py", "requirements.txt", "app.yaml"] {
            let content = match fs::read_to_string(app_dir.join(file)) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping upload of {}: {}", file, e);
                    continue;
                }
            };
            if let Err(e) = self.platform.upload_file(app_id, file, &content).await {
                warn!("Failed to upload {}: {}", file, e);
                self.ui
                    .display_warning(&format!("Could not upload {file}: {}", e.user_message()));
            }
        }
    }

    async fn deployment(&self, state: &mut RunState) -> Result<StepFlow> {
        let name = state.ctx.app_name().unwrap_or("application").to_string();
        if !self.ui.prompt_yes_no(&format!("Deploy {name} now?")).await? {
            self.ui
                .display_info(&format!("{name} is tested and cached; deploy it later from the portal"));
            return Ok(StepFlow::Finish(PhaseOutcome::success(format!(
                "{name} passed all tests (not deployed)"
            ))));
        }

        let phase = DeployPhase::new(
            self.platform.as_ref(),
            self.ui.as_ref(),
            self.config.sandbox.poll_interval,
            self.config.sandbox.poll_attempts,
        );
        let outcome = phase
            .run(
                &mut state.ctx.deployment,
                &state.manifest.variables,
                &state.ctx.credentials.values,
            )
            .await;
        if !outcome.success {
            return self.after_failure(outcome).await;
        }
        self.ui.display_success(&outcome.message);
        Ok(StepFlow::Finish(outcome))
    }
}

async fn wait_for_interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
