use super::lock;
use crate::error::{common, ErrorCode, ForgeError, ForgeResult};
use crate::platform::{
    Application, Deployment, DeploymentRequest, IdeSession, PlatformApi, SessionStatus, Topic,
    VariableSet, Workspace,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

/// Scripted outcome of one `run_script` call
#[derive(Debug, Clone, PartialEq)]
pub enum MockRun {
    /// The script ran and printed these logs
    Logs(String),
    /// The session disappeared
    SessionLost,
    /// The platform rejected the call with HTTP 500
    Fail(String),
    /// The token was rejected
    Unauthorized,
    /// The call never completes
    Hang,
}

#[derive(Default)]
struct State {
    topics: Vec<String>,
    applications: Vec<Application>,
    app_files: BTreeMap<(String, String), String>,
    session_files: BTreeMap<String, String>,
    session_variables: VariableSet,
    runs: VecDeque<MockRun>,
    default_logs: String,
    run_count: usize,
    entry_points: Vec<String>,
    install_count: usize,
    sessions_started: usize,
    sessions_stopped: usize,
    session_never_ready: bool,
    lose_session_on_write: usize,
    secrets: Vec<String>,
    created_secrets: Vec<(String, String)>,
    deployments: Vec<DeploymentRequest>,
    deployments_started: usize,
    deployment_statuses: VecDeque<String>,
}

/// In-memory platform with scripted run results
pub struct MockPlatform {
    workspace_id: String,
    state: Mutex<State>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            workspace_id: "ws-test".to_string(),
            state: Mutex::new(State::default()),
        }
    }

    /// Results returned by successive `run_script` calls
    pub fn with_runs(self, runs: Vec<MockRun>) -> Self {
        lock(&self.state).runs = runs.into();
        self
    }

    /// Logs returned once the scripted runs are used up
    pub fn with_default_logs(self, logs: &str) -> Self {
        lock(&self.state).default_logs = logs.to_string();
        self
    }

    pub fn with_topics(self, topics: &[&str]) -> Self {
        lock(&self.state).topics = topics.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_secrets(self, secrets: &[&str]) -> Self {
        lock(&self.state).secrets = secrets.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_deployment_statuses(self, statuses: &[&str]) -> Self {
        lock(&self.state).deployment_statuses = statuses.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_session_never_ready(self) -> Self {
        lock(&self.state).session_never_ready = true;
        self
    }

    /// Fail the next `count` session file writes with "session not found"
    pub fn with_lost_session_on_write(self, count: usize) -> Self {
        lock(&self.state).lose_session_on_write = count;
        self
    }

    /// An application that already exists in the workspace
    pub fn with_application(self, id: &str, name: &str) -> Self {
        lock(&self.state).applications.push(Application {
            id: id.to_string(),
            name: name.to_string(),
            path: Some(name.to_string()),
        });
        self
    }

    pub fn with_app_file(self, app_id: &str, path: &str, content: &str) -> Self {
        lock(&self.state)
            .app_files
            .insert((app_id.to_string(), path.to_string()), content.to_string());
        self
    }

    pub fn run_count(&self) -> usize {
        lock(&self.state).run_count
    }

    pub fn entry_points(&self) -> Vec<String> {
        lock(&self.state).entry_points.clone()
    }

    pub fn install_count(&self) -> usize {
        lock(&self.state).install_count
    }

    pub fn sessions_started(&self) -> usize {
        lock(&self.state).sessions_started
    }

    pub fn sessions_stopped(&self) -> usize {
        lock(&self.state).sessions_stopped
    }

    pub fn session_file(&self, path: &str) -> Option<String> {
        lock(&self.state).session_files.get(path).cloned()
    }

    /// Plain values last set on the session
    pub fn session_variables(&self) -> BTreeMap<String, String> {
        lock(&self.state).session_variables.variables.clone()
    }

    /// Secret references last set on the session
    pub fn session_secret_variables(&self) -> BTreeMap<String, String> {
        lock(&self.state).session_variables.secret_variables.clone()
    }

    pub fn app_file(&self, app_id: &str, path: &str) -> Option<String> {
        lock(&self.state)
            .app_files
            .get(&(app_id.to_string(), path.to_string()))
            .cloned()
    }

    pub fn applications(&self) -> Vec<Application> {
        lock(&self.state).applications.clone()
    }

    pub fn created_secrets(&self) -> Vec<(String, String)> {
        lock(&self.state).created_secrets.clone()
    }

    pub fn deployments(&self) -> Vec<DeploymentRequest> {
        lock(&self.state).deployments.clone()
    }

    pub fn deployments_started(&self) -> usize {
        lock(&self.state).deployments_started
    }
}

#[async_trait]
impl PlatformApi for MockPlatform {
    fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    async fn get_workspace(&self) -> ForgeResult<Workspace> {
        Ok(Workspace {
            id: self.workspace_id.clone(),
            name: "Test workspace".to_string(),
            repository_id: None,
        })
    }

    async fn list_topics(&self) -> ForgeResult<Vec<Topic>> {
        Ok(lock(&self.state)
            .topics
            .iter()
            .map(|name| Topic { name: name.clone() })
            .collect())
    }

    async fn find_application(&self, name: &str) -> ForgeResult<Option<Application>> {
        Ok(lock(&self.state)
            .applications
            .iter()
            .find(|app| app.name == name)
            .cloned())
    }

    async fn create_application(&self, name: &str) -> ForgeResult<Application> {
        let mut state = lock(&self.state);
        let app = Application {
            id: format!("app-{}", state.applications.len() + 1),
            name: name.to_string(),
            path: Some(name.to_string()),
        };
        state.applications.push(app.clone());
        Ok(app)
    }

    async fn upload_file(&self, app_id: &str, path: &str, content: &str) -> ForgeResult<()> {
        lock(&self.state)
            .app_files
            .insert((app_id.to_string(), path.to_string()), content.to_string());
        Ok(())
    }

    async fn download_file(&self, app_id: &str, path: &str) -> ForgeResult<Option<String>> {
        Ok(self.app_file(app_id, path))
    }

    async fn start_session(&self, _app_id: &str) -> ForgeResult<IdeSession> {
        let mut state = lock(&self.state);
        state.sessions_started += 1;
        let status = if state.session_never_ready {
            SessionStatus::Starting
        } else {
            SessionStatus::Ready
        };
        Ok(IdeSession {
            id: format!("session-{}", state.sessions_started),
            status,
        })
    }

    async fn session_status(&self, _session_id: &str) -> ForgeResult<SessionStatus> {
        if lock(&self.state).session_never_ready {
            Ok(SessionStatus::Starting)
        } else {
            Ok(SessionStatus::Ready)
        }
    }

    async fn stop_session(&self, _session_id: &str) -> ForgeResult<()> {
        lock(&self.state).sessions_stopped += 1;
        Ok(())
    }

    async fn write_session_file(
        &self,
        session_id: &str,
        path: &str,
        content: &str,
    ) -> ForgeResult<()> {
        let mut state = lock(&self.state);
        if state.lose_session_on_write > 0 {
            state.lose_session_on_write -= 1;
            return Err(common::session_not_found(session_id));
        }
        state
            .session_files
            .insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn set_session_variables(
        &self,
        _session_id: &str,
        variables: &VariableSet,
    ) -> ForgeResult<()> {
        lock(&self.state).session_variables = variables.clone();
        Ok(())
    }

    async fn install_dependencies(&self, _session_id: &str) -> ForgeResult<String> {
        lock(&self.state).install_count += 1;
        Ok("Successfully installed requirements".to_string())
    }

    async fn run_script(&self, session_id: &str, entry_point: &str) -> ForgeResult<String> {
        let next = {
            let mut state = lock(&self.state);
            state.run_count += 1;
            state.entry_points.push(entry_point.to_string());
            let default = MockRun::Logs(state.default_logs.clone());
            state.runs.pop_front().unwrap_or(default)
        };

        match next {
            MockRun::Logs(logs) => Ok(logs),
            MockRun::SessionLost => Err(common::session_not_found(session_id)),
            MockRun::Fail(message) => Err(ForgeError::platform(
                ErrorCode::PLATFORM_GENERIC,
                message,
                Some(500),
            )),
            MockRun::Unauthorized => Err(ForgeError::platform(
                ErrorCode::PLATFORM_UNAUTHORIZED,
                "authentication rejected (HTTP 401)",
                Some(401),
            )),
            MockRun::Hang => {
                std::future::pending::<()>().await;
                Ok(String::new())
            }
        }
    }

    async fn list_secrets(&self) -> ForgeResult<Vec<String>> {
        Ok(lock(&self.state).secrets.clone())
    }

    async fn create_secret(&self, name: &str, value: &str) -> ForgeResult<()> {
        let mut state = lock(&self.state);
        if !state.secrets.iter().any(|s| s == name) {
            state.secrets.push(name.to_string());
        }
        state
            .created_secrets
            .push((name.to_string(), value.to_string()));
        Ok(())
    }

    async fn create_deployment(&self, request: &DeploymentRequest) -> ForgeResult<Deployment> {
        let mut state = lock(&self.state);
        state.deployments.push(request.clone());
        Ok(Deployment {
            id: format!("deployment-{}", state.deployments.len()),
            name: request.name.clone(),
            status: Some("Stopped".to_string()),
        })
    }

    async fn start_deployment(&self, _deployment_id: &str) -> ForgeResult<()> {
        lock(&self.state).deployments_started += 1;
        Ok(())
    }

    async fn deployment_status(&self, _deployment_id: &str) -> ForgeResult<String> {
        Ok(lock(&self.state)
            .deployment_statuses
            .pop_front()
            .unwrap_or_else(|| "Running".to_string()))
    }
}
