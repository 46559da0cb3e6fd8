//! HTTP client for the platform portal API

use super::{
    Application, Deployment, DeploymentRequest, IdeSession, PlatformApi, PlatformError, Resource,
    SessionStatus, Topic, VariableSet, Workspace,
};
use crate::config::PlatformSettings;
use crate::error::{common, ErrorCode, ForgeError, ForgeResult};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};
use url::Url;

/// Bearer-token client scoped to one workspace
pub struct PlatformClient {
    client: Client,
    base_url: Url,
    token: String,
    workspace_id: String,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct LogsResponse {
    #[serde(default)]
    logs: String,
}

#[derive(Debug, Deserialize)]
struct SessionStatusResponse {
    status: SessionStatus,
}

#[derive(Debug, Deserialize)]
struct DeploymentStatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct SecretEntry {
    name: String,
}

impl PlatformClient {
    pub fn new(settings: &PlatformSettings) -> ForgeResult<Self> {
        let token = settings
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| common::missing_setting("platform token", "QUIX_TOKEN"))?;
        let workspace_id = settings
            .workspace_id
            .clone()
            .filter(|w| !w.trim().is_empty())
            .ok_or_else(|| common::missing_setting("workspace id", "QUIX_WORKSPACE_ID"))?;

        // A trailing slash makes Url::join append instead of replacing the last segment
        let mut base = settings.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base).map_err(|e| {
            ForgeError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                format!("Invalid platform URL '{}'", settings.base_url),
            )
            .with_source(e)
        })?;

        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| ForgeError::config("Failed to create HTTP client").with_source(e))?;

        Ok(Self {
            client,
            base_url,
            token,
            workspace_id,
            retry: settings.retry.clone(),
        })
    }

    fn url(&self, path: &str) -> ForgeResult<Url> {
        self.base_url.join(path.trim_start_matches('/')).map_err(|e| {
            ForgeError::platform(
                ErrorCode::PLATFORM_GENERIC,
                format!("Invalid request path '{path}'"),
                None,
            )
            .with_source(e)
        })
    }

    /// Workspace-scoped path
    fn ws(&self, rest: &str) -> String {
        format!("{}/{}", self.workspace_id, rest.trim_start_matches('/'))
    }

    async fn send_once(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
        resource: Resource,
        id: &str,
    ) -> ForgeResult<String> {
        trace!("{} {}", method, url);
        let mut request = self
            .client
            .request(method, url.clone())
            .bearer_auth(&self.token)
            .header("X-Version", "2.0");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(PlatformError::from)?;
        let status = response.status();
        let text = response.text().await.map_err(PlatformError::from)?;

        if status.is_success() {
            Ok(text)
        } else {
            debug!("{} returned HTTP {}", url, status.as_u16());
            Err(PlatformError::from_status(status.as_u16(), &text, resource, id).into())
        }
    }

    /// Send with retry on transient failures and return the raw body
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        resource: Resource,
        id: &str,
    ) -> ForgeResult<String> {
        let url = self.url(path)?;
        let description = format!("{} {}", method, path);
        self.retry
            .execute(&description, || {
                self.send_once(method.clone(), &url, body.as_ref(), resource, id)
            })
            .await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        resource: Resource,
        id: &str,
    ) -> ForgeResult<T> {
        let text = self.send(method, path, body, resource, id).await?;
        decode(&text)
    }
}

fn decode<T: DeserializeOwned>(text: &str) -> ForgeResult<T> {
    serde_json::from_str(text).map_err(|e| PlatformError::Decode(e.to_string()).into())
}

#[async_trait]
impl PlatformApi for PlatformClient {
    fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    async fn get_workspace(&self) -> ForgeResult<Workspace> {
        let path = format!("workspaces/{}", self.workspace_id);
        self.send_json(Method::GET, &path, None, Resource::Workspace, &self.workspace_id)
            .await
    }

    async fn list_topics(&self) -> ForgeResult<Vec<Topic>> {
        self.send_json(Method::GET, &self.ws("topics"), None, Resource::Topic, "")
            .await
    }

    async fn find_application(&self, name: &str) -> ForgeResult<Option<Application>> {
        let apps: Vec<Application> = self
            .send_json(Method::GET, &self.ws("applications"), None, Resource::Application, "")
            .await?;
        Ok(apps.into_iter().find(|app| app.name == name))
    }

    async fn create_application(&self, name: &str) -> ForgeResult<Application> {
        let body = json!({ "name": name, "path": name, "language": "python" });
        self.send_json(
            Method::POST,
            &self.ws("applications"),
            Some(body),
            Resource::Application,
            name,
        )
        .await
    }

    async fn upload_file(&self, app_id: &str, path: &str, content: &str) -> ForgeResult<()> {
        let body = json!({ "content": content });
        self.send(
            Method::PUT,
            &self.ws(&format!("applications/{app_id}/files/{path}")),
            Some(body),
            Resource::Application,
            app_id,
        )
        .await
        .map(|_| ())
    }

    async fn download_file(&self, app_id: &str, path: &str) -> ForgeResult<Option<String>> {
        let result = self
            .send(
                Method::GET,
                &self.ws(&format!("applications/{app_id}/files/{path}")),
                None,
                Resource::File,
                path,
            )
            .await;
        match result {
            Ok(content) => Ok(Some(content)),
            Err(ForgeError::Platform {
                code: ErrorCode::PLATFORM_NOT_FOUND,
                ..
            }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn start_session(&self, app_id: &str) -> ForgeResult<IdeSession> {
        self.send_json(
            Method::POST,
            &self.ws(&format!("applications/{app_id}/sessions")),
            None,
            Resource::Application,
            app_id,
        )
        .await
    }

    async fn session_status(&self, session_id: &str) -> ForgeResult<SessionStatus> {
        let response: SessionStatusResponse = self
            .send_json(
                Method::GET,
                &self.ws(&format!("sessions/{session_id}")),
                None,
                Resource::Session,
                session_id,
            )
            .await?;
        Ok(response.status)
    }

    async fn stop_session(&self, session_id: &str) -> ForgeResult<()> {
        self.send(
            Method::DELETE,
            &self.ws(&format!("sessions/{session_id}")),
            None,
            Resource::Session,
            session_id,
        )
        .await
        .map(|_| ())
    }

    async fn write_session_file(
        &self,
        session_id: &str,
        path: &str,
        content: &str,
    ) -> ForgeResult<()> {
        self.send(
            Method::PUT,
            &self.ws(&format!("sessions/{session_id}/files/{path}")),
            Some(json!({ "content": content })),
            Resource::Session,
            session_id,
        )
        .await
        .map(|_| ())
    }

    async fn set_session_variables(
        &self,
        session_id: &str,
        variables: &VariableSet,
    ) -> ForgeResult<()> {
        let body = serde_json::to_value(variables)
            .map_err(|e| ForgeError::from(PlatformError::Decode(e.to_string())))?;
        self.send(
            Method::PUT,
            &self.ws(&format!("sessions/{session_id}/variables")),
            Some(body),
            Resource::Session,
            session_id,
        )
        .await
        .map(|_| ())
    }

    async fn install_dependencies(&self, session_id: &str) -> ForgeResult<String> {
        let response: LogsResponse = self
            .send_json(
                Method::POST,
                &self.ws(&format!("sessions/{session_id}/dependencies")),
                Some(json!({ "requirementsFile": "requirements.txt" })),
                Resource::Session,
                session_id,
            )
            .await?;
        Ok(response.logs)
    }

    async fn run_script(&self, session_id: &str, entry_point: &str) -> ForgeResult<String> {
        let response: LogsResponse = self
            .send_json(
                Method::POST,
                &self.ws(&format!("sessions/{session_id}/run")),
                Some(json!({ "entryPoint": entry_point })),
                Resource::Session,
                session_id,
            )
            .await?;
        Ok(response.logs)
    }

    async fn list_secrets(&self) -> ForgeResult<Vec<String>> {
        let secrets: Vec<SecretEntry> = self
            .send_json(Method::GET, &self.ws("secrets"), None, Resource::Secret, "")
            .await?;
        Ok(secrets.into_iter().map(|s| s.name).collect())
    }

    async fn create_secret(&self, name: &str, value: &str) -> ForgeResult<()> {
        self.send(
            Method::PUT,
            &self.ws(&format!("secrets/{name}")),
            Some(json!({ "value": value })),
            Resource::Secret,
            name,
        )
        .await
        .map(|_| ())
    }

    async fn create_deployment(&self, request: &DeploymentRequest) -> ForgeResult<Deployment> {
        let body = serde_json::to_value(request)
            .map_err(|e| ForgeError::from(PlatformError::Decode(e.to_string())))?;
        self.send_json(
            Method::POST,
            &self.ws("deployments"),
            Some(body),
            Resource::Deployment,
            &request.name,
        )
        .await
    }

    async fn start_deployment(&self, deployment_id: &str) -> ForgeResult<()> {
        self.send(
            Method::PUT,
            &self.ws(&format!("deployments/{deployment_id}/start")),
            None,
            Resource::Deployment,
            deployment_id,
        )
        .await
        .map(|_| ())
    }

    async fn deployment_status(&self, deployment_id: &str) -> ForgeResult<String> {
        let response: DeploymentStatusResponse = self
            .send_json(
                Method::GET,
                &self.ws(&format!("deployments/{deployment_id}")),
                None,
                Resource::Deployment,
                deployment_id,
            )
            .await?;
        Ok(response.status)
    }
}
