//! Streaming platform REST API
//!
//! `PlatformApi` is the seam between the wizard and the platform: topics,
//! applications and their files, IDE sessions used as sandboxes, secrets, and
//! deployments. `PlatformClient` is the HTTP implementation; tests use the
//! scripted mock in `crate::testing`.

mod client;
mod session;

pub use client::PlatformClient;
pub use session::SessionManager;

use crate::error::{common, ErrorCode, ForgeError, ForgeResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    #[serde(alias = "workspaceId")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub repository_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(alias = "applicationId")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
}

/// Lifecycle state of an IDE session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Starting,
    Ready,
    Stopped,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeSession {
    #[serde(alias = "sessionId")]
    pub id: String,
    pub status: SessionStatus,
}

/// Environment handed to a session or deployment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableSet {
    pub variables: BTreeMap<String, String>,
    /// Values are secret names; the platform resolves them
    pub secret_variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRequest {
    pub name: String,
    pub application_id: String,
    pub variables: BTreeMap<String, String>,
    /// Secret-typed variables; values are secret names
    pub secret_variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    #[serde(alias = "deploymentId")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Which kind of resource a call touched; drives 404 handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Workspace,
    Topic,
    Application,
    File,
    Session,
    Secret,
    Deployment,
}

/// Failures reported by the platform API
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("authentication rejected (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("{resource:?} '{id}' not found")]
    NotFound { resource: Resource, id: String },

    #[error("rate limited by the platform")]
    RateLimited,

    #[error("platform unavailable (HTTP {status})")]
    Unavailable { status: u16 },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl PlatformError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, body: &str, resource: Resource, id: &str) -> Self {
        match status {
            401 | 403 => Self::Unauthorized { status },
            404 => Self::NotFound {
                resource,
                id: id.to_string(),
            },
            429 => Self::RateLimited,
            502..=504 => Self::Unavailable { status },
            _ => Self::Http {
                status,
                body: body.chars().take(500).collect(),
            },
        }
    }
}

impl From<PlatformError> for ForgeError {
    fn from(err: PlatformError) -> Self {
        let message = err.to_string();
        match err {
            PlatformError::NotFound {
                resource: Resource::Session,
                id,
            } => common::session_not_found(&id),
            PlatformError::NotFound { .. } => {
                ForgeError::platform(ErrorCode::PLATFORM_NOT_FOUND, message, Some(404))
            }
            PlatformError::Unauthorized { status } => {
                ForgeError::platform(ErrorCode::PLATFORM_UNAUTHORIZED, message, Some(status))
            }
            PlatformError::RateLimited => {
                ForgeError::platform(ErrorCode::PLATFORM_RATE_LIMITED, message, Some(429))
            }
            PlatformError::Unavailable { status } => {
                ForgeError::platform(ErrorCode::PLATFORM_UNAVAILABLE, message, Some(status))
            }
            PlatformError::Http { status, .. } => {
                ForgeError::platform(ErrorCode::PLATFORM_GENERIC, message, Some(status))
            }
            PlatformError::Transport(source) => {
                ForgeError::platform(ErrorCode::PLATFORM_TRANSPORT, message, None).with_source(source)
            }
            PlatformError::Decode(_) => {
                ForgeError::platform(ErrorCode::PLATFORM_BAD_RESPONSE, message, None)
            }
        }
    }
}

/// Operations the wizard needs from the platform.
///
/// Calls are scoped to the workspace the implementation was built for.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    fn workspace_id(&self) -> &str;

    async fn get_workspace(&self) -> ForgeResult<Workspace>;

    async fn list_topics(&self) -> ForgeResult<Vec<Topic>>;

    async fn find_application(&self, name: &str) -> ForgeResult<Option<Application>>;

    async fn create_application(&self, name: &str) -> ForgeResult<Application>;

    async fn upload_file(&self, app_id: &str, path: &str, content: &str) -> ForgeResult<()>;

    /// Returns `None` when the file does not exist
    async fn download_file(&self, app_id: &str, path: &str) -> ForgeResult<Option<String>>;

    async fn start_session(&self, app_id: &str) -> ForgeResult<IdeSession>;

    async fn session_status(&self, session_id: &str) -> ForgeResult<SessionStatus>;

    async fn stop_session(&self, session_id: &str) -> ForgeResult<()>;

    /// Write a file into the session's working copy of the application
    async fn write_session_file(
        &self,
        session_id: &str,
        path: &str,
        content: &str,
    ) -> ForgeResult<()>;

    /// Replace the session's environment. Secret entries are sent as
    /// references, never as values.
    async fn set_session_variables(
        &self,
        session_id: &str,
        variables: &VariableSet,
    ) -> ForgeResult<()>;

    /// Install `requirements.txt` in the session; returns installer output
    async fn install_dependencies(&self, session_id: &str) -> ForgeResult<String>;

    /// Run a script in the session and return its captured output
    async fn run_script(&self, session_id: &str, entry_point: &str) -> ForgeResult<String>;

    async fn list_secrets(&self) -> ForgeResult<Vec<String>>;

    async fn create_secret(&self, name: &str, value: &str) -> ForgeResult<()>;

    async fn create_deployment(&self, request: &DeploymentRequest) -> ForgeResult<Deployment>;

    async fn start_deployment(&self, deployment_id: &str) -> ForgeResult<()>;

    async fn deployment_status(&self, deployment_id: &str) -> ForgeResult<String>;
}
