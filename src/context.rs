//! Typed state for one end-to-end wizard run
//!
//! A `WorkflowContext` is created once per invocation and passed explicitly to
//! each phase. Phases borrow only the sub-record they need.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Which kind of connector the wizard is building
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    Source,
    Sink,
}

impl WorkflowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowType::Source => "source",
            WorkflowType::Sink => "sink",
        }
    }

    /// Name of the topic variable this connector reads from or writes to
    pub fn topic_variable(&self) -> &'static str {
        match self {
            WorkflowType::Source => "output",
            WorkflowType::Sink => "input",
        }
    }
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "source" => Ok(WorkflowType::Source),
            "sink" => Ok(WorkflowType::Sink),
            other => Err(format!("unknown workflow type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    pub workspace_id: Option<String>,
    pub workspace_name: Option<String>,
    pub repository_id: Option<String>,
    /// Topic the connector reads from (sink) or writes to (source)
    pub topic_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentInfo {
    pub application_id: Option<String>,
    pub application_name: Option<String>,
    pub application_path: Option<String>,
    pub session_id: Option<String>,
    pub deployment_id: Option<String>,
    pub deployment_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnologyInfo {
    /// Target/source technology, e.g. "PostgreSQL" or "Kafka REST"
    pub technology: Option<String>,
    /// Template/library the application is based on
    pub template: Option<String>,
    /// Free-form requirement text entered by the user
    pub requirements: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialsInfo {
    /// Collected variable values, keyed by variable name. Secret variables
    /// hold the name of the stored secret, never the secret itself.
    pub values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeGenerationInfo {
    pub code: Option<String>,
    pub dependencies: Vec<String>,
    pub app_directory: Option<PathBuf>,
    pub schema_sample: Option<String>,
    pub connection_test_passed: bool,
    pub sandbox_test_passed: bool,
}

/// State for one wizard run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowContext {
    pub workflow_type: WorkflowType,
    pub workspace: WorkspaceInfo,
    pub deployment: DeploymentInfo,
    pub technology: TechnologyInfo,
    pub credentials: CredentialsInfo,
    pub code_generation: CodeGenerationInfo,
}

impl WorkflowContext {
    pub fn new(workflow_type: WorkflowType) -> Self {
        Self {
            workflow_type,
            workspace: WorkspaceInfo::default(),
            deployment: DeploymentInfo::default(),
            technology: TechnologyInfo::default(),
            credentials: CredentialsInfo::default(),
            code_generation: CodeGenerationInfo::default(),
        }
    }

    /// Application name, used as the cache key
    pub fn app_name(&self) -> Option<&str> {
        self.deployment.application_name.as_deref()
    }
}

/// Normalize a user-entered application name into a safe key
///
/// Lowercases, maps runs of anything other than ASCII letters and digits to a
/// single '-', and trims leading/trailing separators.
pub fn slugify_app_name(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = false;
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash && !slug.is_empty() {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
