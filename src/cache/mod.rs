//! Filesystem cache of intermediate wizard artifacts
//!
//! Artifacts are keyed by (workflow type, application name, artifact kind)
//! and stored under the working directory:
//!
//! ```text
//! <working_dir>/<category>/<workflow>/<app>.json   structured records
//! <working_dir>/env/<workflow>/<app>.env           plaintext export of env vars
//! <working_dir>/apps/<workflow>/<app>/             full application directories
//! ```
//!
//! The presence of the file (or directory) is the only cache-hit signal. Cache
//! failures are logged and treated as a miss; they never abort the wizard.

mod store;

pub use store::CacheStore;

use crate::context::{slugify_app_name, WorkflowType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Current on-disk record format
pub const RECORD_VERSION: u32 = 1;

/// Kinds of cached artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Template,
    EnvVars,
    Code,
    AppDirectory,
    Schema,
    UserPrompt,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 6] = [
        ArtifactKind::Template,
        ArtifactKind::EnvVars,
        ArtifactKind::Code,
        ArtifactKind::AppDirectory,
        ArtifactKind::Schema,
        ArtifactKind::UserPrompt,
    ];

    /// Top-level directory for this kind
    pub fn category(&self) -> &'static str {
        match self {
            ArtifactKind::Template => "templates",
            ArtifactKind::EnvVars => "env",
            ArtifactKind::Code => "code",
            ArtifactKind::AppDirectory => "apps",
            ArtifactKind::Schema => "schema",
            ArtifactKind::UserPrompt => "prompts",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Template => "template selection",
            ArtifactKind::EnvVars => "environment variables",
            ArtifactKind::Code => "generated code",
            ArtifactKind::AppDirectory => "application directory",
            ArtifactKind::Schema => "schema sample",
            ArtifactKind::UserPrompt => "requirements prompt",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identifies an application's cache slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub workflow: WorkflowType,
    pub app_name: String,
}

impl CacheKey {
    pub fn new(workflow: WorkflowType, app_name: impl Into<String>) -> Self {
        Self {
            workflow,
            app_name: app_name.into(),
        }
    }

    /// File stem used on disk
    pub fn file_stem(&self) -> String {
        let slug = slugify_app_name(&self.app_name);
        if slug.is_empty() {
            "unnamed".to_string()
        } else {
            slug
        }
    }
}

/// A cached artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    Template {
        template: String,
        technology: Option<String>,
    },
    /// Variable values; Secret-typed variables carry the secret name only
    EnvVars { values: BTreeMap<String, String> },
    Code {
        code: String,
        dependencies: Vec<String>,
    },
    /// Location of an application directory
    AppDirectory { path: PathBuf },
    Schema { sample: String },
    UserPrompt { prompt: String },
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::Template { .. } => ArtifactKind::Template,
            Artifact::EnvVars { .. } => ArtifactKind::EnvVars,
            Artifact::Code { .. } => ArtifactKind::Code,
            Artifact::AppDirectory { .. } => ArtifactKind::AppDirectory,
            Artifact::Schema { .. } => ArtifactKind::Schema,
            Artifact::UserPrompt { .. } => ArtifactKind::UserPrompt,
        }
    }

    /// Short human-readable preview shown before asking to reuse it
    pub fn preview(&self) -> String {
        match self {
            Artifact::Template {
                template,
                technology,
            } => match technology {
                Some(tech) => format!("Template: {template}\nTechnology: {tech}"),
                None => format!("Template: {template}"),
            },
            Artifact::EnvVars { values } => values
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("\n"),
            Artifact::Code { code, dependencies } => {
                let mut preview = crate::interaction::preview_lines(code, 25);
                if !dependencies.is_empty() {
                    preview.push_str(&format!("\n\nDependencies: {}", dependencies.join(", ")));
                }
                preview
            }
            Artifact::AppDirectory { path } => format!("Directory: {}", path.display()),
            Artifact::Schema { sample } => crate::interaction::preview_lines(sample, 25),
            Artifact::UserPrompt { prompt } => prompt.clone(),
        }
    }
}

/// On-disk envelope for every structured artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub version: u32,
    pub workflow: WorkflowType,
    pub app_name: String,
    pub saved_at: DateTime<Utc>,
    pub artifact: Artifact,
}

/// Outcome of asking the user whether to reuse a cached artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    /// Reuse the cached value
    Use,
    /// Ignore the cache and collect/generate fresh
    Reject,
    /// Return to the previous wizard step
    Back,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_is_tagged_by_kind() {
        let artifact = Artifact::UserPrompt {
            prompt: "read from postgres".to_string(),
        };
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["kind"], "user_prompt");
        assert_eq!(json["prompt"], "read from postgres");
    }

    #[test]
    fn test_each_kind_has_its_own_category() {
        let mut categories: Vec<_> = ArtifactKind::ALL.iter().map(|k| k.category()).collect();
        categories.sort();
        categories.dedup();
        assert_eq!(categories.len(), ArtifactKind::ALL.len());
    }

    #[test]
    fn test_file_stem_is_slugged() {
        let key = CacheKey::new(WorkflowType::Sink, "My PG Sink");
        assert_eq!(key.file_stem(), "my-pg-sink");
        assert_eq!(CacheKey::new(WorkflowType::Sink, "???").file_stem(), "unnamed");
    }

    #[test]
    fn test_env_preview_lists_values() {
        let artifact = Artifact::EnvVars {
            values: BTreeMap::from([
                ("input".to_string(), "raw-data".to_string()),
                ("PG_HOST".to_string(), "localhost".to_string()),
            ]),
        };
        assert_eq!(artifact.preview(), "PG_HOST=localhost\ninput=raw-data");
    }
}
