//! Layered configuration for quixforge.
//!
//! Configuration is loaded from multiple sources with layered precedence:
//!
//! 1. Hardcoded defaults (lowest priority)
//! 2. Global config file (`<config dir>/quixforge/config.yml`)
//! 3. Project config file (`.quixforge/config.yml`)
//! 4. A `.env` file in the project directory
//! 5. Process environment variables (highest priority)
//!
//! All validation problems are reported together rather than one at a time.

use crate::error::{ErrorCode, ForgeError, ForgeResult};
use crate::retry::RetryPolicy;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Valid log levels for configuration validation.
pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub const DEFAULT_PLATFORM_URL: &str = "https://portal-api.platform.quix.io";
pub const DEFAULT_PACKAGE_INDEX_URL: &str = "https://pypi.org/pypi";

/// Unified configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForgeConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory holding cached artifacts and generated applications.
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    #[serde(default)]
    pub platform: PlatformSettings,

    #[serde(default)]
    pub sandbox: SandboxSettings,

    #[serde(default)]
    pub generator: GeneratorSettings,

    /// Base URL of the package index JSON API.
    #[serde(default = "default_package_index_url")]
    pub package_index_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformSettings {
    #[serde(default = "default_platform_url")]
    pub base_url: String,

    /// Personal access token. Usually supplied through `QUIX_TOKEN`.
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub workspace_id: Option<String>,

    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    #[serde(default)]
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxSettings {
    /// Ceiling on configure-then-run cycles in one test phase.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Wall-clock limit for a single remote execution.
    #[serde(default = "default_run_timeout", with = "humantime_serde")]
    pub run_timeout: Duration,

    /// Interval between session / deployment status polls.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Number of polls before giving up on a session or deployment.
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorSettings {
    /// Binary used for code generation.
    #[serde(default = "default_claude_binary")]
    pub claude_binary: String,

    #[serde(default)]
    pub model: Option<String>,

    /// Timeout for a single generation call.
    #[serde(default = "default_generation_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_working_dir() -> PathBuf {
    PathBuf::from("working_files")
}

fn default_platform_url() -> String {
    DEFAULT_PLATFORM_URL.to_string()
}

fn default_package_index_url() -> String {
    DEFAULT_PACKAGE_INDEX_URL.to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_retries() -> u32 {
    10
}

fn default_run_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_poll_attempts() -> u32 {
    24
}

fn default_claude_binary() -> String {
    "claude".to_string()
}

fn default_generation_timeout() -> Duration {
    Duration::from_secs(600)
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            base_url: default_platform_url(),
            token: None,
            workspace_id: None,
            request_timeout: default_request_timeout(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            run_timeout: default_run_timeout(),
            poll_interval: default_poll_interval(),
            poll_attempts: default_poll_attempts(),
        }
    }
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            claude_binary: default_claude_binary(),
            model: None,
            timeout: default_generation_timeout(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            working_dir: default_working_dir(),
            platform: PlatformSettings::default(),
            sandbox: SandboxSettings::default(),
            generator: GeneratorSettings::default(),
            package_index_url: default_package_index_url(),
        }
    }
}

/// Location of the global configuration file, if a home directory exists
pub fn global_config_path() -> Option<PathBuf> {
    ProjectDirs::from("io", "quixforge", "quixforge")
        .map(|dirs| dirs.config_dir().join("config.yml"))
}

/// Location of the project configuration file
pub fn project_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".quixforge").join("config.yml")
}

impl ForgeConfig {
    /// Load configuration for a project directory from all sources
    pub fn load(project_dir: &Path) -> ForgeResult<Self> {
        let mut files = Vec::new();
        if let Some(global) = global_config_path() {
            files.push(global);
        }
        files.push(project_config_path(project_dir));

        load_dotenv(&project_dir.join(".env"));
        let env: HashMap<String, String> = std::env::vars().collect();

        Self::load_from(&files, &env)
    }

    /// Load configuration from explicit files and an environment map.
    ///
    /// Missing files are skipped. Later files override earlier ones key by key.
    pub fn load_from(files: &[PathBuf], env: &HashMap<String, String>) -> ForgeResult<Self> {
        let mut merged = serde_yaml::to_value(Self::default()).map_err(|e| {
            ForgeError::config_with_code(ErrorCode::CONFIG_INVALID_YAML, "Invalid defaults")
                .with_source(e)
        })?;

        for file in files {
            if !file.exists() {
                continue;
            }
            debug!("Loading configuration from {}", file.display());
            let content = std::fs::read_to_string(file).map_err(|e| {
                ForgeError::config_with_code(
                    ErrorCode::CONFIG_NOT_FOUND,
                    format!("Failed to read {}", file.display()),
                )
                .with_source(e)
            })?;
            if content.trim().is_empty() {
                continue;
            }
            let overlay: serde_yaml::Value = serde_yaml::from_str(&content).map_err(|e| {
                ForgeError::config_with_code(
                    ErrorCode::CONFIG_INVALID_YAML,
                    format!("Invalid YAML in {}", file.display()),
                )
                .with_source(e)
            })?;
            merge_yaml(&mut merged, overlay);
        }

        let mut config: ForgeConfig = serde_yaml::from_value(merged).map_err(|e| {
            ForgeError::config_with_code(ErrorCode::CONFIG_INVALID_VALUE, "Invalid configuration")
                .with_source(e)
        })?;
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self, env: &HashMap<String, String>) -> ForgeResult<()> {
        let get = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| env.get(*k).filter(|v| !v.trim().is_empty()).cloned())
        };

        if let Some(token) = get(&["QUIX_TOKEN", "QUIX_PAT", "QUIX_SDK_TOKEN"]) {
            self.platform.token = Some(token);
        }
        if let Some(url) = get(&["QUIX_BASE_URL", "QUIX_PORTAL_API"]) {
            self.platform.base_url = url;
        }
        if let Some(ws) = get(&["QUIX_WORKSPACE_ID"]) {
            self.platform.workspace_id = Some(ws);
        }
        if let Some(level) = get(&["QUIXFORGE_LOG_LEVEL"]) {
            self.log_level = level;
        }
        if let Some(dir) = get(&["QUIXFORGE_WORKING_DIR"]) {
            self.working_dir = PathBuf::from(dir);
        }
        if let Some(binary) = get(&["QUIXFORGE_CLAUDE_BINARY"]) {
            self.generator.claude_binary = binary;
        }
        if let Some(retries) = get(&["QUIXFORGE_MAX_RETRIES"]) {
            self.sandbox.max_retries = retries.parse().map_err(|_| {
                ForgeError::config_with_code(
                    ErrorCode::CONFIG_INVALID_VALUE,
                    format!("QUIXFORGE_MAX_RETRIES must be a number, got '{}'", retries),
                )
            })?;
        }
        if let Some(timeout) = get(&["QUIXFORGE_RUN_TIMEOUT"]) {
            let parsed: DurationValue = serde_yaml::from_str(&timeout).map_err(|e| {
                ForgeError::config_with_code(
                    ErrorCode::CONFIG_INVALID_VALUE,
                    format!("QUIXFORGE_RUN_TIMEOUT is not a duration: '{}'", timeout),
                )
                .with_source(e)
            })?;
            self.sandbox.run_timeout = parsed.0;
        }
        Ok(())
    }

    /// Validate the configuration, accumulating every problem
    pub fn validate(&self) -> ForgeResult<()> {
        let mut problems = Vec::new();

        if !VALID_LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            problems.push(format!(
                "log_level '{}' must be one of {}",
                self.log_level,
                VALID_LOG_LEVELS.join(", ")
            ));
        }
        if let Err(e) = url::Url::parse(&self.platform.base_url) {
            problems.push(format!(
                "platform.base_url '{}' is not a valid URL: {}",
                self.platform.base_url, e
            ));
        }
        if let Err(e) = url::Url::parse(&self.package_index_url) {
            problems.push(format!(
                "package_index_url '{}' is not a valid URL: {}",
                self.package_index_url, e
            ));
        }
        if self.sandbox.max_retries == 0 {
            problems.push("sandbox.max_retries must be at least 1".to_string());
        }
        if self.sandbox.run_timeout.is_zero() {
            problems.push("sandbox.run_timeout must be greater than zero".to_string());
        }
        if self.generator.claude_binary.trim().is_empty() {
            problems.push("generator.claude_binary must not be empty".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ForgeError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                problems.join("; "),
            ))
        }
    }

    /// The platform token, or a configuration error explaining how to set it
    pub fn require_token(&self) -> ForgeResult<&str> {
        self.platform
            .token
            .as_deref()
            .ok_or_else(|| crate::error::common::missing_setting("platform token", "QUIX_TOKEN"))
    }

    /// The workspace id, or a configuration error explaining how to set it
    pub fn require_workspace(&self) -> ForgeResult<&str> {
        self.platform.workspace_id.as_deref().ok_or_else(|| {
            crate::error::common::missing_setting("workspace id", "QUIX_WORKSPACE_ID")
        })
    }
}

#[derive(Deserialize)]
struct DurationValue(#[serde(with = "humantime_serde")] Duration);

/// Load a `.env` file into the process environment. Variables that are
/// already set keep their value; a missing or malformed file is skipped.
fn load_dotenv(path: &Path) {
    if !path.exists() {
        return;
    }
    match dotenv::from_path(path) {
        Ok(()) => debug!("Loaded environment from {}", path.display()),
        Err(e) => debug!("Could not load {}: {}", path.display(), e),
    }
}

/// Deep-merge `overlay` into `base`; mappings merge, everything else replaces
fn merge_yaml(base: &mut serde_yaml::Value, overlay: serde_yaml::Value) {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(base_map), serde_yaml::Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = ForgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sandbox.max_retries, 10);
        assert_eq!(config.sandbox.run_timeout, Duration::from_secs(30));
        assert_eq!(config.working_dir, PathBuf::from("working_files"));
    }

    #[test]
    fn test_project_file_overrides_global_file() {
        let dir = TempDir::new().unwrap();
        let global = dir.path().join("global.yml");
        let project = dir.path().join("project.yml");
        fs::write(
            &global,
            "log_level: debug\nsandbox:\n  max_retries: 3\n  run_timeout: 45s\n",
        )
        .unwrap();
        fs::write(&project, "sandbox:\n  max_retries: 7\n").unwrap();

        let config = ForgeConfig::load_from(&[global, project], &HashMap::new()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.sandbox.max_retries, 7);
        // Sibling keys from the lower layer survive the merge
        assert_eq!(config.sandbox.run_timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_env_overrides_files() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("config.yml");
        fs::write(&file, "platform:\n  workspace_id: from-file\n").unwrap();

        let env = HashMap::from([
            ("QUIX_TOKEN".to_string(), "pat-123".to_string()),
            ("QUIX_WORKSPACE_ID".to_string(), "from-env".to_string()),
            ("QUIXFORGE_MAX_RETRIES".to_string(), "4".to_string()),
        ]);
        let config = ForgeConfig::load_from(&[file], &env).unwrap();
        assert_eq!(config.platform.token.as_deref(), Some("pat-123"));
        assert_eq!(config.platform.workspace_id.as_deref(), Some("from-env"));
        assert_eq!(config.sandbox.max_retries, 4);
    }

    #[test]
    fn test_missing_files_are_skipped() {
        let config = ForgeConfig::load_from(
            &[PathBuf::from("/definitely/not/here.yml")],
            &HashMap::new(),
        )
        .unwrap();
        assert_eq!(config, ForgeConfig::default());
    }

    #[test]
    fn test_validation_accumulates_problems() {
        let mut config = ForgeConfig::default();
        config.log_level = "loud".to_string();
        config.sandbox.max_retries = 0;
        config.platform.base_url = "not a url".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("log_level"));
        assert!(err.contains("max_retries"));
        assert!(err.contains("base_url"));
    }

    #[test]
    fn test_invalid_retry_env_is_rejected() {
        let env = HashMap::from([("QUIXFORGE_MAX_RETRIES".to_string(), "lots".to_string())]);
        let err = ForgeConfig::load_from(&[], &env).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_INVALID_VALUE);
    }

    #[test]
    fn test_require_token_reports_env_var() {
        let config = ForgeConfig::default();
        let err = config.require_token().unwrap_err();
        assert!(err.to_string().contains("QUIX_TOKEN"));
    }

    #[test]
    fn test_dotenv_fills_unset_variables_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        fs::write(
            &path,
            "QUIXFORGE_DOTENV_ONLY=from-file\nQUIXFORGE_DOTENV_PRESET=from-file\n",
        )
        .unwrap();
        std::env::set_var("QUIXFORGE_DOTENV_PRESET", "from-env");

        load_dotenv(&path);

        assert_eq!(std::env::var("QUIXFORGE_DOTENV_ONLY").as_deref(), Ok("from-file"));
        assert_eq!(std::env::var("QUIXFORGE_DOTENV_PRESET").as_deref(), Ok("from-env"));
    }

    #[test]
    fn test_missing_dotenv_is_skipped() {
        let dir = TempDir::new().unwrap();
        load_dotenv(&dir.path().join(".env"));
    }
}
