//! AI code generation
//!
//! The wizard asks a [`CodeGenerator`] for connector code and, when a sandbox
//! run fails, for a fixed version of that code. [`ClaudeCliGenerator`] drives
//! the `claude` CLI in print mode.

mod claude;

pub use claude::ClaudeCliGenerator;

use crate::error::{ErrorCode, ForgeError, ForgeResult};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use thiserror::Error;

/// Request for new code
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Application directory the generator may read for context
    pub app_dir: PathBuf,
}

/// Request to repair code after a failed run
#[derive(Debug, Clone, PartialEq)]
pub struct DebugRequest {
    pub code: String,
    pub logs: String,
    /// Extra guidance typed by the user, if any
    pub feedback: Option<String>,
    /// Short description of what the code is supposed to do
    pub goal: String,
    pub app_dir: PathBuf,
}

#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Produce Python source for the request
    async fn generate(&self, request: &GenerationRequest) -> ForgeResult<String>;

    /// Produce a corrected version of `request.code`
    async fn debug(&self, request: &DebugRequest) -> ForgeResult<String>;
}

/// Failures specific to code generation
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("code generator is overloaded: {0}")]
    Overloaded(String),

    #[error("code generator failed: {0}")]
    Failed(String),

    #[error("code generator returned no code")]
    EmptyResponse,
}

impl From<GeneratorError> for ForgeError {
    fn from(err: GeneratorError) -> Self {
        let code = match err {
            GeneratorError::Overloaded(_) => ErrorCode::EXEC_GENERATOR_OVERLOADED,
            GeneratorError::Failed(_) | GeneratorError::EmptyResponse => {
                ErrorCode::EXEC_GENERATOR_FAILED
            }
        };
        ForgeError::execution_with_code(code, err.to_string(), None)
    }
}

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[ \t]*(?:python|py)?[ \t]*\r?\n(.*?)```").expect("valid fence pattern")
});

/// Pull Python source out of a model response.
///
/// The longest fenced block wins; a response without fences is taken as-is.
pub fn extract_code(response: &str) -> Result<String, GeneratorError> {
    let fenced = CODE_FENCE
        .captures_iter(response)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .max_by_key(|block| block.len());

    let code = fenced.unwrap_or(response).trim();
    if code.is_empty() {
        return Err(GeneratorError::EmptyResponse);
    }
    Ok(format!("{code}\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_longest_fenced_block() {
        let response = "Here you go:\n```python\nimport os\nprint(os.getcwd())\n```\nand a test:\n```\nx = 1\n```\n";
        assert_eq!(
            extract_code(response).unwrap(),
            "import os\nprint(os.getcwd())\n"
        );
    }

    #[test]
    fn test_unfenced_response_is_code() {
        assert_eq!(extract_code("  print('hi')  \n").unwrap(), "print('hi')\n");
    }

    #[test]
    fn test_empty_response_is_an_error() {
        assert!(matches!(
            extract_code("```python\n\n```"),
            Err(GeneratorError::EmptyResponse)
        ));
    }

    #[test]
    fn test_overloaded_is_transient() {
        let err: ForgeError = GeneratorError::Overloaded("529".to_string()).into();
        assert!(err.is_transient());
        let err: ForgeError = GeneratorError::EmptyResponse.into();
        assert!(!err.is_transient());
    }
}
