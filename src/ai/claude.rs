use super::{extract_code, CodeGenerator, DebugRequest, GenerationRequest, GeneratorError};
use crate::config::GeneratorSettings;
use crate::error::ForgeResult;
use crate::retry::{is_transient_message, RetryPolicy};
use crate::subprocess::{ProcessCommandBuilder, ProcessError, ProcessRunner};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Generates code by running `claude --print` with the prompt on stdin
pub struct ClaudeCliGenerator {
    runner: Arc<dyn ProcessRunner>,
    binary: String,
    model: Option<String>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ClaudeCliGenerator {
    pub fn new(runner: Arc<dyn ProcessRunner>, settings: &GeneratorSettings) -> Self {
        Self {
            runner,
            binary: settings.claude_binary.clone(),
            model: settings.model.clone(),
            timeout: settings.timeout,
            retry: settings.retry.clone(),
        }
    }

    async fn run_once(&self, prompt: &str, app_dir: &Path) -> ForgeResult<String> {
        let mut builder = ProcessCommandBuilder::new(&self.binary)
            .args(["--print", "--output-format", "text"])
            .env("NO_COLOR", "1")
            .timeout(self.timeout)
            .stdin(prompt.to_string());
        if let Some(model) = &self.model {
            builder = builder.args(["--model", model.as_str()]);
        }
        if app_dir.is_dir() {
            builder = builder.current_dir(app_dir);
        }

        let output = self.runner.run(builder.build()).await?;
        if !output.status.success() {
            let detail = if output.stderr.trim().is_empty() {
                output.stdout.trim().to_string()
            } else {
                output.stderr.trim().to_string()
            };
            let err = if is_transient_message(&detail) {
                GeneratorError::Overloaded(detail)
            } else {
                GeneratorError::Failed(
                    ProcessError::ExitCode {
                        code: output.status.code(),
                        stderr: detail,
                    }
                    .to_string(),
                )
            };
            return Err(err.into());
        }

        debug!("Generator responded in {:?}", output.duration);
        Ok(extract_code(&output.stdout)?)
    }

    async fn run(&self, description: &str, prompt: &str, app_dir: &Path) -> ForgeResult<String> {
        info!("Requesting {} from {}", description, self.binary);
        self.retry
            .execute(description, || self.run_once(prompt, app_dir))
            .await
    }
}

#[async_trait]
impl CodeGenerator for ClaudeCliGenerator {
    async fn generate(&self, request: &GenerationRequest) -> ForgeResult<String> {
        self.run("code generation", &request.prompt, &request.app_dir)
            .await
    }

    async fn debug(&self, request: &DebugRequest) -> ForgeResult<String> {
        let prompt = crate::workflow::prompts::debug_prompt(request);
        self.run("code fix", &prompt, &request.app_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::subprocess::MockProcessRunner;

    fn generator(mock: &MockProcessRunner, attempts: u32) -> ClaudeCliGenerator {
        let settings = GeneratorSettings {
            retry: RetryPolicy {
                attempts,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                jitter: false,
                ..RetryPolicy::default()
            },
            ..GeneratorSettings::default()
        };
        ClaudeCliGenerator::new(Arc::new(mock.clone()), &settings)
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            prompt: "write a sink".to_string(),
            app_dir: std::env::temp_dir().join("quixforge-missing-app-dir"),
        }
    }

    #[tokio::test]
    async fn test_generate_extracts_code_and_sends_prompt_on_stdin() {
        let mock = MockProcessRunner::new();
        mock.add_success("```python\nprint('sink')\n```");

        let code = generator(&mock, 1).generate(&request()).await.unwrap();
        assert_eq!(code, "print('sink')\n");

        let calls = mock.get_call_history();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "claude");
        assert!(calls[0].args.contains(&"--print".to_string()));
        assert_eq!(calls[0].stdin.as_deref(), Some("write a sink"));
        assert!(calls[0].working_dir.is_none());
    }

    #[tokio::test]
    async fn test_overloaded_is_retried() {
        let mock = MockProcessRunner::new();
        mock.add_failure(1, "API Error: 529 Overloaded");
        mock.add_success("print('ok')");

        let code = generator(&mock, 3).generate(&request()).await.unwrap();
        assert_eq!(code, "print('ok')\n");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let mock = MockProcessRunner::new();
        mock.add_failure(2, "unknown option --bogus");

        let err = generator(&mock, 3).generate(&request()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::EXEC_GENERATOR_FAILED);
        assert_eq!(mock.call_count(), 1);
    }
}
