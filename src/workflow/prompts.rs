//! Prompt text sent to the code generator

use crate::ai::DebugRequest;
use crate::context::{WorkflowContext, WorkflowType};
use crate::env_vars::{EnvVarSpec, InputType};
use std::fmt::Write;

const DEPENDENCY_RULES: &str = "\
List every third-party package the code needs in a comment block at the top of the file:
# DEPENDENCIES:
# pip install <package> <package>==<version>
# END_DEPENDENCIES
";

const ENV_RULES: &str = "\
Read every setting from environment variables with os.environ.get(\"NAME\") or os.environ[\"NAME\"].
Never hard-code credentials.
";

fn describe_variables(variables: &[EnvVarSpec]) -> String {
    if variables.is_empty() {
        return "(none)\n".to_string();
    }
    let mut out = String::new();
    for var in variables {
        let kind = match var.input_type {
            InputType::Secret => "secret",
            InputType::InputTopic => "input topic name",
            InputType::OutputTopic => "output topic name",
            InputType::FreeText => "text",
        };
        let _ = write!(out, "- {} ({kind}", var.name);
        if !var.required {
            out.push_str(", optional");
        }
        out.push(')');
        if let Some(description) = var.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = write!(out, ": {description}");
        }
        out.push('\n');
    }
    out
}

fn describe_target(ctx: &WorkflowContext) -> String {
    let technology = ctx.technology.technology.as_deref().unwrap_or("the external system");
    let topic = ctx.workspace.topic_name.as_deref().unwrap_or("the configured topic");
    match ctx.workflow_type {
        WorkflowType::Source => format!(
            "a Quix Streams source application that reads data from {technology} and produces it to the topic named by the `output` environment variable (currently '{topic}')"
        ),
        WorkflowType::Sink => format!(
            "a Quix Streams sink application that consumes the topic named by the `input` environment variable (currently '{topic}') and writes the messages to {technology}"
        ),
    }
}

/// Prompt for the full application
pub fn generation_prompt(ctx: &WorkflowContext, variables: &[EnvVarSpec]) -> String {
    let mut prompt = format!("Write {} in Python.\n\n", describe_target(ctx));

    if let Some(template) = &ctx.technology.template {
        let _ = writeln!(prompt, "Base the structure on the '{template}' template.");
    }
    if let Some(requirements) = &ctx.technology.requirements {
        let _ = writeln!(prompt, "\nRequirements from the user:\n{}", requirements.trim());
    }
    if let Some(sample) = &ctx.code_generation.schema_sample {
        let _ = writeln!(prompt, "\nSample message from the input topic:\n{}", sample.trim());
    }

    let _ = write!(
        prompt,
        "\nEnvironment variables available:\n{}\n{ENV_RULES}{DEPENDENCY_RULES}",
        describe_variables(variables)
    );
    prompt.push_str(
        "Log progress to stdout, including how many messages were processed.\n\
         Reply with the complete main.py in a single ```python code block.\n",
    );
    prompt
}

/// Prompt for a short connectivity probe
pub fn connection_test_prompt(ctx: &WorkflowContext, variables: &[EnvVarSpec]) -> String {
    let technology = ctx
        .technology
        .technology
        .as_deref()
        .unwrap_or("the external system");
    let verb = match ctx.workflow_type {
        WorkflowType::Source => "read a few records from",
        WorkflowType::Sink => "check that it can write to",
    };

    format!(
        "Write a short Python script that connects to {technology} and tries to {verb} it.\n\
         It must not touch any Kafka topic.\n\n\
         Environment variables available:\n{}\n{ENV_RULES}{DEPENDENCY_RULES}\
         Print CONNECTION_TEST_PASSED on success. On failure let the exception propagate.\n\
         Reply with the complete script in a single ```python code block.\n",
        describe_variables(variables)
    )
}

/// Prompt asking for a corrected version of failing code
pub fn debug_prompt(request: &DebugRequest) -> String {
    let mut prompt = format!(
        "The following Python code is supposed to {}.\nIt failed when run.\n\n\
         Code:\n```python\n{}\n```\n\nLogs:\n```\n{}\n```\n",
        request.goal.trim(),
        request.code.trim_end(),
        request.logs.trim_end()
    );
    if let Some(feedback) = request.feedback.as_deref().filter(|f| !f.trim().is_empty()) {
        let _ = writeln!(prompt, "\nGuidance from the user:\n{}", feedback.trim());
    }
    prompt.push_str(
        "\nFix the problem. Keep the DEPENDENCIES block accurate.\n\
         Reply with the complete corrected file in a single ```python code block.\n",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn context() -> WorkflowContext {
        let mut ctx = WorkflowContext::new(WorkflowType::Sink);
        ctx.technology.technology = Some("PostgreSQL".to_string());
        ctx.technology.requirements = Some("write every message to the events table".to_string());
        ctx.workspace.topic_name = Some("events".to_string());
        ctx
    }

    #[test]
    fn test_generation_prompt_mentions_context() {
        let mut secret = EnvVarSpec::free_text("PG_PASSWORD");
        secret.input_type = InputType::Secret;
        let prompt = generation_prompt(&context(), &[EnvVarSpec::free_text("PG_HOST"), secret]);

        assert!(prompt.contains("PostgreSQL"));
        assert!(prompt.contains("'events'"));
        assert!(prompt.contains("events table"));
        assert!(prompt.contains("- PG_PASSWORD (secret"));
        assert!(prompt.contains("# DEPENDENCIES:"));
    }

    #[test]
    fn test_connection_prompt_requires_marker() {
        let prompt = connection_test_prompt(&context(), &[]);
        assert!(prompt.contains("CONNECTION_TEST_PASSED"));
        assert!(prompt.contains("(none)"));
    }

    #[test]
    fn test_debug_prompt_includes_feedback() {
        let request = DebugRequest {
            code: "import psycopg2\n".to_string(),
            logs: "OperationalError: timeout".to_string(),
            feedback: Some("the port is 5433".to_string()),
            goal: "write rows to postgres".to_string(),
            app_dir: PathBuf::from("."),
        };
        let prompt = debug_prompt(&request);
        assert!(prompt.contains("OperationalError: timeout"));
        assert!(prompt.contains("the port is 5433"));
        assert!(prompt.contains("write rows to postgres"));
    }
}
