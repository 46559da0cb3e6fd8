use std::path::Path;
use std::time::Duration;

use crate::subprocess::ProcessCommand;

/// Chained construction of a [`ProcessCommand`]
pub struct ProcessCommandBuilder(ProcessCommand);

impl ProcessCommandBuilder {
    pub fn new(program: impl Into<String>) -> Self {
        Self(ProcessCommand {
            program: program.into(),
            args: Vec::new(),
            env: Default::default(),
            working_dir: None,
            timeout: None,
            stdin: None,
        })
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.0.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.0.working_dir = Some(dir.to_path_buf());
        self
    }

    /// Kill the process if it runs longer than `limit`
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.0.timeout = Some(limit);
        self
    }

    /// Text piped to the process, followed by EOF
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.0.stdin = Some(input.into());
        self
    }

    pub fn build(self) -> ProcessCommand {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claude_invocation_shape() {
        let cmd = ProcessCommandBuilder::new("claude")
            .args(["--print", "--output-format", "text"])
            .args(["--model", "sonnet"])
            .env("NO_COLOR", "1")
            .current_dir(Path::new("/tmp/app"))
            .timeout(Duration::from_secs(5))
            .stdin("prompt")
            .build();

        assert_eq!(cmd.program, "claude");
        assert_eq!(cmd.args, vec!["--print", "--output-format", "text", "--model", "sonnet"]);
        assert_eq!(cmd.env.get("NO_COLOR").map(String::as_str), Some("1"));
        assert_eq!(cmd.working_dir.as_deref(), Some(Path::new("/tmp/app")));
        assert_eq!(cmd.timeout, Some(Duration::from_secs(5)));
        assert_eq!(cmd.stdin.as_deref(), Some("prompt"));
    }
}
