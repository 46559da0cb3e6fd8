use crate::error::{ErrorCode, ForgeError};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Process timed out after {0:?}")]
    Timeout(Duration),

    #[error("Process exited with code {code}: {stderr}")]
    ExitCode { code: i32, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mock expectation not met: {0}")]
    MockExpectationNotMet(String),
}

impl From<ProcessError> for ForgeError {
    fn from(err: ProcessError) -> Self {
        let (code, command) = match &err {
            ProcessError::CommandNotFound(cmd) => {
                (ErrorCode::EXEC_COMMAND_NOT_FOUND, Some(cmd.clone()))
            }
            ProcessError::Timeout(_) => (ErrorCode::EXEC_TIMEOUT, None),
            ProcessError::ExitCode { .. } => (ErrorCode::EXEC_SUBPROCESS_FAILED, None),
            ProcessError::Io(_) | ProcessError::MockExpectationNotMet(_) => {
                (ErrorCode::EXEC_GENERIC, None)
            }
        };
        ForgeError::execution_with_code(code, err.to_string(), command).with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_variant() {
        let err: ForgeError = ProcessError::CommandNotFound("claude".to_string()).into();
        assert_eq!(err.code(), ErrorCode::EXEC_COMMAND_NOT_FOUND);

        let err: ForgeError = ProcessError::Timeout(Duration::from_secs(1)).into();
        assert_eq!(err.code(), ErrorCode::EXEC_TIMEOUT);

        let err: ForgeError = ProcessError::ExitCode {
            code: 2,
            stderr: "bad flag".to_string(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::EXEC_SUBPROCESS_FAILED);
        assert!(err.to_string().contains("bad flag"));
    }
}
