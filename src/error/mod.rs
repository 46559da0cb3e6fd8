use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;

pub mod codes;
pub mod helpers;

pub use codes::{describe_error_code, ErrorCode};
pub use helpers::common;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// The unified error type for quixforge
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Session error: {message}")]
    Session {
        code: u16,
        message: String,
        session_id: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Cache error: {message}")]
    Storage {
        code: u16,
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Execution error: {message}")]
    Execution {
        code: u16,
        message: String,
        command: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Workflow error: {message}")]
    Workflow {
        code: u16,
        message: String,
        step: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Platform error: {message}")]
    Platform {
        code: u16,
        message: String,
        status: Option<u16>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Validation error: {message}")]
    Validation {
        code: u16,
        message: String,
        field: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    /// The user asked to return to the previous wizard step.
    #[error("navigate back")]
    NavigateBack,

    /// The user interrupted the workflow (Ctrl-C).
    #[error("workflow aborted by user")]
    Interrupted,

    #[error("[E{code:04}] {message}")]
    Other {
        code: u16,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl ForgeError {
    /// Create a configuration error with default code
    pub fn config(message: impl Into<String>) -> Self {
        Self::config_with_code(ErrorCode::CONFIG_GENERIC, message)
    }

    /// Create a configuration error with specific code
    pub fn config_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create a session error with specific code and session ID
    pub fn session_with_code(
        code: u16,
        message: impl Into<String>,
        session_id: Option<String>,
    ) -> Self {
        Self::Session {
            code,
            message: message.into(),
            session_id,
            source: None,
        }
    }

    /// Create a storage error with specific code and path
    pub fn storage_with_code(code: u16, message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Storage {
            code,
            message: message.into(),
            path,
            source: None,
        }
    }

    /// Create an execution error with default code
    pub fn execution(message: impl Into<String>) -> Self {
        Self::execution_with_code(ErrorCode::EXEC_GENERIC, message, None)
    }

    /// Create an execution error with specific code
    pub fn execution_with_code(
        code: u16,
        message: impl Into<String>,
        command: Option<String>,
    ) -> Self {
        Self::Execution {
            code,
            message: message.into(),
            command,
            source: None,
        }
    }

    /// Create a workflow error with default code
    pub fn workflow(message: impl Into<String>) -> Self {
        Self::workflow_with_code(ErrorCode::WORKFLOW_GENERIC, message, None)
    }

    /// Create a workflow error with specific code and step
    pub fn workflow_with_code(code: u16, message: impl Into<String>, step: Option<String>) -> Self {
        Self::Workflow {
            code,
            message: message.into(),
            step,
            source: None,
        }
    }

    /// Create a platform API error
    pub fn platform(code: u16, message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Platform {
            code,
            message: message.into(),
            status,
            source: None,
        }
    }

    /// Create a validation error with specific code and field
    pub fn validation_with_code(
        code: u16,
        message: impl Into<String>,
        field: Option<String>,
    ) -> Self {
        Self::Validation {
            code,
            message: message.into(),
            field,
            source: None,
        }
    }

    /// Create a generic other error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            code: ErrorCode::OTHER_GENERIC,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error to this error
    pub fn with_source(mut self, source: impl Into<BoxedSource>) -> Self {
        match &mut self {
            Self::Config { source: src, .. }
            | Self::Session { source: src, .. }
            | Self::Storage { source: src, .. }
            | Self::Execution { source: src, .. }
            | Self::Workflow { source: src, .. }
            | Self::Platform { source: src, .. }
            | Self::Validation { source: src, .. }
            | Self::Other { source: src, .. } => {
                *src = Some(source.into());
            }
            Self::NavigateBack | Self::Interrupted => {}
        }
        self
    }

    /// Add context to the error message
    pub fn with_context(mut self, context: impl Display) -> Self {
        match &mut self {
            Self::Config { message, .. }
            | Self::Session { message, .. }
            | Self::Storage { message, .. }
            | Self::Execution { message, .. }
            | Self::Workflow { message, .. }
            | Self::Platform { message, .. }
            | Self::Validation { message, .. }
            | Self::Other { message, .. } => {
                *message = format!("{}: {}", message, context);
            }
            Self::NavigateBack | Self::Interrupted => {}
        }
        self
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Session { .. } => 3,
            Self::Storage { .. } => 4,
            Self::Execution { .. } => 5,
            Self::Workflow { .. } => 6,
            Self::Platform { .. } => 7,
            Self::Validation { .. } => 8,
            Self::NavigateBack => 0,
            Self::Interrupted => 130,
            Self::Other { .. } => 1,
        }
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Config { code, .. }
            | Self::Session { code, .. }
            | Self::Storage { code, .. }
            | Self::Execution { code, .. }
            | Self::Workflow { code, .. }
            | Self::Platform { code, .. }
            | Self::Validation { code, .. }
            | Self::Other { code, .. } => *code,
            Self::NavigateBack => ErrorCode::WORKFLOW_NAVIGATE_BACK,
            Self::Interrupted => ErrorCode::WORKFLOW_CANCELLED,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Config { message, .. } => format!("Configuration problem: {}", message),
            Self::Session {
                message,
                session_id,
                ..
            } => match session_id {
                Some(id) => format!("Session {} error: {}", id, message),
                None => format!("Session error: {}", message),
            },
            Self::Storage { message, path, .. } => match path {
                Some(p) => format!("Cache error at {}: {}", p.display(), message),
                None => format!("Cache error: {}", message),
            },
            Self::Execution {
                message, command, ..
            } => match command {
                Some(cmd) => format!("Command '{}' failed: {}", cmd, message),
                None => format!("Execution error: {}", message),
            },
            Self::Workflow { message, step, .. } => match step {
                Some(s) => format!("Workflow error at step '{}': {}", s, message),
                None => format!("Workflow error: {}", message),
            },
            Self::Platform {
                message, status, ..
            } => match status {
                Some(s) => format!("Platform API error (HTTP {}): {}", s, message),
                None => format!("Platform API error: {}", message),
            },
            Self::Validation { message, field, .. } => match field {
                Some(f) => format!("Validation error for '{}': {}", f, message),
                None => format!("Validation error: {}", message),
            },
            Self::NavigateBack => "Going back".to_string(),
            Self::Interrupted => "Workflow aborted by user".to_string(),
            Self::Other { message, .. } => message.clone(),
        }
    }

    /// True for the control-flow signals that may cross phase boundaries
    pub fn is_control_signal(&self) -> bool {
        matches!(self, Self::NavigateBack | Self::Interrupted)
    }

    /// True when the remote session backing a call has disappeared
    pub fn is_session_not_found(&self) -> bool {
        matches!(
            self,
            Self::Session {
                code: ErrorCode::SESSION_NOT_FOUND,
                ..
            }
        )
    }

    /// True for errors worth retrying after a backoff
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Platform { code, status, .. } => {
                *code == ErrorCode::PLATFORM_RATE_LIMITED
                    || *code == ErrorCode::PLATFORM_UNAVAILABLE
                    || *code == ErrorCode::PLATFORM_TRANSPORT
                    || matches!(status, Some(429) | Some(502) | Some(503) | Some(504))
            }
            Self::Execution { code, .. } => *code == ErrorCode::EXEC_GENERATOR_OVERLOADED,
            _ => false,
        }
    }
}

/// Result type alias using ForgeError
pub type ForgeResult<T> = std::result::Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_code() {
        let err = ForgeError::config_with_code(ErrorCode::CONFIG_NOT_FOUND, "missing token");
        assert_eq!(
            err.to_string(),
            "[E1001] Configuration error: missing token"
        );
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_with_context_appends() {
        let err = ForgeError::workflow("step failed").with_context("sandbox");
        assert!(err.to_string().contains("step failed: sandbox"));
    }

    #[test]
    fn test_session_not_found_detection() {
        let err = common::session_not_found("abc");
        assert!(err.is_session_not_found());
        assert!(!ForgeError::other("x").is_session_not_found());
    }

    #[test]
    fn test_transient_classification() {
        let rate_limited =
            ForgeError::platform(ErrorCode::PLATFORM_RATE_LIMITED, "slow down", Some(429));
        assert!(rate_limited.is_transient());

        let unauthorized =
            ForgeError::platform(ErrorCode::PLATFORM_UNAUTHORIZED, "bad token", Some(401));
        assert!(!unauthorized.is_transient());

        let overloaded =
            ForgeError::execution_with_code(ErrorCode::EXEC_GENERATOR_OVERLOADED, "busy", None);
        assert!(overloaded.is_transient());
    }

    #[test]
    fn test_control_signals() {
        assert!(ForgeError::NavigateBack.is_control_signal());
        assert!(ForgeError::Interrupted.is_control_signal());
        assert_eq!(ForgeError::Interrupted.exit_code(), 130);
        assert!(!ForgeError::workflow("x").is_control_signal());
    }

    #[test]
    fn test_user_message_for_platform_error() {
        let err = ForgeError::platform(ErrorCode::PLATFORM_NOT_FOUND, "no such app", Some(404));
        assert_eq!(err.user_message(), "Platform API error (HTTP 404): no such app");
    }
}
