//! Connection tests and sandbox runs in a remote IDE session
//!
//! Both test modes share one loop: upload the code and its manifest files,
//! run the entry point, classify the logs, and on failure pick a
//! [`DebugAction`] that either repairs the code and loops or ends the phase.

mod classify;
mod debug;
mod orchestrator;

pub use classify::classify_logs;
pub use debug::DEBUG_MENU;
pub use orchestrator::{SandboxOrchestrator, TestSubject};

use std::fmt;

/// Outcome of classifying one run's logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Error,
    Uncertain,
}

/// One execution attempt. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxRunResult {
    pub logs: String,
    pub status: RunStatus,
    pub is_timeout: bool,
}

impl SandboxRunResult {
    pub fn from_logs(logs: String) -> Self {
        let status = classify_logs(&logs, false);
        Self {
            logs,
            status,
            is_timeout: false,
        }
    }

    pub fn timed_out(logs: String) -> Self {
        Self {
            logs,
            status: RunStatus::Error,
            is_timeout: true,
        }
    }

    /// The platform refused the upload or the run; the message stands in
    /// for the logs
    pub fn platform_error(message: String) -> Self {
        Self {
            logs: message,
            status: RunStatus::Error,
            is_timeout: false,
        }
    }
}

/// What to do after a failed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugAction {
    /// The generator produced replacement code
    ClaudeFixed(String),
    /// The user edits the local copy, then the code is re-read
    ManualFix,
    /// The user fixed the code inside the IDE session; re-run without uploading
    FixedInIde,
    /// Ask the generator again with the user's guidance
    ManualFeedback(String),
    /// Keep feeding failures to the generator without prompting
    AutoDebug,
    /// The generator could not produce a fix
    AutoDebugFailed,
    Abort,
}

/// Which script the loop runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestMode {
    /// Generated connectivity probe
    ConnectionTest,
    /// The full application
    Sandbox,
}

impl TestMode {
    pub fn entry_point(&self) -> &'static str {
        match self {
            TestMode::ConnectionTest => "connection_test.py",
            TestMode::Sandbox => "main.py",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TestMode::ConnectionTest => "connection test",
            TestMode::Sandbox => "sandbox test",
        }
    }
}

impl fmt::Display for TestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of a wizard phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseOutcome {
    pub success: bool,
    pub message: String,
}

impl PhaseOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
