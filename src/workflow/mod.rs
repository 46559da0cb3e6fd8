//! The source and sink wizards
//!
//! A run walks a fixed sequence of [`WorkflowStep`]s. Each step may reuse a
//! cached answer, and any prompt can send the user back one step.

mod deploy;
pub mod prompts;
mod runner;

pub use deploy::DeployPhase;
pub use runner::{WorkflowOptions, WorkflowRunner};

use crate::context::WorkflowType;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    Prerequisites,
    Requirements,
    Technology,
    /// Sample message from the input topic; sinks only
    Schema,
    Credentials,
    CodeGeneration,
    ConnectionTest,
    SandboxTest,
    Deployment,
}

impl WorkflowStep {
    /// Steps in the order a workflow runs them
    pub fn sequence(workflow: WorkflowType) -> Vec<WorkflowStep> {
        use WorkflowStep::*;
        let mut steps = vec![Prerequisites, Requirements, Technology];
        if workflow == WorkflowType::Sink {
            steps.push(Schema);
        }
        steps.extend([Credentials, CodeGeneration, ConnectionTest, SandboxTest, Deployment]);
        steps
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Prerequisites => "Workspace and topic",
            Self::Requirements => "Requirements",
            Self::Technology => "Technology",
            Self::Schema => "Message schema",
            Self::Credentials => "Connection settings",
            Self::CodeGeneration => "Code generation",
            Self::ConnectionTest => "Connection test",
            Self::SandboxTest => "Sandbox test",
            Self::Deployment => "Deployment",
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_sinks_ask_for_a_schema() {
        let source = WorkflowStep::sequence(WorkflowType::Source);
        let sink = WorkflowStep::sequence(WorkflowType::Sink);

        assert!(!source.contains(&WorkflowStep::Schema));
        assert_eq!(sink.len(), source.len() + 1);
        assert_eq!(sink[3], WorkflowStep::Schema);
        assert_eq!(source.last(), Some(&WorkflowStep::Deployment));
    }
}
