use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::error::ProcessError;
use super::runner::{ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner};

/// Scripted runner: responses are consumed in order, calls are recorded
#[derive(Clone, Default)]
pub struct MockProcessRunner {
    responses: Arc<Mutex<Vec<Result<ProcessOutput, ProcessError>>>>,
    call_history: Arc<Mutex<Vec<ProcessCommand>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_response(&self, response: Result<ProcessOutput, ProcessError>) {
        lock(&self.responses).push(response);
    }

    pub fn add_success(&self, stdout: &str) {
        self.add_response(Ok(ProcessOutput {
            status: ExitStatus::Success,
            stdout: stdout.to_string(),
            stderr: String::new(),
            duration: Duration::from_millis(10),
        }));
    }

    pub fn add_failure(&self, code: i32, stderr: &str) {
        self.add_response(Ok(ProcessOutput {
            status: ExitStatus::Error(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
            duration: Duration::from_millis(10),
        }));
    }

    pub fn get_call_history(&self) -> Vec<ProcessCommand> {
        lock(&self.call_history).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.call_history).len()
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let program = command.program.clone();
        lock(&self.call_history).push(command);

        let mut responses = lock(&self.responses);
        if responses.is_empty() {
            return Err(ProcessError::MockExpectationNotMet(format!(
                "No response configured for {program}"
            )));
        }
        responses.remove(0)
    }
}
