use super::lock;
use crate::ai::{CodeGenerator, DebugRequest, GenerationRequest, GeneratorError};
use crate::error::ForgeResult;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Default)]
struct State {
    generated: VecDeque<Option<String>>,
    fixes: VecDeque<Option<String>>,
    generate_requests: Vec<GenerationRequest>,
    debug_requests: Vec<DebugRequest>,
}

/// Scripted code generator.
///
/// Each queued entry is either code or `None` for a failed call. An empty
/// queue fails too.
#[derive(Default)]
pub struct MockGenerator {
    state: Mutex<State>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generated(self, code: &[&str]) -> Self {
        lock(&self.state)
            .generated
            .extend(code.iter().map(|c| Some(c.to_string())));
        self
    }

    pub fn with_fixes(self, fixes: &[Option<&str>]) -> Self {
        lock(&self.state)
            .fixes
            .extend(fixes.iter().map(|f| f.map(str::to_string)));
        self
    }

    pub fn generate_requests(&self) -> Vec<GenerationRequest> {
        lock(&self.state).generate_requests.clone()
    }

    pub fn debug_requests(&self) -> Vec<DebugRequest> {
        lock(&self.state).debug_requests.clone()
    }
}

#[async_trait]
impl CodeGenerator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> ForgeResult<String> {
        let mut state = lock(&self.state);
        state.generate_requests.push(request.clone());
        state
            .generated
            .pop_front()
            .flatten()
            .ok_or_else(|| GeneratorError::Failed("scripted generation failure".to_string()).into())
    }

    async fn debug(&self, request: &DebugRequest) -> ForgeResult<String> {
        let mut state = lock(&self.state);
        state.debug_requests.push(request.clone());
        state
            .fixes
            .pop_front()
            .flatten()
            .ok_or_else(|| GeneratorError::Failed("scripted debug failure".to_string()).into())
    }
}
