use super::lock;
use crate::interaction::{SpinnerHandle, UserInteraction};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum ChoiceAnswer {
    Index(usize),
    /// Pick the first choice starting with this text
    Label(String),
}

#[derive(Default)]
struct State {
    texts: VecDeque<String>,
    yes_no: VecDeque<bool>,
    choices: VecDeque<ChoiceAnswer>,
    prompts: Vec<String>,
    infos: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    successes: Vec<String>,
    progress: Vec<String>,
    blocks: Vec<(String, String)>,
}

/// Scripted user: answers come from queues, output is recorded.
///
/// Running out of scripted answers is an error, which keeps a test from
/// looping forever on an unexpected prompt.
#[derive(Default)]
pub struct MockUserInteraction {
    state: Mutex<State>,
}

impl MockUserInteraction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, answers: &[&str]) -> Self {
        lock(&self.state)
            .texts
            .extend(answers.iter().map(|a| a.to_string()));
        self
    }

    pub fn with_yes_no(self, answers: &[bool]) -> Self {
        lock(&self.state).yes_no.extend(answers.iter().copied());
        self
    }

    pub fn with_choices(self, indices: &[usize]) -> Self {
        lock(&self.state)
            .choices
            .extend(indices.iter().map(|i| ChoiceAnswer::Index(*i)));
        self
    }

    pub fn with_choice_labels(self, labels: &[&str]) -> Self {
        lock(&self.state)
            .choices
            .extend(labels.iter().map(|l| ChoiceAnswer::Label(l.to_string())));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.state).prompts.clone()
    }

    pub fn infos(&self) -> Vec<String> {
        lock(&self.state).infos.clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        lock(&self.state).warnings.clone()
    }

    pub fn errors(&self) -> Vec<String> {
        lock(&self.state).errors.clone()
    }

    pub fn successes(&self) -> Vec<String> {
        lock(&self.state).successes.clone()
    }

    pub fn blocks(&self) -> Vec<(String, String)> {
        lock(&self.state).blocks.clone()
    }

    /// Scripted answers not consumed yet
    pub fn remaining_answers(&self) -> usize {
        let state = lock(&self.state);
        state.texts.len() + state.yes_no.len() + state.choices.len()
    }
}

#[async_trait]
impl UserInteraction for MockUserInteraction {
    async fn prompt_yes_no(&self, message: &str) -> Result<bool> {
        let mut state = lock(&self.state);
        state.prompts.push(message.to_string());
        match state.yes_no.pop_front() {
            Some(answer) => Ok(answer),
            None => bail!("no scripted yes/no answer for '{message}'"),
        }
    }

    async fn prompt_text(&self, message: &str, default: Option<&str>) -> Result<String> {
        let mut state = lock(&self.state);
        state.prompts.push(message.to_string());
        match (state.texts.pop_front(), default) {
            (Some(answer), Some(default)) if answer.trim().is_empty() => Ok(default.to_string()),
            (Some(answer), _) => Ok(answer),
            (None, _) => bail!("no scripted text answer for '{message}'"),
        }
    }

    async fn prompt_choice(&self, message: &str, choices: &[String]) -> Result<usize> {
        let mut state = lock(&self.state);
        state.prompts.push(message.to_string());
        let answer = match state.choices.pop_front() {
            Some(answer) => answer,
            None => bail!("no scripted choice for '{message}' (options: {choices:?})"),
        };
        match answer {
            ChoiceAnswer::Index(index) if index < choices.len() => Ok(index),
            ChoiceAnswer::Index(index) => {
                bail!("scripted choice {index} out of range for '{message}' (options: {choices:?})")
            }
            ChoiceAnswer::Label(label) => match choices.iter().position(|c| c.starts_with(&label)) {
                Some(index) => Ok(index),
                None => bail!("no option starting with '{label}' for '{message}' (options: {choices:?})"),
            },
        }
    }

    fn display_info(&self, message: &str) {
        lock(&self.state).infos.push(message.to_string());
    }

    fn display_warning(&self, message: &str) {
        lock(&self.state).warnings.push(message.to_string());
    }

    fn display_error(&self, message: &str) {
        lock(&self.state).errors.push(message.to_string());
    }

    fn display_progress(&self, message: &str) {
        lock(&self.state).progress.push(message.to_string());
    }

    fn display_success(&self, message: &str) {
        lock(&self.state).successes.push(message.to_string());
    }

    fn display_block(&self, title: &str, body: &str) {
        lock(&self.state)
            .blocks
            .push((title.to_string(), body.to_string()));
    }

    fn start_spinner(&self, message: &str) -> Box<dyn SpinnerHandle> {
        lock(&self.state).progress.push(message.to_string());
        Box::new(NoopSpinner)
    }
}

struct NoopSpinner;

impl SpinnerHandle for NoopSpinner {
    fn update_message(&mut self, _message: &str) {}
    fn success(&mut self, _message: &str) {}
    fn fail(&mut self, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_answers_in_order() {
        let ui = MockUserInteraction::new()
            .with_text(&["a", ""])
            .with_yes_no(&[false])
            .with_choice_labels(&["Abort"]);

        assert_eq!(ui.prompt_text("first", None).await.unwrap(), "a");
        assert_eq!(ui.prompt_text("second", Some("dflt")).await.unwrap(), "dflt");
        assert!(!ui.prompt_yes_no("ok?").await.unwrap());
        let choices = vec!["Retry".to_string(), "Abort workflow".to_string()];
        assert_eq!(ui.prompt_choice("next", &choices).await.unwrap(), 1);
        assert_eq!(ui.remaining_answers(), 0);
        assert!(ui.prompt_text("third", None).await.is_err());
    }
}
