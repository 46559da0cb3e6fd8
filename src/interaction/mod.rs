//! User interaction for the wizard
//!
//! Phases talk to the user only through [`UserInteraction`], which lets tests
//! drive a whole wizard run from a script.

pub mod display;
pub mod prompts;

pub use display::{format_block, status_line, TerminalDisplay, Tone};
pub use prompts::{TerminalPrompter, UserPrompter};

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait UserInteraction: Send + Sync {
    async fn prompt_yes_no(&self, message: &str) -> Result<bool>;

    /// Blank input falls back to `default`
    async fn prompt_text(&self, message: &str, default: Option<&str>) -> Result<String>;

    /// Prompt user to pick one of `choices`; returns the 0-based index
    async fn prompt_choice(&self, message: &str, choices: &[String]) -> Result<usize>;

    fn display_info(&self, message: &str);
    fn display_warning(&self, message: &str);
    fn display_error(&self, message: &str);
    fn display_progress(&self, message: &str);
    fn display_success(&self, message: &str);

    /// Show a titled block of text (code preview, logs)
    fn display_block(&self, title: &str, body: &str);

    fn start_spinner(&self, message: &str) -> Box<dyn SpinnerHandle>;
}

pub trait SpinnerHandle: Send + Sync {
    fn update_message(&mut self, message: &str);
    fn success(&mut self, message: &str);
    fn fail(&mut self, message: &str);
}

/// Stdin prompts plus terminal display
pub struct DefaultUserInteraction {
    prompter: TerminalPrompter,
    display: TerminalDisplay,
}

impl Default for DefaultUserInteraction {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultUserInteraction {
    pub fn new() -> Self {
        Self {
            prompter: TerminalPrompter::new(),
            display: TerminalDisplay::new(),
        }
    }
}

#[async_trait]
impl UserInteraction for DefaultUserInteraction {
    async fn prompt_yes_no(&self, message: &str) -> Result<bool> {
        self.prompter.prompt_yes_no(message).await
    }

    async fn prompt_text(&self, message: &str, default: Option<&str>) -> Result<String> {
        self.prompter.prompt_text(message, default).await
    }

    async fn prompt_choice(&self, message: &str, choices: &[String]) -> Result<usize> {
        self.prompter.prompt_choice(message, choices).await
    }

    fn display_info(&self, message: &str) {
        self.display.emit(Tone::Info, message);
    }

    fn display_warning(&self, message: &str) {
        self.display.emit(Tone::Warning, message);
    }

    fn display_error(&self, message: &str) {
        self.display.emit(Tone::Error, message);
    }

    fn display_progress(&self, message: &str) {
        self.display.emit(Tone::Progress, message);
    }

    fn display_success(&self, message: &str) {
        self.display.emit(Tone::Success, message);
    }

    fn display_block(&self, title: &str, body: &str) {
        self.display.block(title, body);
    }

    fn start_spinner(&self, message: &str) -> Box<dyn SpinnerHandle> {
        self.display.spinner(message)
    }
}

/// Truncate a preview to at most `max_lines` lines, noting how many were cut
pub fn preview_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= max_lines {
        return text.to_string();
    }
    let mut preview = lines[..max_lines].join("\n");
    preview.push_str(&format!("\n... ({} more lines)", lines.len() - max_lines));
    preview
}
