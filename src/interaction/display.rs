//! Terminal output: tagged status lines, framed blocks and spinners

use super::SpinnerHandle;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const RULE_WIDTH: usize = 60;

/// Kind of status line, which picks the prefix and the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Progress,
    Success,
    Warning,
    Error,
}

impl Tone {
    pub fn prefix(self) -> &'static str {
        match self {
            Tone::Info => "ℹ️ ",
            Tone::Progress => "🔄",
            Tone::Success => "✅",
            Tone::Warning => "⚠️ ",
            Tone::Error => "❌",
        }
    }

    fn to_stderr(self) -> bool {
        matches!(self, Tone::Warning | Tone::Error)
    }
}

/// Prefix a message for its tone
pub fn status_line(tone: Tone, message: &str) -> String {
    format!("{} {message}", tone.prefix())
}

/// Writes status lines and blocks to the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalDisplay;

impl TerminalDisplay {
    pub fn new() -> Self {
        Self
    }

    pub fn emit(&self, tone: Tone, message: &str) {
        let line = status_line(tone, message);
        if tone.to_stderr() {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }

    pub fn block(&self, title: &str, body: &str) {
        println!("\n{}", format_block(title, body));
    }

    pub fn spinner(&self, message: &str) -> Box<dyn SpinnerHandle> {
        Box::new(IndicatifSpinner::start(message))
    }
}

/// Render a titled block with a rule above and below the body
pub fn format_block(title: &str, body: &str) -> String {
    format!(
        "── {title} ──\n{}\n{}",
        body.trim_end(),
        "─".repeat(RULE_WIDTH)
    )
}

struct IndicatifSpinner(ProgressBar);

impl IndicatifSpinner {
    fn start(message: &str) -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");
        let bar = ProgressBar::new_spinner()
            .with_style(style)
            .with_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self(bar)
    }
}

impl SpinnerHandle for IndicatifSpinner {
    fn update_message(&mut self, message: &str) {
        self.0.set_message(message.to_string());
    }

    fn success(&mut self, message: &str) {
        self.0.finish_with_message(status_line(Tone::Success, message));
    }

    fn fail(&mut self, message: &str) {
        self.0.finish_with_message(status_line(Tone::Error, message));
    }
}

impl Drop for IndicatifSpinner {
    fn drop(&mut self) {
        if !self.0.is_finished() {
            self.0.finish_and_clear();
        }
    }
}
