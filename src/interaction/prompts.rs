//! Line-oriented terminal prompts

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::io::{self, Write};

/// Source of answers to wizard questions
#[async_trait]
pub trait UserPrompter: Send + Sync {
    async fn prompt_yes_no(&self, message: &str) -> Result<bool>;

    /// Blank input returns `default` when one is given
    async fn prompt_text(&self, message: &str, default: Option<&str>) -> Result<String>;

    /// Returns the 0-based index of the picked entry
    async fn prompt_choice(&self, message: &str, choices: &[String]) -> Result<usize>;
}

/// Reads answers from stdin, one line each
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    pub fn new() -> Self {
        Self
    }
}

fn ask(question: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(question.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

/// Read one line without blocking the runtime. EOF is an error so a closed
/// stdin cannot spin a re-prompt loop.
async fn read_answer() -> Result<String> {
    let (read, line) = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().read_line(&mut line).map(|read| (read, line))
    })
    .await??;
    if read == 0 {
        bail!("stdin closed while waiting for an answer");
    }
    Ok(line.trim().to_string())
}

/// Parse a yes/no answer; blank means yes
pub fn parse_yes_no(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "" | "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Map a 1-based menu number to an index
pub fn parse_choice(input: &str, count: usize) -> Option<usize> {
    match input.trim().parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Some(n - 1),
        _ => None,
    }
}

/// Numbered menu followed by the input hint
pub fn render_menu(message: &str, choices: &[String]) -> String {
    let mut menu = format!("{message}\n");
    for (number, choice) in (1..).zip(choices) {
        menu.push_str(&format!("  {number}. {choice}\n"));
    }
    menu.push_str(&format!("Choose 1-{}: ", choices.len()));
    menu
}

#[async_trait]
impl UserPrompter for TerminalPrompter {
    async fn prompt_yes_no(&self, message: &str) -> Result<bool> {
        loop {
            ask(&format!("{message} [Y/n]: "))?;
            match parse_yes_no(&read_answer().await?) {
                Some(answer) => return Ok(answer),
                None => println!("Please answer y or n."),
            }
        }
    }

    async fn prompt_text(&self, message: &str, default: Option<&str>) -> Result<String> {
        match default.filter(|d| !d.is_empty()) {
            Some(default) => ask(&format!("{message} [{default}]: "))?,
            None => ask(&format!("{message}: "))?,
        }
        let answer = read_answer().await?;
        Ok(match default {
            Some(default) if answer.is_empty() => default.to_string(),
            _ => answer,
        })
    }

    async fn prompt_choice(&self, message: &str, choices: &[String]) -> Result<usize> {
        if choices.is_empty() {
            bail!("Nothing to choose from for '{message}'");
        }
        ask(&render_menu(message, choices))?;
        loop {
            if let Some(index) = parse_choice(&read_answer().await?, choices.len()) {
                return Ok(index);
            }
            ask(&format!("Enter a number between 1 and {}: ", choices.len()))?;
        }
    }
}
