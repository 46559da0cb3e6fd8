//! Import statement scanner for Python source
//!
//! A small tokenizer splits the source into logical lines the way Python does
//! (bracket continuation, backslash continuation, `;` separators), skipping
//! strings and comments. Import statements are then read off the token
//! stream. Malformed source (unbalanced brackets, unterminated strings) is
//! rejected so the caller can fall back to line-based matching.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("unterminated string starting on line {0}")]
    UnterminatedString(usize),

    #[error("unbalanced '{found}' on line {line}")]
    UnbalancedBracket { found: char, line: usize },

    #[error("unclosed bracket opened on line {0}")]
    UnclosedBracket(usize),
}

/// One imported module as written in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedModule {
    /// Full dotted path, e.g. `google.cloud.bigquery`
    pub path: String,
    /// `from .x import y` and friends
    pub relative: bool,
}

impl ImportedModule {
    pub fn top_level(&self) -> &str {
        self.path.split('.').next().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Name(String),
    Dot,
    Comma,
    Colon,
    Open,
    Close,
    Other,
}

/// Split source into logical lines of tokens
fn tokenize(source: &str) -> Result<Vec<Vec<Token>>, ScanError> {
    let chars: Vec<char> = source.chars().collect();
    let mut lines = Vec::new();
    let mut current = Vec::new();
    let mut brackets: Vec<(char, usize)> = Vec::new();
    let mut line_no = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line_no += 1;
                if brackets.is_empty() && !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                i += 1;
            }
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '\\' if chars.get(i + 1) == Some(&'\n') => {
                line_no += 1;
                i += 2;
            }
            '\\' if chars.get(i + 1) == Some(&'\r') && chars.get(i + 2) == Some(&'\n') => {
                line_no += 1;
                i += 3;
            }
            '\'' | '"' => {
                i = skip_string(&chars, i, &mut line_no)?;
                current.push(Token::Other);
            }
            '(' | '[' | '{' => {
                brackets.push((c, line_no));
                current.push(Token::Open);
                i += 1;
            }
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match brackets.pop() {
                    Some((open, _)) if open == expected => {}
                    _ => return Err(ScanError::UnbalancedBracket { found: c, line: line_no }),
                }
                current.push(Token::Close);
                i += 1;
            }
            ';' if brackets.is_empty() => {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                i += 1;
            }
            '.' => {
                current.push(Token::Dot);
                i += 1;
            }
            ',' => {
                current.push(Token::Comma);
                i += 1;
            }
            ':' => {
                current.push(Token::Colon);
                i += 1;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                // String prefixes such as f"..." or rb'...' belong to the string
                if i < chars.len() && (chars[i] == '\'' || chars[i] == '"') && is_string_prefix(&name) {
                    continue;
                }
                current.push(Token::Name(name));
            }
            c if c.is_whitespace() => i += 1,
            _ => {
                current.push(Token::Other);
                i += 1;
            }
        }
    }

    if let Some((_, opened)) = brackets.first() {
        return Err(ScanError::UnclosedBracket(*opened));
    }
    if !current.is_empty() {
        lines.push(current);
    }
    Ok(lines)
}

fn is_string_prefix(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "r" | "b" | "f" | "u" | "rb" | "br" | "fr" | "rf"
    )
}

/// Skip a string literal starting at `start`; returns the index after it
fn skip_string(chars: &[char], start: usize, line_no: &mut usize) -> Result<usize, ScanError> {
    let quote = chars[start];
    let opened_on = *line_no;
    let triple = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
    let mut i = if triple { start + 3 } else { start + 1 };

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                if chars.get(i + 1) == Some(&'\n') {
                    *line_no += 1;
                }
                i += 2;
            }
            '\n' if !triple => return Err(ScanError::UnterminatedString(opened_on)),
            '\n' => {
                *line_no += 1;
                i += 1;
            }
            c if c == quote => {
                if !triple {
                    return Ok(i + 1);
                }
                if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                    return Ok(i + 3);
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    Err(ScanError::UnterminatedString(opened_on))
}

fn is_name(token: Option<&Token>, name: &str) -> bool {
    matches!(token, Some(Token::Name(n)) if n == name)
}

/// Read a dotted name starting at `pos`; returns it and the next position
fn dotted_name(tokens: &[Token], mut pos: usize) -> Option<(String, usize)> {
    let mut parts = Vec::new();
    loop {
        match tokens.get(pos) {
            Some(Token::Name(n)) => {
                parts.push(n.as_str());
                pos += 1;
            }
            _ => return None,
        }
        if tokens.get(pos) == Some(&Token::Dot) {
            pos += 1;
        } else {
            return Some((parts.join("."), pos));
        }
    }
}

/// Parse one statement beginning at `start`
fn parse_statement(tokens: &[Token], start: usize, out: &mut Vec<ImportedModule>) {
    if is_name(tokens.get(start), "import") {
        let mut pos = start + 1;
        while let Some((path, next)) = dotted_name(tokens, pos) {
            out.push(ImportedModule {
                path,
                relative: false,
            });
            pos = next;
            if is_name(tokens.get(pos), "as") {
                pos += 2;
            }
            if tokens.get(pos) == Some(&Token::Comma) {
                pos += 1;
            } else {
                break;
            }
        }
    } else if is_name(tokens.get(start), "from") {
        let mut pos = start + 1;
        let mut relative = false;
        while tokens.get(pos) == Some(&Token::Dot) {
            relative = true;
            pos += 1;
        }
        match dotted_name(tokens, pos) {
            Some((path, next)) if is_name(tokens.get(next), "import") => {
                out.push(ImportedModule { path, relative });
            }
            // `from . import x` names no module of its own
            _ => {}
        }
    }
}

/// Structurally scan `source` for imports
pub fn scan_imports(source: &str) -> Result<Vec<ImportedModule>, ScanError> {
    let mut modules = Vec::new();
    for line in tokenize(source)? {
        parse_statement(&line, 0, &mut modules);
        // Compound statements: `try: import x`, `if y: from z import w`
        for (idx, token) in line.iter().enumerate() {
            if token == &Token::Colon {
                parse_statement(&line, idx + 1, &mut modules);
            }
        }
    }
    Ok(modules)
}

static IMPORT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*import\s+([\w.]+(?:\s+as\s+\w+)?(?:\s*,\s*[\w.]+(?:\s+as\s+\w+)?)*)")
        .expect("valid import pattern")
});

static FROM_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*from\s+(\.*)([\w.]*)\s+import\b").expect("valid from pattern"));

/// Line-based fallback for source the tokenizer rejects
pub fn regex_imports(source: &str) -> Vec<ImportedModule> {
    let mut modules = Vec::new();
    for line in source.lines() {
        if let Some(caps) = IMPORT_LINE.captures(line) {
            for part in caps[1].split(',') {
                if let Some(path) = part.split_whitespace().next() {
                    modules.push(ImportedModule {
                        path: path.to_string(),
                        relative: false,
                    });
                }
            }
        } else if let Some(caps) = FROM_LINE.captures(line) {
            let relative = !caps[1].is_empty();
            if !caps[2].is_empty() {
                modules.push(ImportedModule {
                    path: caps[2].to_string(),
                    relative,
                });
            }
        }
    }
    modules
}
