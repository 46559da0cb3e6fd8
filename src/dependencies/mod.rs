//! Python dependency extraction
//!
//! Generated code either declares its requirements explicitly in a comment
//! block, which always wins:
//!
//! ```text
//! # DEPENDENCIES:
//! # pip install requests psycopg2-binary==2.9.9
//! # END_DEPENDENCIES
//! ```
//!
//! or they are inferred from its import statements. Inference skips the
//! standard library and relative imports, maps import names to pip names and
//! always includes the streaming framework itself.

mod packages;
mod scanner;

pub use packages::{is_stdlib, pip_name, FRAMEWORK_PACKAGES};
pub use scanner::{regex_imports, scan_imports, ImportedModule, ScanError};

use crate::error::{ErrorCode, ForgeError, ForgeResult};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

const BLOCK_START: &str = "DEPENDENCIES:";
const BLOCK_END: &str = "END_DEPENDENCIES";

/// Requirements for `code`, sorted case-insensitively
pub fn extract_dependencies(code: &str) -> Vec<String> {
    extract_with_local(code, &HashSet::new())
}

/// Like [`extract_dependencies`], treating modules that live in `app_dir`
/// (sibling `.py` files and packages) as local code rather than requirements
pub fn extract_dependencies_for_app(code: &str, app_dir: &Path) -> Vec<String> {
    extract_with_local(code, &local_modules(app_dir))
}

fn extract_with_local(code: &str, local: &HashSet<String>) -> Vec<String> {
    if let Some(declared) = declared_block(code) {
        debug!("Using {} declared dependencies", declared.len());
        return sorted_unique(declared);
    }

    let modules = match scan_imports(code) {
        Ok(modules) => modules,
        Err(e) => {
            warn!("Import scan failed ({}), falling back to line matching", e);
            regex_imports(code)
        }
    };

    let mut deps: Vec<String> = FRAMEWORK_PACKAGES.iter().map(|p| p.to_string()).collect();
    for module in modules {
        let top = module.top_level();
        if module.relative || top.is_empty() || is_stdlib(top) || local.contains(top) {
            continue;
        }
        deps.push(pip_name(&module.path));
    }
    sorted_unique(deps)
}

/// Entries of a `# DEPENDENCIES:` block, or `None` when the code has no
/// non-empty block
fn declared_block(code: &str) -> Option<Vec<String>> {
    let mut inside = false;
    let mut entries = Vec::new();

    for line in code.lines() {
        let Some(comment) = line.trim().strip_prefix('#') else {
            if inside {
                break;
            }
            continue;
        };
        let comment = comment.trim();

        if !inside {
            if let Some(rest) = comment.strip_prefix(BLOCK_START) {
                inside = true;
                entries.extend(parse_entries(rest));
            }
            continue;
        }
        if comment.starts_with(BLOCK_END) {
            break;
        }
        entries.extend(parse_entries(comment));
    }

    if entries.is_empty() {
        None
    } else {
        Some(entries)
    }
}

fn parse_entries(text: &str) -> Vec<String> {
    let text = text.trim();
    let text = text
        .strip_prefix("pip install")
        .or_else(|| text.strip_prefix("pip3 install"))
        .unwrap_or(text);
    text.split_whitespace()
        .filter(|token| !token.starts_with('-'))
        .map(str::to_string)
        .collect()
}

fn sorted_unique(mut deps: Vec<String>) -> Vec<String> {
    deps.sort_by_key(|d| d.to_lowercase());
    let mut seen = HashSet::new();
    deps.retain(|d| seen.insert(d.to_lowercase()));
    deps
}

fn local_modules(app_dir: &Path) -> HashSet<String> {
    let Ok(entries) = fs::read_dir(app_dir) else {
        return HashSet::new();
    };
    entries
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            if path.is_dir() && path.join("__init__.py").exists() {
                path.file_name().map(|n| n.to_string_lossy().into_owned())
            } else if path.extension().is_some_and(|ext| ext == "py") {
                path.file_stem().map(|n| n.to_string_lossy().into_owned())
            } else {
                None
            }
        })
        .collect()
}

/// Render `deps` as a requirements.txt at `path`
pub fn write_requirements(path: &Path, deps: &[String]) -> ForgeResult<()> {
    let mut content = deps.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    fs::write(path, content).map_err(|e| {
        ForgeError::storage_with_code(
            ErrorCode::STORAGE_IO_ERROR,
            format!("Failed to write {}", path.display()),
            Some(path.to_path_buf()),
        )
        .with_source(e)
    })
}
