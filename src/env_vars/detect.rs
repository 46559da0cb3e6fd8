use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static ENV_ACCESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"os\.(?:environ\.get\(\s*|environ\[\s*|getenv\(\s*)(?:"([^"\\\n]+)"|'([^'\\\n]+)')"#,
    )
    .expect("valid env access pattern")
});

/// Names of environment variables read by `code`.
///
/// Recognizes `os.environ.get("X")`, `os.environ["X"]` and `os.getenv("X")`
/// with either quote style.
pub fn detect_vars(code: &str) -> BTreeSet<String> {
    ENV_ACCESS
        .captures_iter(code)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}
