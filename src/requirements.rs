//! Pin a requirement to the newest release on the package index

use crate::error::{ErrorCode, ForgeError, ForgeResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

static REQUIREMENT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\s*)([A-Za-z0-9][A-Za-z0-9._-]*)(\s*\[[^\]]*\])?[^;#]*?(\s*;[^#]*?)?(\s*#.*)?$",
    )
    .expect("valid requirement pattern")
});

#[derive(Debug, Deserialize)]
struct IndexResponse {
    info: IndexInfo,
}

#[derive(Debug, Deserialize)]
struct IndexInfo {
    version: String,
}

/// Client for a PyPI-compatible JSON API (`<base>/<name>/json`)
#[derive(Debug, Clone)]
pub struct PackageIndex {
    client: reqwest::Client,
    base_url: String,
}

impl PackageIndex {
    pub fn new(base_url: &str) -> ForgeResult<Self> {
        url::Url::parse(base_url).map_err(|e| {
            ForgeError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                format!("Invalid package index URL '{base_url}'"),
            )
            .with_source(e)
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                ForgeError::platform(
                    ErrorCode::PLATFORM_TRANSPORT,
                    "Failed to build HTTP client",
                    None,
                )
                .with_source(e)
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Newest released version of `package`
    pub async fn latest_version(&self, package: &str) -> ForgeResult<String> {
        let url = format!("{}/{}/json", self.base_url, package);
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            ForgeError::platform(
                ErrorCode::PLATFORM_TRANSPORT,
                format!("Package index request for '{package}' failed"),
                None,
            )
            .with_source(e)
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ForgeError::platform(
                ErrorCode::PLATFORM_NOT_FOUND,
                format!("Package '{package}' not found on the package index"),
                Some(status.as_u16()),
            ));
        }
        if !status.is_success() {
            return Err(ForgeError::platform(
                ErrorCode::PLATFORM_GENERIC,
                format!("Package index returned {status} for '{package}'"),
                Some(status.as_u16()),
            ));
        }

        let body: IndexResponse = response.json().await.map_err(|e| {
            ForgeError::platform(
                ErrorCode::PLATFORM_BAD_RESPONSE,
                format!("Unexpected package index response for '{package}'"),
                Some(status.as_u16()),
            )
            .with_source(e)
        })?;
        Ok(body.info.version)
    }
}

/// Names compare case-insensitively with `-`, `_` and `.` treated alike
fn normalize(name: &str) -> String {
    name.to_lowercase().replace(['_', '.'], "-")
}

/// Set `name` to `name==version` in requirements `content`.
///
/// Extras, environment markers and trailing comments on the matching line
/// are kept. The requirement is appended when no line matches.
pub fn rewrite_requirement(content: &str, name: &str, version: &str) -> String {
    let wanted = normalize(name);
    let mut found = false;

    let mut lines: Vec<String> = content
        .lines()
        .map(|line| {
            let Some(caps) = REQUIREMENT_LINE.captures(line) else {
                return line.to_string();
            };
            if normalize(&caps[2]) != wanted {
                return line.to_string();
            }
            found = true;
            let indent = &caps[1];
            let extras = caps.get(3).map(|m| m.as_str().trim()).unwrap_or("");
            let mut rewritten = format!("{indent}{}{extras}=={version}", &caps[2]);
            if let Some(marker) = caps.get(4) {
                let marker = marker.as_str().trim();
                rewritten.push(' ');
                rewritten.push_str(marker);
            }
            if let Some(comment) = caps.get(5) {
                rewritten.push_str(comment.as_str());
            }
            rewritten
        })
        .collect();

    if !found {
        lines.push(format!("{name}=={version}"));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Look up the newest `package` and pin it in the requirements file at
/// `path`; returns the pinned version
pub async fn update_requirements_file(
    index: &PackageIndex,
    path: &Path,
    package: &str,
) -> ForgeResult<String> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(ForgeError::storage_with_code(
                ErrorCode::STORAGE_IO_ERROR,
                format!("Failed to read {}", path.display()),
                Some(path.to_path_buf()),
            )
            .with_source(e))
        }
    };

    let version = index.latest_version(package).await?;
    let updated = rewrite_requirement(&content, package, &version);
    fs::write(path, updated).map_err(|e| {
        ForgeError::storage_with_code(
            ErrorCode::STORAGE_IO_ERROR,
            format!("Failed to write {}", path.display()),
            Some(path.to_path_buf()),
        )
        .with_source(e)
    })?;

    info!("Pinned {}=={} in {}", package, version, path.display());
    Ok(version)
}
