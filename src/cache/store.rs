use super::{Artifact, ArtifactKind, CacheDecision, CacheKey, CacheRecord, RECORD_VERSION};
use crate::context::WorkflowType;
use crate::error::{common, ErrorCode, ForgeError, ForgeResult};
use crate::interaction::UserInteraction;
use anyhow::Result;
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directory names never copied into or out of the cache
const SKIPPED_DIRS: &[&str] = &["__pycache__", ".venv", "venv", ".git", "state"];

/// Filesystem-backed artifact cache
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn workflow_dir(&self, kind: ArtifactKind, workflow: WorkflowType) -> PathBuf {
        self.root.join(kind.category()).join(workflow.as_str())
    }

    /// Path of the record file (or directory, for app directories)
    pub fn artifact_path(&self, kind: ArtifactKind, key: &CacheKey) -> PathBuf {
        let dir = self.workflow_dir(kind, key.workflow);
        match kind {
            ArtifactKind::AppDirectory => dir.join(key.file_stem()),
            _ => dir.join(format!("{}.json", key.file_stem())),
        }
    }

    /// Path of the plaintext `.env` export written alongside env var records
    pub fn env_export_path(&self, key: &CacheKey) -> PathBuf {
        self.workflow_dir(ArtifactKind::EnvVars, key.workflow)
            .join(format!("{}.env", key.file_stem()))
    }

    /// Look up a cached artifact. Missing or unreadable entries are a miss.
    pub fn check(&self, kind: ArtifactKind, key: &CacheKey) -> Option<Artifact> {
        let path = self.artifact_path(kind, key);
        if !path.exists() {
            debug!("Cache miss for {} of '{}'", kind, key.app_name);
            return None;
        }

        if kind == ArtifactKind::AppDirectory {
            return path.is_dir().then_some(Artifact::AppDirectory { path });
        }

        match self.read_record(&path) {
            Ok(record) if record.artifact.kind() == kind => {
                debug!("Cache hit for {} of '{}'", kind, key.app_name);
                Some(record.artifact)
            }
            Ok(record) => {
                warn!(
                    "Cache file {} holds {} instead of {}; ignoring",
                    path.display(),
                    record.artifact.kind(),
                    kind
                );
                None
            }
            Err(e) => {
                warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                None
            }
        }
    }

    fn read_record(&self, path: &Path) -> ForgeResult<CacheRecord> {
        let content = fs::read_to_string(path)
            .map_err(|e| common::storage_io_error(Some(path.to_path_buf()), "read").with_source(e))?;
        serde_json::from_str(&content).map_err(|e| {
            ForgeError::storage_with_code(
                ErrorCode::STORAGE_DESERIALIZATION_ERROR,
                "Malformed cache record",
                Some(path.to_path_buf()),
            )
            .with_source(e)
        })
    }

    /// Save an artifact, overwriting any previous value.
    ///
    /// Returns whether the write succeeded; failures are logged, not raised.
    pub fn save(&self, key: &CacheKey, artifact: &Artifact) -> bool {
        match self.try_save(key, artifact) {
            Ok(path) => {
                debug!("Cached {} for '{}' at {}", artifact.kind(), key.app_name, path.display());
                true
            }
            Err(e) => {
                warn!(
                    "Failed to cache {} for '{}': {}",
                    artifact.kind(),
                    key.app_name,
                    e
                );
                false
            }
        }
    }

    fn try_save(&self, key: &CacheKey, artifact: &Artifact) -> ForgeResult<PathBuf> {
        let kind = artifact.kind();
        let path = self.artifact_path(kind, key);

        if let Artifact::AppDirectory { path: source } = artifact {
            copy_app_directory(source, &path)?;
            return Ok(path);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                common::storage_io_error(Some(parent.to_path_buf()), "create directory")
                    .with_source(e)
            })?;
        }

        let record = CacheRecord {
            version: RECORD_VERSION,
            workflow: key.workflow,
            app_name: key.app_name.clone(),
            saved_at: Utc::now(),
            artifact: artifact.clone(),
        };
        let json = serde_json::to_string_pretty(&record).map_err(|e| {
            ForgeError::storage_with_code(
                ErrorCode::STORAGE_SERIALIZATION_ERROR,
                "Failed to serialize cache record",
                Some(path.clone()),
            )
            .with_source(e)
        })?;
        fs::write(&path, json)
            .map_err(|e| common::storage_io_error(Some(path.clone()), "write").with_source(e))?;

        if let Artifact::EnvVars { values } = artifact {
            let export = self.env_export_path(key);
            if let Err(e) = fs::write(&export, render_env_export(key, values)) {
                warn!("Failed to write {}: {}", export.display(), e);
            }
        }

        Ok(path)
    }

    /// Show a cached artifact and ask whether to reuse it
    pub async fn confirm(
        &self,
        interaction: &dyn UserInteraction,
        artifact: &Artifact,
    ) -> Result<CacheDecision> {
        let kind = artifact.kind();
        interaction.display_block(&format!("Cached {kind}"), &artifact.preview());

        let choices = vec![
            format!("Use cached {kind}"),
            "Start fresh".to_string(),
            "Go back".to_string(),
        ];
        let choice = interaction
            .prompt_choice(&format!("Found cached {kind}. What would you like to do?"), &choices)
            .await?;

        Ok(match choice {
            0 => CacheDecision::Use,
            1 => CacheDecision::Reject,
            _ => CacheDecision::Back,
        })
    }

    /// Remove every cached artifact for an application. Returns the number removed.
    pub fn clear(&self, key: &CacheKey) -> usize {
        let mut removed = 0;
        for kind in ArtifactKind::ALL {
            let path = self.artifact_path(kind, key);
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else if path.exists() {
                fs::remove_file(&path)
            } else {
                continue;
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }

        let export = self.env_export_path(key);
        if export.exists() {
            if let Err(e) = fs::remove_file(&export) {
                warn!("Failed to remove {}: {}", export.display(), e);
            }
        }
        removed
    }

    /// Application names with at least one cached artifact, sorted
    pub fn list(&self, workflow: WorkflowType) -> Vec<String> {
        let mut names = std::collections::BTreeSet::new();
        for kind in ArtifactKind::ALL {
            let dir = self.workflow_dir(kind, workflow);
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let name = match kind {
                    ArtifactKind::AppDirectory if path.is_dir() => path.file_name(),
                    ArtifactKind::AppDirectory => None,
                    _ if path.extension().is_some_and(|ext| ext == "json") => path.file_stem(),
                    _ => None,
                };
                if let Some(name) = name.and_then(|n| n.to_str()) {
                    names.insert(name.to_string());
                }
            }
        }
        names.into_iter().collect()
    }
}

/// Render env var values as a `.env` file
fn render_env_export(key: &CacheKey, values: &BTreeMap<String, String>) -> String {
    let mut out = format!(
        "# Environment for {} '{}'\n# Secret variables hold secret names, not values\n",
        key.workflow, key.app_name
    );
    for (name, value) in values {
        if value.contains(char::is_whitespace) || value.contains('#') {
            out.push_str(&format!("{}=\"{}\"\n", name, value.replace('"', "\\\"")));
        } else {
            out.push_str(&format!("{}={}\n", name, value));
        }
    }
    out
}

fn is_skipped(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

/// Replace `dest` with a copy of `source`
pub(crate) fn copy_app_directory(source: &Path, dest: &Path) -> ForgeResult<()> {
    if !source.is_dir() {
        return Err(ForgeError::storage_with_code(
            ErrorCode::STORAGE_IO_ERROR,
            "Application directory does not exist",
            Some(source.to_path_buf()),
        ));
    }
    if dest.exists() {
        fs::remove_dir_all(dest)
            .map_err(|e| common::storage_io_error(Some(dest.to_path_buf()), "remove").with_source(e))?;
    }

    for entry in WalkDir::new(source).into_iter().filter_entry(|e| !is_skipped(e)) {
        let entry = entry.map_err(|e| {
            common::storage_io_error(Some(source.to_path_buf()), "walk").with_source(e)
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| common::storage_io_error(Some(entry.path().to_path_buf()), "copy").with_source(e))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| {
                common::storage_io_error(Some(target.clone()), "create directory").with_source(e)
            })?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    common::storage_io_error(Some(parent.to_path_buf()), "create directory")
                        .with_source(e)
                })?;
            }
            fs::copy(entry.path(), &target)
                .map_err(|e| common::storage_io_error(Some(target.clone()), "copy").with_source(e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, CacheStore) {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("working_files"));
        (dir, store)
    }

    fn key() -> CacheKey {
        CacheKey::new(WorkflowType::Sink, "PG Sink")
    }

    #[test]
    fn test_check_missing_returns_none() {
        let (_dir, store) = store();
        for kind in ArtifactKind::ALL {
            assert!(store.check(kind, &key()).is_none());
        }
    }

    #[test]
    fn test_round_trip_for_each_record_kind() {
        let (_dir, store) = store();
        let artifacts = vec![
            Artifact::Template {
                template: "postgres-sink".to_string(),
                technology: Some("PostgreSQL".to_string()),
            },
            Artifact::EnvVars {
                values: BTreeMap::from([
                    ("input".to_string(), "raw".to_string()),
                    ("PG_PASSWORD".to_string(), "pg-password-secret".to_string()),
                ]),
            },
            Artifact::Code {
                code: "import os\nprint('hi')\n".to_string(),
                dependencies: vec!["quixstreams".to_string()],
            },
            Artifact::Schema {
                sample: "{\"id\": 1}".to_string(),
            },
            Artifact::UserPrompt {
                prompt: "Write rows to a table".to_string(),
            },
        ];

        for artifact in artifacts {
            assert!(store.save(&key(), &artifact));
            assert_eq!(store.check(artifact.kind(), &key()), Some(artifact));
        }
    }

    #[test]
    fn test_save_overwrites() {
        let (_dir, store) = store();
        let first = Artifact::UserPrompt {
            prompt: "first".to_string(),
        };
        let second = Artifact::UserPrompt {
            prompt: "second".to_string(),
        };
        assert!(store.save(&key(), &first));
        assert!(store.save(&key(), &second));
        assert_eq!(store.check(ArtifactKind::UserPrompt, &key()), Some(second));
    }

    #[test]
    fn test_env_vars_write_dotenv_export() {
        let (_dir, store) = store();
        let artifact = Artifact::EnvVars {
            values: BTreeMap::from([
                ("PG_HOST".to_string(), "localhost".to_string()),
                ("QUERY".to_string(), "select 1".to_string()),
            ]),
        };
        assert!(store.save(&key(), &artifact));
        let export = fs::read_to_string(store.env_export_path(&key())).unwrap();
        assert!(export.contains("PG_HOST=localhost\n"));
        assert!(export.contains("QUERY=\"select 1\"\n"));
    }

    #[test]
    fn test_corrupt_record_is_a_miss() {
        let (_dir, store) = store();
        let path = store.artifact_path(ArtifactKind::Code, &key());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();
        assert!(store.check(ArtifactKind::Code, &key()).is_none());
    }

    #[test]
    fn test_app_directory_round_trip_skips_caches() {
        let (dir, store) = store();
        let app = dir.path().join("app");
        fs::create_dir_all(app.join("lib")).unwrap();
        fs::create_dir_all(app.join("__pycache__")).unwrap();
        fs::write(app.join("main.py"), "print('main')").unwrap();
        fs::write(app.join("lib").join("util.py"), "X = 1").unwrap();
        fs::write(app.join("__pycache__").join("main.pyc"), "bytes").unwrap();

        assert!(store.save(&key(), &Artifact::AppDirectory { path: app.clone() }));
        let Some(Artifact::AppDirectory { path }) = store.check(ArtifactKind::AppDirectory, &key())
        else {
            panic!("expected cached app directory");
        };
        assert_eq!(fs::read_to_string(path.join("main.py")).unwrap(), "print('main')");
        assert_eq!(fs::read_to_string(path.join("lib").join("util.py")).unwrap(), "X = 1");
        assert!(!path.join("__pycache__").exists());
    }

    #[test]
    fn test_saving_missing_directory_fails_softly() {
        let (dir, store) = store();
        let missing = dir.path().join("nope");
        assert!(!store.save(&key(), &Artifact::AppDirectory { path: missing }));
        assert!(store.check(ArtifactKind::AppDirectory, &key()).is_none());
    }

    #[test]
    fn test_list_and_clear() {
        let (_dir, store) = store();
        let other = CacheKey::new(WorkflowType::Sink, "other");
        let prompt = Artifact::UserPrompt {
            prompt: "p".to_string(),
        };
        store.save(&key(), &prompt);
        store.save(
            &key(),
            &Artifact::EnvVars {
                values: BTreeMap::new(),
            },
        );
        store.save(&other, &prompt);

        assert_eq!(store.list(WorkflowType::Sink), vec!["other", "pg-sink"]);
        assert!(store.list(WorkflowType::Source).is_empty());

        assert_eq!(store.clear(&key()), 2);
        assert!(!store.env_export_path(&key()).exists());
        assert_eq!(store.list(WorkflowType::Sink), vec!["other"]);
    }
}
