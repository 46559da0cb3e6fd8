use super::EnvVarSpec;
use crate::error::{common, ErrorCode, ForgeError, ForgeResult};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;
use tracing::debug;

const VARIABLES_KEY: &str = "variables";

/// An `app.yaml` document.
///
/// Only the `variables` list is interpreted; every other key is kept verbatim
/// and in its original position so a load/save cycle does not disturb it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppManifest {
    pub variables: Vec<EnvVarSpec>,
    document: Mapping,
}

impl AppManifest {
    pub fn new(variables: Vec<EnvVarSpec>) -> Self {
        Self {
            variables,
            document: Mapping::new(),
        }
    }

    /// Parse manifest text
    pub fn parse(content: &str) -> ForgeResult<Self> {
        let mut document: Mapping = if content.trim().is_empty() {
            Mapping::new()
        } else {
            serde_yaml::from_str(content).map_err(|e| {
                ForgeError::config_with_code(ErrorCode::CONFIG_INVALID_YAML, "Invalid app.yaml")
                    .with_source(e)
            })?
        };

        let variables = match document.get_mut(VARIABLES_KEY) {
            None => Vec::new(),
            // Leave a null in place so the key keeps its position on render
            Some(slot) => match std::mem::take(slot) {
                Value::Null => Vec::new(),
                value => serde_yaml::from_value(value).map_err(|e| {
                    ForgeError::config_with_code(
                        ErrorCode::CONFIG_MANIFEST_INVALID,
                        "Invalid variables list in app.yaml",
                    )
                    .with_source(e)
                })?,
            },
        };

        Ok(Self {
            variables,
            document,
        })
    }

    /// Render the manifest as YAML
    pub fn render(&self) -> ForgeResult<String> {
        let variables = serde_yaml::to_value(&self.variables).map_err(|e| {
            ForgeError::config_with_code(
                ErrorCode::CONFIG_MANIFEST_INVALID,
                "Failed to serialize variables",
            )
            .with_source(e)
        })?;

        let mut document = self.document.clone();
        // Inserting an existing key keeps its position
        document.insert(Value::String(VARIABLES_KEY.to_string()), variables);

        serde_yaml::to_string(&document).map_err(|e| {
            ForgeError::config_with_code(ErrorCode::CONFIG_MANIFEST_INVALID, "Failed to render app.yaml")
                .with_source(e)
        })
    }

    pub fn get(&self, name: &str) -> Option<&EnvVarSpec> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Non-variable keys such as `name` or `dockerfile`
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }
}

/// Load `app.yaml`
pub fn load_manifest(path: &Path) -> ForgeResult<AppManifest> {
    if !path.exists() {
        return Err(common::config_not_found(path));
    }
    let content = fs::read_to_string(path).map_err(|e| {
        ForgeError::config_with_code(ErrorCode::CONFIG_NOT_FOUND, "Failed to read app.yaml")
            .with_source(e)
    })?;
    let manifest = AppManifest::parse(&content).map_err(|e| e.with_context(path.display()))?;
    debug!(
        "Loaded {} variables from {}",
        manifest.variables.len(),
        path.display()
    );
    Ok(manifest)
}

/// Write `app.yaml`, replacing the file
pub fn save_manifest(path: &Path, manifest: &AppManifest) -> ForgeResult<()> {
    let rendered = manifest.render()?;
    fs::write(path, rendered).map_err(|e| {
        ForgeError::storage_with_code(
            ErrorCode::STORAGE_IO_ERROR,
            "Failed to write app.yaml",
            Some(path.to_path_buf()),
        )
        .with_source(e)
    })?;
    debug!("Saved {} variables to {}", manifest.variables.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env_vars::InputType;
    use tempfile::TempDir;

    const APP_YAML: &str = r#"name: postgres-sink
language: python
variables:
  - name: input
    inputType: InputTopic
    description: Topic to read from
    defaultValue: raw-data
    required: true
  - name: PG_PASSWORD
    inputType: HiddenText
    required: true
dockerfile: dockerfile
runEntryPoint: main.py
"#;

    #[test]
    fn test_parse_reads_variables() {
        let manifest = AppManifest::parse(APP_YAML).unwrap();
        assert_eq!(manifest.variables.len(), 2);
        assert_eq!(manifest.variables[0].input_type, InputType::InputTopic);
        assert_eq!(manifest.get("PG_PASSWORD").unwrap().input_type, InputType::Secret);
        assert_eq!(
            manifest.field("name").and_then(|v| v.as_str()),
            Some("postgres-sink")
        );
    }

    #[test]
    fn test_render_preserves_other_keys_and_order() {
        let manifest = AppManifest::parse(APP_YAML).unwrap();
        let rendered = manifest.render().unwrap();

        let keys: Vec<String> = serde_yaml::from_str::<Mapping>(&rendered)
            .unwrap()
            .keys()
            .filter_map(|k| k.as_str().map(str::to_string))
            .collect();
        assert_eq!(
            keys,
            vec!["name", "language", "variables", "dockerfile", "runEntryPoint"]
        );
        assert!(rendered.contains("inputType: Secret"));
    }

    #[test]
    fn test_missing_variables_key_is_empty() {
        let manifest = AppManifest::parse("name: app\n").unwrap();
        assert!(manifest.variables.is_empty());
        assert!(manifest.render().unwrap().contains("variables: []"));
    }

    #[test]
    fn test_invalid_variables_is_config_error() {
        let err = AppManifest::parse("variables:\n  - name: X\n    inputType: Bogus\n").unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_MANIFEST_INVALID);
    }

    #[test]
    fn test_load_save_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.yaml");
        fs::write(&path, APP_YAML).unwrap();

        let mut manifest = load_manifest(&path).unwrap();
        manifest.variables.push(EnvVarSpec::free_text("PG_TABLE"));
        save_manifest(&path, &manifest).unwrap();

        let reloaded = load_manifest(&path).unwrap();
        assert_eq!(reloaded.variables, manifest.variables);
        assert_eq!(
            reloaded.field("runEntryPoint").and_then(|v| v.as_str()),
            Some("main.py")
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load_manifest(&dir.path().join("app.yaml")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_NOT_FOUND);
    }
}
