//! Environment variable management for connector applications
//!
//! The `app.yaml` manifest is the single source of truth for which variables an
//! application needs. This module loads and saves that manifest, detects the
//! variables generated code actually reads, reconciles both against the remote
//! application state, and walks the user through filling in values.

mod collect;
mod detect;
mod manifest;
mod reconcile;

pub use collect::collect_interactive;
pub use detect::detect_vars;
pub use manifest::{load_manifest, save_manifest, AppManifest};
pub use reconcile::reconcile;

use crate::platform::VariableSet;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How the platform renders and stores a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputType {
    FreeText,
    /// Holds the name of a workspace secret. `HiddenText` is the legacy spelling.
    #[serde(alias = "HiddenText")]
    Secret,
    InputTopic,
    OutputTopic,
}

impl InputType {
    pub fn is_topic(&self) -> bool {
        matches!(self, InputType::InputTopic | InputType::OutputTopic)
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputType::FreeText => "FreeText",
            InputType::Secret => "Secret",
            InputType::InputTopic => "InputTopic",
            InputType::OutputTopic => "OutputTopic",
        };
        f.write_str(name)
    }
}

/// One variable declared in `app.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVarSpec {
    pub name: String,
    pub input_type: InputType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "scalar_as_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_value: Option<String>,
    #[serde(default)]
    pub required: bool,
}

impl EnvVarSpec {
    /// An optional FreeText variable with no default
    pub fn free_text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_type: InputType::FreeText,
            description: None,
            default_value: None,
            required: false,
        }
    }

    /// Default value, unless it is missing, blank or a placeholder
    pub fn meaningful_default(&self) -> Option<&str> {
        self.default_value
            .as_deref()
            .filter(|value| !value.trim().is_empty() && !is_placeholder(value))
    }
}

/// True for template values such as `{{PG_HOST}}` or `<your host>`
pub fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    (value.starts_with("{{") && value.ends_with("}}"))
        || (value.len() > 1 && value.starts_with('<') && value.ends_with('>'))
}

/// Route collected values by declared type. Secret-typed values are secret
/// names and travel as references; everything else is a plain value.
pub fn split_by_input_type(
    specs: &[EnvVarSpec],
    values: &BTreeMap<String, String>,
) -> VariableSet {
    let mut set = VariableSet::default();
    for (name, value) in values {
        let is_secret = specs
            .iter()
            .any(|spec| &spec.name == name && spec.input_type == InputType::Secret);
        let target = if is_secret {
            &mut set.secret_variables
        } else {
            &mut set.variables
        };
        target.insert(name.clone(), value.clone());
    }
    set
}

/// Accept numbers and booleans for `defaultValue`, keeping their YAML spelling
fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<serde_yaml::Value>::deserialize(deserializer)? {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_yaml::Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "defaultValue must be a scalar, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_text_is_read_as_secret() {
        let spec: EnvVarSpec =
            serde_yaml::from_str("name: PG_PASSWORD\ninputType: HiddenText\nrequired: true\n")
                .unwrap();
        assert_eq!(spec.input_type, InputType::Secret);
        let written = serde_yaml::to_string(&spec).unwrap();
        assert!(written.contains("inputType: Secret"));
    }

    #[test]
    fn test_numeric_default_value() {
        let spec: EnvVarSpec =
            serde_yaml::from_str("name: PG_PORT\ninputType: FreeText\ndefaultValue: 5432\n")
                .unwrap();
        assert_eq!(spec.default_value.as_deref(), Some("5432"));
        assert!(!spec.required);
    }

    #[test]
    fn test_placeholders() {
        assert!(is_placeholder("{{PG_HOST}}"));
        assert!(is_placeholder(" <your-host> "));
        assert!(!is_placeholder("localhost"));
        assert!(!is_placeholder("<"));
        assert!(!is_placeholder("a<b>"));
    }

    #[test]
    fn test_secret_values_are_split_out() {
        let mut password = EnvVarSpec::free_text("PG_PASSWORD");
        password.input_type = InputType::Secret;
        let specs = vec![EnvVarSpec::free_text("PG_HOST"), password];
        let values = BTreeMap::from([
            ("PG_HOST".to_string(), "db.local".to_string()),
            ("PG_PASSWORD".to_string(), "pg-sink-pg-password".to_string()),
            ("UNDECLARED".to_string(), "x".to_string()),
        ]);

        let set = split_by_input_type(&specs, &values);

        assert_eq!(set.secret_variables.len(), 1);
        assert_eq!(set.secret_variables["PG_PASSWORD"], "pg-sink-pg-password");
        assert_eq!(set.variables["PG_HOST"], "db.local");
        assert_eq!(set.variables["UNDECLARED"], "x");
        assert!(!set.variables.contains_key("PG_PASSWORD"));
    }

    #[test]
    fn test_meaningful_default() {
        let mut spec = EnvVarSpec::free_text("X");
        assert_eq!(spec.meaningful_default(), None);
        spec.default_value = Some("{{X}}".to_string());
        assert_eq!(spec.meaningful_default(), None);
        spec.default_value = Some("  ".to_string());
        assert_eq!(spec.meaningful_default(), None);
        spec.default_value = Some("value".to_string());
        assert_eq!(spec.meaningful_default(), Some("value"));
    }
}
