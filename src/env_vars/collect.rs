use super::{EnvVarSpec, InputType};
use crate::interaction::UserInteraction;
use crate::secrets::{suggest_secret_name, SecretStore};
use anyhow::Result;
use std::collections::BTreeMap;
use tracing::{debug, warn};

const SKIP: &str = "skip";

/// Ask the user for a value for every variable, in manifest order.
///
/// Required variables are asked again until a value (or default) is given.
/// Optional variables with a meaningful default accept `skip` to leave them
/// unset; optional variables without one are omitted on blank input. Secret
/// variables resolve to the name of a workspace secret.
pub async fn collect_interactive(
    interaction: &dyn UserInteraction,
    secrets: &dyn SecretStore,
    app_name: &str,
    variables: &[EnvVarSpec],
) -> Result<BTreeMap<String, String>> {
    let mut values = BTreeMap::new();

    for var in variables {
        if let Some(description) = var.description.as_deref().filter(|d| !d.trim().is_empty()) {
            interaction.display_info(&format!("{}: {}", var.name, description));
        }

        let value = match var.input_type {
            InputType::Secret => collect_secret(interaction, secrets, app_name, var).await?,
            _ => collect_text(interaction, var).await?,
        };

        match value {
            Some(value) => {
                values.insert(var.name.clone(), value);
            }
            None => debug!("Leaving optional variable '{}' unset", var.name),
        }
    }

    Ok(values)
}

fn text_label(var: &EnvVarSpec) -> String {
    let kind = match var.input_type {
        InputType::InputTopic => " (input topic)",
        InputType::OutputTopic => " (output topic)",
        _ => "",
    };
    match (var.required, var.meaningful_default()) {
        (true, _) => format!("{}{}", var.name, kind),
        (false, Some(_)) => format!("{}{} (optional, '{SKIP}' to leave unset)", var.name, kind),
        (false, None) => format!("{}{} (optional)", var.name, kind),
    }
}

async fn collect_text(interaction: &dyn UserInteraction, var: &EnvVarSpec) -> Result<Option<String>> {
    let default = var.meaningful_default();
    let label = text_label(var);

    loop {
        let input = interaction.prompt_text(&label, default).await?;
        let input = input.trim();

        if input.is_empty() {
            match (default, var.required) {
                (Some(default), _) => return Ok(Some(default.to_string())),
                (None, false) => return Ok(None),
                (None, true) => {
                    interaction.display_warning(&format!("{} is required", var.name));
                    continue;
                }
            }
        }

        if !var.required && default.is_some() && input.eq_ignore_ascii_case(SKIP) {
            return Ok(None);
        }
        return Ok(Some(input.to_string()));
    }
}

async fn collect_secret(
    interaction: &dyn UserInteraction,
    secrets: &dyn SecretStore,
    app_name: &str,
    var: &EnvVarSpec,
) -> Result<Option<String>> {
    let existing = match secrets.list_secrets().await {
        Ok(names) => names,
        Err(e) => {
            warn!("Could not list secrets: {}", e);
            interaction.display_warning("Could not list existing secrets; you can still create one");
            Vec::new()
        }
    };

    let mut choices = existing.clone();
    let create_index = choices.len();
    choices.push("Create a new secret".to_string());
    if !var.required {
        choices.push("Leave unset".to_string());
    }

    let choice = interaction
        .prompt_choice(&format!("Secret for {}", var.name), &choices)
        .await?;

    if choice < create_index {
        return Ok(Some(existing[choice].clone()));
    }
    if choice > create_index {
        return Ok(None);
    }

    let suggested = suggest_secret_name(app_name, &var.name);
    let name = loop {
        let name = interaction.prompt_text("Secret name", Some(&suggested)).await?;
        let name = name.trim();
        if !name.is_empty() {
            break name.to_string();
        }
    };
    let value = loop {
        let value = interaction
            .prompt_text(&format!("Value for secret '{name}'"), None)
            .await?;
        if !value.trim().is_empty() {
            break value;
        }
        interaction.display_warning("Secret value cannot be empty");
    };

    secrets.create_secret(&name, &value).await?;
    interaction.display_success(&format!("Created secret '{name}'"));
    Ok(Some(name))
}
