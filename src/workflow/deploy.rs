use crate::context::DeploymentInfo;
use crate::env_vars::{split_by_input_type, EnvVarSpec};
use crate::interaction::UserInteraction;
use crate::platform::{DeploymentRequest, PlatformApi};
use crate::sandbox::PhaseOutcome;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info};

/// Final status of a deployment that came up
const RUNNING: &str = "Running";

/// Creates and starts a deployment, then polls until it is running
pub struct DeployPhase<'a> {
    api: &'a dyn PlatformApi,
    ui: &'a dyn UserInteraction,
    poll_interval: Duration,
    poll_attempts: u32,
}

impl<'a> DeployPhase<'a> {
    pub fn new(
        api: &'a dyn PlatformApi,
        ui: &'a dyn UserInteraction,
        poll_interval: Duration,
        poll_attempts: u32,
    ) -> Self {
        Self {
            api,
            ui,
            poll_interval,
            poll_attempts: poll_attempts.max(1),
        }
    }

    pub async fn run(
        &self,
        deployment: &mut DeploymentInfo,
        variables: &[EnvVarSpec],
        values: &BTreeMap<String, String>,
    ) -> PhaseOutcome {
        let (Some(application_id), Some(name)) = (
            deployment.application_id.clone(),
            deployment.application_name.clone(),
        ) else {
            return PhaseOutcome::failure("No application to deploy");
        };

        let request = deployment_request(&name, &application_id, variables, values);
        let created = match self.api.create_deployment(&request).await {
            Ok(created) => created,
            Err(e) => {
                error!("Failed to create deployment for {}: {}", name, e);
                self.ui.display_error(&e.user_message());
                return PhaseOutcome::failure(format!("Could not create deployment: {}", e.user_message()));
            }
        };
        info!("Created deployment {} for {}", created.id, name);
        deployment.deployment_id = Some(created.id.clone());
        deployment.deployment_status = created.status.clone();

        if let Err(e) = self.api.start_deployment(&created.id).await {
            error!("Failed to start deployment {}: {}", created.id, e);
            self.ui.display_error(&e.user_message());
            return PhaseOutcome::failure(format!("Could not start deployment: {}", e.user_message()));
        }

        let mut spinner = self.ui.start_spinner(&format!("Waiting for {name} to start..."));
        for attempt in 1..=self.poll_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.poll_interval).await;
            }
            let status = match self.api.deployment_status(&created.id).await {
                Ok(status) => status,
                Err(e) => {
                    spinner.fail("Could not read deployment status");
                    return PhaseOutcome::failure(e.user_message());
                }
            };
            debug!(
                "Deployment {} is {} (poll {}/{})",
                created.id, status, attempt, self.poll_attempts
            );
            deployment.deployment_status = Some(status.clone());

            if status.eq_ignore_ascii_case(RUNNING) {
                spinner.success(&format!("{name} is running"));
                return PhaseOutcome::success(format!("Deployment {} is running", created.id));
            }
            if is_terminal_failure(&status) {
                spinner.fail(&format!("Deployment status: {status}"));
                return PhaseOutcome::failure(format!("Deployment {} ended in state {status}", created.id));
            }
            spinner.update_message(&format!("Deployment status: {status}"));
        }

        spinner.fail("Deployment did not start in time");
        PhaseOutcome::failure(format!(
            "Deployment {} was not running after {} status checks",
            created.id, self.poll_attempts
        ))
    }
}

fn is_terminal_failure(status: &str) -> bool {
    let status = status.to_lowercase();
    status.contains("fail") || status.contains("error") || status == "stopped"
}

fn deployment_request(
    name: &str,
    application_id: &str,
    variables: &[EnvVarSpec],
    values: &BTreeMap<String, String>,
) -> DeploymentRequest {
    let split = split_by_input_type(variables, values);
    DeploymentRequest {
        name: name.to_string(),
        application_id: application_id.to_string(),
        variables: split.variables,
        secret_variables: split.secret_variables,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env_vars::InputType;
    use crate::testing::{MockPlatform, MockUserInteraction};

    fn deployment() -> DeploymentInfo {
        DeploymentInfo {
            application_id: Some("app-1".to_string()),
            application_name: Some("pg-sink".to_string()),
            ..DeploymentInfo::default()
        }
    }

    fn variables() -> (Vec<EnvVarSpec>, BTreeMap<String, String>) {
        let mut password = EnvVarSpec::free_text("PG_PASSWORD");
        password.input_type = InputType::Secret;
        let vars = vec![EnvVarSpec::free_text("PG_HOST"), password];
        let values = BTreeMap::from([
            ("PG_HOST".to_string(), "db.local".to_string()),
            ("PG_PASSWORD".to_string(), "pg-sink-pg-password".to_string()),
        ]);
        (vars, values)
    }

    #[tokio::test]
    async fn test_deploy_polls_until_running() {
        let platform = MockPlatform::new().with_deployment_statuses(&["Queued", "Building", "Running"]);
        let ui = MockUserInteraction::new();
        let phase = DeployPhase::new(&platform, &ui, Duration::from_millis(1), 5);
        let (vars, values) = variables();
        let mut info = deployment();

        let outcome = phase.run(&mut info, &vars, &values).await;

        assert!(outcome.success);
        assert_eq!(info.deployment_id.as_deref(), Some("deployment-1"));
        assert_eq!(info.deployment_status.as_deref(), Some("Running"));
        assert_eq!(platform.deployments_started(), 1);

        let request = &platform.deployments()[0];
        assert_eq!(request.variables["PG_HOST"], "db.local");
        assert_eq!(request.secret_variables["PG_PASSWORD"], "pg-sink-pg-password");
        assert!(!request.variables.contains_key("PG_PASSWORD"));
    }

    #[tokio::test]
    async fn test_failed_deployment_stops_polling() {
        let platform = MockPlatform::new().with_deployment_statuses(&["Building", "BuildFailed", "Running"]);
        let ui = MockUserInteraction::new();
        let phase = DeployPhase::new(&platform, &ui, Duration::from_millis(1), 5);
        let (vars, values) = variables();
        let mut info = deployment();

        let outcome = phase.run(&mut info, &vars, &values).await;

        assert!(!outcome.success);
        assert!(outcome.message.contains("BuildFailed"));
    }

    #[tokio::test]
    async fn test_poll_bound() {
        let platform = MockPlatform::new().with_deployment_statuses(&["Queued", "Queued", "Queued"]);
        let ui = MockUserInteraction::new();
        let phase = DeployPhase::new(&platform, &ui, Duration::from_millis(1), 2);
        let mut info = deployment();

        let outcome = phase.run(&mut info, &[], &BTreeMap::new()).await;

        assert!(!outcome.success);
        assert_eq!(info.deployment_status.as_deref(), Some("Queued"));
    }

    #[tokio::test]
    async fn test_missing_application() {
        let platform = MockPlatform::new();
        let ui = MockUserInteraction::new();
        let phase = DeployPhase::new(&platform, &ui, Duration::from_millis(1), 2);

        let outcome = phase
            .run(&mut DeploymentInfo::default(), &[], &BTreeMap::new())
            .await;

        assert!(!outcome.success);
        assert!(platform.deployments().is_empty());
    }
}
