//! Workspace secrets referenced by Secret-typed variables
//!
//! Secret values never touch the cache or `app.yaml`; variables hold the
//! secret's name and the platform resolves it at runtime.

use crate::context::slugify_app_name;
use crate::error::ForgeResult;
use crate::platform::PlatformApi;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn list_secrets(&self) -> ForgeResult<Vec<String>>;

    async fn create_secret(&self, name: &str, value: &str) -> ForgeResult<()>;
}

/// Secrets stored in the platform workspace
pub struct PlatformSecretStore {
    api: Arc<dyn PlatformApi>,
}

impl PlatformSecretStore {
    pub fn new(api: Arc<dyn PlatformApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl SecretStore for PlatformSecretStore {
    async fn list_secrets(&self) -> ForgeResult<Vec<String>> {
        let mut names = self.api.list_secrets().await?;
        names.sort();
        Ok(names)
    }

    async fn create_secret(&self, name: &str, value: &str) -> ForgeResult<()> {
        self.api.create_secret(name, value).await?;
        info!("Created secret '{}' in workspace {}", name, self.api.workspace_id());
        Ok(())
    }
}

/// Suggested secret name for a variable, e.g. `pg-sink-pg-password`
pub fn suggest_secret_name(app_name: &str, variable: &str) -> String {
    let app = slugify_app_name(app_name);
    let var = slugify_app_name(variable);
    match (app.is_empty(), var.is_empty()) {
        (true, _) => var,
        (false, true) => app,
        (false, false) => format!("{app}-{var}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPlatform;

    #[test]
    fn test_suggest_secret_name() {
        assert_eq!(suggest_secret_name("PG Sink", "PG_PASSWORD"), "pg-sink-pg-password");
        assert_eq!(suggest_secret_name("", "API_KEY"), "api-key");
    }

    #[tokio::test]
    async fn test_platform_store_lists_sorted_and_creates() {
        let platform = Arc::new(MockPlatform::new().with_secrets(&["zeta", "alpha"]));
        let store = PlatformSecretStore::new(platform.clone());

        assert_eq!(store.list_secrets().await.unwrap(), vec!["alpha", "zeta"]);
        store.create_secret("beta", "s3cr3t").await.unwrap();
        assert_eq!(
            platform.created_secrets(),
            vec![("beta".to_string(), "s3cr3t".to_string())]
        );
        assert_eq!(store.list_secrets().await.unwrap(), vec!["alpha", "beta", "zeta"]);
    }
}
