use super::lock;
use crate::error::ForgeResult;
use crate::secrets::SecretStore;
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Default)]
pub struct MockSecretStore {
    secrets: Mutex<Vec<String>>,
    created: Mutex<Vec<(String, String)>>,
}

impl MockSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secrets(self, names: &[&str]) -> Self {
        lock(&self.secrets).extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn created(&self) -> Vec<(String, String)> {
        lock(&self.created).clone()
    }
}

#[async_trait]
impl SecretStore for MockSecretStore {
    async fn list_secrets(&self) -> ForgeResult<Vec<String>> {
        Ok(lock(&self.secrets).clone())
    }

    async fn create_secret(&self, name: &str, value: &str) -> ForgeResult<()> {
        lock(&self.secrets).push(name.to_string());
        lock(&self.created).push((name.to_string(), value.to_string()));
        Ok(())
    }
}
