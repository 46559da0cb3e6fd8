use super::{PlatformApi, SessionStatus};
use crate::error::{ErrorCode, ForgeError, ForgeResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Owns the IDE session used as a sandbox for one application.
///
/// Calls made through [`SessionManager::call`] survive the session vanishing
/// underneath them: the old session is stopped (best effort), a new one is
/// started, and the call is retried exactly once.
pub struct SessionManager {
    api: Arc<dyn PlatformApi>,
    app_id: String,
    session_id: Option<String>,
    poll_interval: Duration,
    poll_attempts: u32,
}

impl SessionManager {
    pub fn new(
        api: Arc<dyn PlatformApi>,
        app_id: impl Into<String>,
        poll_interval: Duration,
        poll_attempts: u32,
    ) -> Self {
        Self {
            api,
            app_id: app_id.into(),
            session_id: None,
            poll_interval,
            poll_attempts,
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn api(&self) -> Arc<dyn PlatformApi> {
        Arc::clone(&self.api)
    }

    /// Return the current session, starting one if needed
    pub async fn ensure_session(&mut self) -> ForgeResult<String> {
        match &self.session_id {
            Some(id) => Ok(id.clone()),
            None => self.start_new().await,
        }
    }

    async fn start_new(&mut self) -> ForgeResult<String> {
        let session = self.api.start_session(&self.app_id).await?;
        info!("Started session {} for application {}", session.id, self.app_id);

        if session.status != SessionStatus::Ready {
            self.wait_until_ready(&session.id).await?;
        }
        self.session_id = Some(session.id.clone());
        Ok(session.id)
    }

    async fn wait_until_ready(&self, session_id: &str) -> ForgeResult<()> {
        for attempt in 1..=self.poll_attempts.max(1) {
            match self.api.session_status(session_id).await? {
                SessionStatus::Ready => return Ok(()),
                status @ (SessionStatus::Failed | SessionStatus::Stopped) => {
                    return Err(ForgeError::session_with_code(
                        ErrorCode::SESSION_START_FAILED,
                        format!("Session entered state {status:?} while starting"),
                        Some(session_id.to_string()),
                    ));
                }
                status => {
                    debug!(
                        "Session {} is {:?} (poll {}/{})",
                        session_id, status, attempt, self.poll_attempts
                    );
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
        Err(ForgeError::session_with_code(
            ErrorCode::SESSION_NOT_READY,
            format!(
                "Session not ready after {} status checks",
                self.poll_attempts
            ),
            Some(session_id.to_string()),
        ))
    }

    /// Replace the current session with a fresh one
    pub async fn recover(&mut self) -> ForgeResult<String> {
        if let Some(old) = self.session_id.take() {
            if let Err(e) = self.api.stop_session(&old).await {
                debug!("Ignoring failure to stop session {}: {}", old, e);
            }
        }
        self.start_new().await
    }

    /// Run `op` against the current session, recovering once if it is gone
    pub async fn call<T, F, Fut>(&mut self, description: &str, op: F) -> ForgeResult<T>
    where
        F: Fn(Arc<dyn PlatformApi>, String) -> Fut,
        Fut: Future<Output = ForgeResult<T>>,
    {
        let session_id = self.ensure_session().await?;
        match op(self.api(), session_id).await {
            Err(e) if e.is_session_not_found() => {
                warn!("Session lost during {}; starting a new one", description);
                let session_id = self.recover().await?;
                op(self.api(), session_id).await
            }
            result => result,
        }
    }

    /// Stop the session if one is running. Failures are logged only.
    pub async fn shutdown(&mut self) {
        if let Some(id) = self.session_id.take() {
            match self.api.stop_session(&id).await {
                Ok(()) => debug!("Stopped session {}", id),
                Err(e) => warn!("Failed to stop session {}: {}", id, e),
            }
        }
    }
}
