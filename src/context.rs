//! Application context: one set of stores per run, passed explicitly to consumers

use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;

use crate::auth::{CredentialStore, FileCredentialStore};
use crate::config::{Backend, ClientConfig};
use crate::model::{ContentStore, SessionStore};
use crate::transport::{HttpTransport, MockBackend, Transport};

pub struct AppContext {
    pub content: ContentStore,
    pub session: SessionStore,
    credentials: Arc<dyn CredentialStore>,
    bootstrap: Option<JoinHandle<()>>,
}

impl AppContext {
    /// Build the transport and credential store described by `config`, then start.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let credentials: Arc<dyn CredentialStore> =
            Arc::new(FileCredentialStore::new(&config.credential_file));

        let transport: Arc<dyn Transport> = match config.backend {
            Backend::Http => {
                tracing::info!(base_url = %config.base_url, "Using HTTP backend");
                Arc::new(HttpTransport::new(config, credentials.clone())?)
            }
            Backend::Mock => {
                tracing::info!(latency_ms = config.mock_latency.as_millis() as u64, "Using mock backend");
                Arc::new(MockBackend::new().with_latency(config.mock_latency))
            }
        };

        Ok(Self::start(transport, credentials))
    }

    /// Create both stores over shared collaborators and begin verifying any
    /// persisted credential in the background. Must be called within a tokio runtime.
    pub fn start(transport: Arc<dyn Transport>, credentials: Arc<dyn CredentialStore>) -> Self {
        let content = ContentStore::new(transport.clone());
        let session = SessionStore::new(transport, credentials.clone());
        let bootstrap = session.bootstrap();

        Self {
            content,
            session,
            credentials,
            bootstrap,
        }
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// Wait for the startup session check, if one was started
    pub async fn wait_for_session(&mut self) {
        if let Some(handle) = self.bootstrap.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Session bootstrap task failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCredentialStore;
    use crate::model::AuthPhase;

    #[tokio::test]
    async fn test_start_anonymous_without_credential() {
        let mut ctx = AppContext::start(Arc::new(MockBackend::new()), Arc::new(MemoryCredentialStore::new()));
        ctx.wait_for_session().await;
        assert_eq!(ctx.session.phase(), AuthPhase::Anonymous);
    }

    #[tokio::test]
    async fn test_start_restores_persisted_session() {
        let mut ctx = AppContext::start(
            Arc::new(MockBackend::new()),
            Arc::new(MemoryCredentialStore::with_token("mock_token_123456")),
        );
        ctx.wait_for_session().await;
        assert!(ctx.session.is_logged_in());
    }

    #[tokio::test]
    async fn test_stores_share_transport() {
        let backend = Arc::new(MockBackend::new());
        let ctx = AppContext::start(backend.clone(), Arc::new(MemoryCredentialStore::new()));

        assert!(ctx.content.fetch_categories().await);
        assert!(ctx.session.login("test@example.com", "secret").await);
        assert_eq!(backend.calls().len(), 2);
        assert!(ctx.credentials().load().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_from_config_mock_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            backend: Backend::Mock,
            mock_latency: std::time::Duration::ZERO,
            credential_file: dir.path().join("credentials.json"),
            ..ClientConfig::default()
        };

        let mut ctx = AppContext::from_config(&config).unwrap();
        ctx.wait_for_session().await;
        assert!(ctx.content.fetch_movies().await);
        assert_eq!(ctx.content.all_movies().len(), 8);
    }
}
