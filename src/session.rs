//! Per-login session context.
//!
//! Owns everything that lives between login and logout: the backend handle carrying
//! the token, the transcript store, the saved connection list, the active connection
//! and the query orchestrator.

use std::sync::Arc;
use tracing::{info, warn};

use crate::backend::{AuthToken, ChatBackend};
use crate::chat::{QueryOrchestrator, Transcript};
use crate::connection::{Connection, ConnectionFields, ConnectionId, ConnectionSession, ConnectionState};
use crate::error::{ChatError, Result};
use crate::persistence::TranscriptStore;

/// State for one authenticated user.
pub struct SessionContext {
    token: AuthToken,
    backend: Arc<dyn ChatBackend>,
    store: Arc<dyn TranscriptStore>,
    connections: Vec<Connection>,
    connection: ConnectionSession,
    orchestrator: QueryOrchestrator,
}

impl SessionContext {
    /// Builds a context and loads the saved connection list.
    ///
    /// A failed fetch is logged and leaves the list empty.
    pub async fn establish(
        token: AuthToken,
        backend: Arc<dyn ChatBackend>,
        store: Arc<dyn TranscriptStore>,
    ) -> Self {
        let mut context = Self {
            token,
            backend,
            store,
            connections: Vec::new(),
            connection: ConnectionSession::new(),
            orchestrator: QueryOrchestrator::new(),
        };
        if let Err(e) = context.refresh_connections().await {
            warn!("Could not load saved connections: {e}");
        }
        context
    }

    /// Re-fetches the saved connection list, keeping backend order.
    pub async fn refresh_connections(&mut self) -> Result<&[Connection]> {
        self.connections = self.backend.list_connections().await?;
        info!(count = self.connections.len(), "Loaded saved connections");
        Ok(&self.connections)
    }

    /// Validates and saves a new connection, then refreshes the list.
    pub async fn add_connection(&mut self, fields: &ConnectionFields) -> Result<Connection> {
        fields.validate()?;
        let created = self.backend.create_connection(fields).await?;
        info!(connection = %created.id, "Saved connection {}", created.name);
        if let Err(e) = self.refresh_connections().await {
            warn!("Could not refresh connections: {e}");
        }
        Ok(created)
    }

    /// Deletes a saved connection and its stored transcript.
    ///
    /// Deleting the active connection also deselects it.
    pub async fn delete_connection(&mut self, id: &ConnectionId) -> Result<()> {
        self.backend.delete_connection(id).await?;
        info!(connection = %id, "Deleted connection");

        if let Err(e) = self.refresh_connections().await {
            warn!("Could not refresh connections: {e}");
        }
        if let Err(e) = self.store.clear(id).await {
            warn!(connection = %id, "Could not clear transcript: {e}");
        }
        if self.connection.active_id() == Some(id) {
            self.connection.deselect();
        }
        Ok(())
    }

    /// Makes a saved connection active and tests it.
    pub async fn select(&mut self, id: &ConnectionId) -> Result<&ConnectionState> {
        let connection = self
            .connection_by_id(id)
            .cloned()
            .ok_or_else(|| ChatError::validation(format!("Unknown connection: {id}")))?;
        Ok(self
            .connection
            .select(connection, self.backend.as_ref(), self.store.as_ref())
            .await)
    }

    /// Re-tests the active connection.
    pub async fn retest(&mut self) -> &ConnectionState {
        self.connection
            .retest(self.backend.as_ref(), self.store.as_ref())
            .await
    }

    pub fn deselect(&mut self) {
        self.connection.deselect();
    }

    /// Sends a question on the active connection. Returns false if it was not sent
    /// or its answer was discarded.
    pub async fn ask(&mut self, question: &str) -> bool {
        self.orchestrator
            .execute(
                &mut self.connection,
                question,
                self.backend.as_ref(),
                self.store.as_ref(),
            )
            .await
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn connection_by_id(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| &c.id == id)
    }

    pub fn active(&self) -> Option<&Connection> {
        self.connection.active()
    }

    pub fn state(&self) -> &ConnectionState {
        self.connection.state()
    }

    pub fn transcript(&self) -> &Transcript {
        self.connection.transcript()
    }

    pub fn is_busy(&self) -> bool {
        self.orchestrator.is_busy()
    }

    pub fn token(&self) -> &AuthToken {
        &self.token
    }

    /// Ends the session. Stored transcripts are kept.
    pub fn logout(self) {
        info!("Logged out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, MockBackend};
    use crate::persistence::MemoryTranscriptStore;

    async fn context(backend: Arc<MockBackend>) -> SessionContext {
        SessionContext::establish(
            AuthToken::new("t"),
            backend,
            Arc::new(MemoryTranscriptStore::new()),
        )
        .await
    }

    #[tokio::test]
    async fn test_establish_loads_connections() {
        let backend = Arc::new(
            MockBackend::new()
                .with_connection("shop", "shop")
                .with_connection("crm", "crm"),
        );
        let ctx = context(backend).await;
        let names: Vec<_> = ctx.connections().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["shop", "crm"]);
        assert_eq!(ctx.state(), &ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_establish_survives_backend_outage() {
        let backend = Arc::new(MockBackend::new().with_connection("shop", "shop"));
        backend.set_offline(true);
        let ctx = context(backend).await;
        assert!(ctx.connections().is_empty());
    }

    #[tokio::test]
    async fn test_add_connection_validates_first() {
        let backend = Arc::new(MockBackend::new());
        let mut ctx = context(backend.clone()).await;
        let before = backend.calls().len();

        let err = ctx
            .add_connection(&ConnectionFields::new("prod", " "))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
        assert_eq!(backend.calls().len(), before);

        let created = ctx
            .add_connection(&ConnectionFields::new("prod", "shop"))
            .await
            .unwrap();
        assert_eq!(ctx.connections(), &[created]);
    }

    #[tokio::test]
    async fn test_select_unknown_id_is_validation_error() {
        let backend = Arc::new(MockBackend::new());
        let mut ctx = context(backend.clone()).await;
        let err = ctx.select(&ConnectionId::new("9")).await.unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
        assert!(!backend
            .calls()
            .iter()
            .any(|c| matches!(c, BackendCall::TestConnectivity(_))));
    }

    #[tokio::test]
    async fn test_delete_active_connection_deselects() {
        let backend = Arc::new(MockBackend::new().with_connection("shop", "shop"));
        let mut ctx = context(backend).await;
        let id = ConnectionId::new("1");

        assert!(ctx.select(&id).await.unwrap().is_connected());
        assert!(ctx.ask("count orders").await);

        ctx.delete_connection(&id).await.unwrap();
        assert!(ctx.active().is_none());
        assert_eq!(ctx.state(), &ConnectionState::Idle);
        assert!(ctx.connections().is_empty());
    }
}
