//! Mock backend for testing.
//!
//! Returns scripted outcomes and records every call, so tests can assert both on
//! session state and on what reached the backend.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{AuthToken, Authenticator, ChatBackend, ConnectivityReport, Credentials, QueryAnswer};
use crate::connection::{Connection, ConnectionFields, ConnectionId};
use crate::error::{ChatError, Result};

/// A call that reached the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Login(String),
    Register(String),
    TestConnectivity(ConnectionId),
    ExecuteQuestion(ConnectionId, String),
    ListConnections,
    CreateConnection(String),
    DeleteConnection(ConnectionId),
}

#[derive(Default)]
struct MockState {
    connections: Vec<Connection>,
    next_id: i64,
    connectivity: HashMap<ConnectionId, Result<ConnectivityReport>>,
    answers: Vec<(String, Result<QueryAnswer>)>,
    offline: bool,
    calls: Vec<BackendCall>,
}

/// A scripted in-memory backend.
///
/// Connections are connectable unless scripted otherwise. Questions are matched
/// case-insensitively against scripted patterns in insertion order; unmatched
/// questions get a text-only answer echoing the question.
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a saved connection. Ids are handed out as 1, 2, 3...
    pub fn with_connection(self, name: &str, database: &str) -> Self {
        self.add_connection(name, database);
        self
    }

    /// Scripts the outcome of connectivity checks for a connection.
    pub fn with_connectivity(
        self,
        id: impl Into<ConnectionId>,
        outcome: Result<ConnectivityReport>,
    ) -> Self {
        self.set_connectivity(id, outcome);
        self
    }

    /// Scripts the outcome for questions containing `pattern`.
    pub fn with_answer(self, pattern: impl Into<String>, outcome: Result<QueryAnswer>) -> Self {
        self.lock().answers.push((pattern.into().to_lowercase(), outcome));
        self
    }

    /// Adds a saved connection and returns its id.
    pub fn add_connection(&self, name: &str, database: &str) -> ConnectionId {
        let mut state = self.lock();
        state.next_id += 1;
        let connection = Connection {
            id: ConnectionId::from(state.next_id),
            name: name.to_string(),
            engine: Default::default(),
            host: Some("localhost".to_string()),
            port: None,
            username: None,
            password: None,
            database: database.to_string(),
            created_at: None,
        };
        let id = connection.id.clone();
        state.connections.push(connection);
        id
    }

    pub fn set_connectivity(&self, id: impl Into<ConnectionId>, outcome: Result<ConnectivityReport>) {
        self.lock().connectivity.insert(id.into(), outcome);
    }

    /// When offline, every call fails with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: BackendCall) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(call);
        if state.offline {
            return Err(ChatError::transport("Failed to connect to backend"));
        }
        Ok(())
    }
}

#[async_trait]
impl Authenticator for MockBackend {
    async fn login(&self, credentials: &Credentials) -> Result<AuthToken> {
        self.record(BackendCall::Login(credentials.username.clone()))?;
        if credentials.password == "wrong" {
            return Err(ChatError::logical("Invalid username or password"));
        }
        Ok(AuthToken::new(format!("mock-token-{}", credentials.username)))
    }

    async fn register(&self, credentials: &Credentials) -> Result<AuthToken> {
        self.record(BackendCall::Register(credentials.username.clone()))?;
        Ok(AuthToken::new(format!("mock-token-{}", credentials.username)))
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn test_connectivity(&self, id: &ConnectionId) -> Result<ConnectivityReport> {
        self.record(BackendCall::TestConnectivity(id.clone()))?;
        let state = self.lock();
        if let Some(outcome) = state.connectivity.get(id) {
            return outcome.clone();
        }
        if state.connections.iter().any(|c| &c.id == id) {
            Ok(ConnectivityReport::ok())
        } else {
            Err(ChatError::logical("Connection not found"))
        }
    }

    async fn execute_question(&self, id: &ConnectionId, question: &str) -> Result<QueryAnswer> {
        self.record(BackendCall::ExecuteQuestion(id.clone(), question.to_string()))?;
        let lowered = question.to_lowercase();
        let state = self.lock();
        let scripted = state
            .answers
            .iter()
            .find(|(pattern, _)| lowered.contains(pattern.as_str()))
            .map(|(_, outcome)| outcome.clone());

        scripted.unwrap_or_else(|| {
            Ok(QueryAnswer {
                query: Some(format!("-- {question}")),
                results: None,
            })
        })
    }

    async fn list_connections(&self) -> Result<Vec<Connection>> {
        self.record(BackendCall::ListConnections)?;
        Ok(self.lock().connections.clone())
    }

    async fn create_connection(&self, fields: &ConnectionFields) -> Result<Connection> {
        self.record(BackendCall::CreateConnection(fields.name.clone()))?;
        let mut state = self.lock();
        if state.connections.iter().any(|c| c.name == fields.name) {
            return Err(ChatError::logical(format!(
                "Connection '{}' already exists",
                fields.name
            )));
        }
        state.next_id += 1;
        let connection = Connection {
            id: ConnectionId::from(state.next_id),
            name: fields.name.clone(),
            engine: fields.engine,
            host: Some(fields.host.clone()).filter(|h| !h.is_empty()),
            port: fields.port.trim().parse().ok(),
            username: Some(fields.username.clone()).filter(|u| !u.is_empty()),
            password: None,
            database: fields.database.clone(),
            created_at: None,
        };
        state.connections.push(connection.clone());
        Ok(connection)
    }

    async fn delete_connection(&self, id: &ConnectionId) -> Result<()> {
        self.record(BackendCall::DeleteConnection(id.clone()))?;
        let mut state = self.lock();
        let before = state.connections.len();
        state.connections.retain(|c| &c.id != id);
        if state.connections.len() == before {
            return Err(ChatError::logical("Failed to delete connection"));
        }
        Ok(())
    }
}
