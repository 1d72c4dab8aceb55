//! Backend collaborator for db-chat.
//!
//! The backend owns authentication, SQL generation and query execution. The client
//! only depends on the contract in [`ChatBackend`] and [`Authenticator`]; an HTTP
//! binding and a scripted mock are provided.
//!
//! Failures come back as [`ChatError::Logical`](crate::error::ChatError::Logical)
//! when the backend answered with a reason, and
//! [`ChatError::Transport`](crate::error::ChatError::Transport) when no usable
//! answer arrived.

pub mod http;
pub mod mock;

pub use http::{HttpAuthenticator, HttpBackend};
pub use mock::{BackendCall, MockBackend};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::connection::{Connection, ConnectionFields, ConnectionId};
use crate::db::ResultSet;
use crate::error::{ChatError, Result};

/// Result of a connectivity check.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectivityReport {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl ConnectivityReport {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// The backend's answer to a natural-language question.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryAnswer {
    /// The generated SQL.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub results: Option<ResultSet>,
}

impl QueryAnswer {
    pub fn new(query: impl Into<String>, results: impl Into<ResultSet>) -> Self {
        Self {
            query: Some(query.into()),
            results: Some(results.into()),
        }
    }
}

/// Bearer token issued by the backend on login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(******)")
    }
}

/// Login or registration form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Which authentication endpoint to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Login,
    Register,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Checks the form for the given mode before it is sent.
    pub fn validate(&self, mode: AuthMode) -> Result<()> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(ChatError::validation("Username and password are required"));
        }
        if mode == AuthMode::Register
            && self.email.as_deref().map_or(true, |e| e.trim().is_empty())
        {
            return Err(ChatError::validation("Email is required to register"));
        }
        Ok(())
    }
}

/// Exchanges credentials for a session token.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<AuthToken>;

    async fn register(&self, credentials: &Credentials) -> Result<AuthToken>;

    /// Validates the form, then dispatches on `mode`.
    async fn authenticate(&self, credentials: &Credentials, mode: AuthMode) -> Result<AuthToken> {
        credentials.validate(mode)?;
        match mode {
            AuthMode::Login => self.login(credentials).await,
            AuthMode::Register => self.register(credentials).await,
        }
    }
}

/// Operations the client needs from an authenticated backend session.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Checks whether the backend can reach the connection's database.
    async fn test_connectivity(&self, id: &ConnectionId) -> Result<ConnectivityReport>;

    /// Translates a question to SQL and runs it against the connection.
    async fn execute_question(&self, id: &ConnectionId, question: &str) -> Result<QueryAnswer>;

    /// Lists saved connections in display order.
    async fn list_connections(&self) -> Result<Vec<Connection>>;

    /// Saves a new connection.
    async fn create_connection(&self, fields: &ConnectionFields) -> Result<Connection>;

    /// Deletes a saved connection.
    async fn delete_connection(&self, id: &ConnectionId) -> Result<()>;
}
