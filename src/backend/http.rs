//! HTTP binding for the query backend.
//!
//! Endpoints:
//! - `POST /auth/login`, `POST /auth/register` → `{"token": ...}`
//! - `GET /connections`, `POST /connections`, `DELETE /connections/{id}`
//! - `POST /connections/connect` with `{"connection_id": ...}`
//! - `POST /chat` with `{"question": ..., "connection_id": ...}`
//!
//! Error bodies carry a human-readable `detail`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{AuthToken, Authenticator, ChatBackend, ConnectivityReport, Credentials, QueryAnswer};
use crate::config::ApiConfig;
use crate::connection::{Connection, ConnectionFields, ConnectionId};
use crate::error::{ChatError, Result};

const TEST_CONNECTION_FALLBACK: &str = "Failed to test connection";
const EXECUTE_QUERY_FALLBACK: &str = "Failed to execute query";
const SAVE_CONNECTION_FALLBACK: &str = "Failed to save connection";
const DELETE_CONNECTION_FALLBACK: &str = "Failed to delete connection";
const LIST_CONNECTIONS_FALLBACK: &str = "Failed to fetch connections";
const AUTH_FALLBACK: &str = "Authentication failed. Please check your credentials.";

#[derive(Debug, Deserialize)]
struct TokenBody {
    token: String,
}

/// Extracts `detail` from an error body.
///
/// Only a JSON object can carry a detail; any other JSON value yields `None`. A
/// body that is not JSON, or is `null`, cannot be read and is a transport error.
fn error_detail(status: StatusCode, body: &str) -> Result<Option<String>> {
    let unreadable = || ChatError::transport(format!("Unexpected response from backend ({status})"));
    let parsed: serde_json::Value = serde_json::from_str(body).map_err(|_| unreadable())?;
    let detail = match &parsed {
        serde_json::Value::Null => return Err(unreadable()),
        serde_json::Value::Object(fields) => fields.get("detail"),
        _ => None,
    };
    Ok(match detail {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(text)) if text.is_empty() => None,
        Some(serde_json::Value::String(text)) => Some(text.clone()),
        Some(other) => Some(other.to_string()),
    })
}

/// Maps a response to a typed value or the matching failure.
fn interpret<T: DeserializeOwned>(status: StatusCode, body: &str, fallback: &str) -> Result<T> {
    if status.is_success() {
        return serde_json::from_str(body)
            .map_err(|e| ChatError::transport(format!("Failed to parse response: {e}")));
    }

    let detail = error_detail(status, body)?;
    Err(ChatError::logical(detail.unwrap_or_else(|| fallback.to_string())))
}

/// Backends usually use integer ids; send them as numbers when they look like one.
fn id_json(id: &ConnectionId) -> serde_json::Value {
    id.as_str()
        .parse::<i64>()
        .map(serde_json::Value::from)
        .unwrap_or_else(|_| serde_json::Value::from(id.as_str()))
}

fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

fn build_client(api: &ApiConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(api.timeout_secs))
        .build()
        .map_err(|e| ChatError::config(format!("Failed to create HTTP client: {e}")))
}

/// Sends a request and reads the body. Anything that stops a reply from arriving
/// is a transport failure.
async fn send(request: RequestBuilder) -> Result<(StatusCode, String)> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            ChatError::transport("Request timed out")
        } else if e.is_connect() {
            ChatError::transport(format!("Failed to connect to backend: {e}"))
        } else {
            ChatError::transport(format!("Request failed: {e}"))
        }
    })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ChatError::transport(format!("Failed to read response: {e}")))?;

    debug!(%status, bytes = body.len(), "backend response");
    Ok((status, body))
}

/// Unauthenticated client for the login/register endpoints.
#[derive(Debug, Clone)]
pub struct HttpAuthenticator {
    base_url: Url,
    client: Client,
}

impl HttpAuthenticator {
    pub fn new(api: &ApiConfig) -> Result<Self> {
        Ok(Self {
            base_url: api.url()?,
            client: build_client(api)?,
        })
    }

    async fn post_credentials(&self, path: &str, credentials: &Credentials) -> Result<AuthToken> {
        let request = self
            .client
            .post(endpoint(&self.base_url, &["auth", path]))
            .json(credentials);
        let (status, body) = send(request).await?;
        let parsed: TokenBody = interpret(status, &body, AUTH_FALLBACK)?;
        Ok(AuthToken::new(parsed.token))
    }
}

#[async_trait]
impl Authenticator for HttpAuthenticator {
    async fn login(&self, credentials: &Credentials) -> Result<AuthToken> {
        self.post_credentials("login", credentials).await
    }

    async fn register(&self, credentials: &Credentials) -> Result<AuthToken> {
        self.post_credentials("register", credentials).await
    }
}

/// Authenticated HTTP backend. The token is owned by this handle, which is owned
/// by the session it belongs to.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: Url,
    client: Client,
    token: AuthToken,
}

impl HttpBackend {
    pub fn new(api: &ApiConfig, token: AuthToken) -> Result<Self> {
        Ok(Self {
            base_url: api.url()?,
            client: build_client(api)?,
            token,
        })
    }

    fn get(&self, segments: &[&str]) -> RequestBuilder {
        self.client
            .get(endpoint(&self.base_url, segments))
            .bearer_auth(self.token.as_str())
    }

    fn post(&self, segments: &[&str]) -> RequestBuilder {
        self.client
            .post(endpoint(&self.base_url, segments))
            .bearer_auth(self.token.as_str())
    }

    fn delete(&self, segments: &[&str]) -> RequestBuilder {
        self.client
            .delete(endpoint(&self.base_url, segments))
            .bearer_auth(self.token.as_str())
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn test_connectivity(&self, id: &ConnectionId) -> Result<ConnectivityReport> {
        let request = self
            .post(&["connections", "connect"])
            .json(&json!({ "connection_id": id_json(id) }));
        let (status, body) = send(request).await?;
        interpret(status, &body, TEST_CONNECTION_FALLBACK)
    }

    async fn execute_question(&self, id: &ConnectionId, question: &str) -> Result<QueryAnswer> {
        let request = self.post(&["chat"]).json(&json!({
            "question": question,
            "connection_id": id_json(id),
        }));
        let (status, body) = send(request).await?;
        interpret(status, &body, EXECUTE_QUERY_FALLBACK)
    }

    async fn list_connections(&self) -> Result<Vec<Connection>> {
        let (status, body) = send(self.get(&["connections"])).await?;
        let connections: Option<Vec<Connection>> =
            interpret(status, &body, LIST_CONNECTIONS_FALLBACK)?;
        Ok(connections.unwrap_or_default())
    }

    async fn create_connection(&self, fields: &ConnectionFields) -> Result<Connection> {
        let request = self.post(&["connections"]).json(fields);
        let (status, body) = send(request).await?;
        interpret(status, &body, SAVE_CONNECTION_FALLBACK)
    }

    async fn delete_connection(&self, id: &ConnectionId) -> Result<()> {
        let (status, body) = send(self.delete(&["connections", id.as_str()])).await?;
        if status.is_success() {
            return Ok(());
        }
        let detail = error_detail(status, &body)
            .ok()
            .flatten()
            .unwrap_or_else(|| DELETE_CONNECTION_FALLBACK.to_string());
        Err(ChatError::logical(detail))
    }
}
