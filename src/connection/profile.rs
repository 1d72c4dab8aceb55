//! Saved connection profiles.
//!
//! A [`Connection`] is what the backend stores for one target database. Profiles are
//! never edited in place: the client creates them from [`ConnectionFields`] and
//! deletes them by id.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::db::EngineKind;
use crate::error::{ChatError, Result};

/// Opaque connection identifier assigned by the backend.
///
/// Backends hand these out as either integers or strings; both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<i64> for ConnectionId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for ConnectionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(id) => Self::from(id),
            RawId::Text(id) => Self(id),
        })
    }
}

/// Accepts a port as a number, a numeric string, an empty string, or null.
fn lenient_port<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<u16>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPort {
        Int(u16),
        Text(String),
    }

    match Option::<RawPort>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawPort::Int(port)) => Ok(Some(port)),
        Some(RawPort::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(RawPort::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid port: {text}"))),
    }
}

/// A saved database connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub name: String,
    #[serde(rename = "type", default)]
    pub engine: EngineKind,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "lenient_port")]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    pub database: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Connection {
    /// Returns the port, falling back to the engine default.
    pub fn effective_port(&self) -> Option<u16> {
        self.port.or_else(|| self.engine.default_port())
    }

    /// Returns a display-safe string (no credentials) for UI purposes.
    pub fn display_string(&self) -> String {
        match (self.engine.is_networked(), self.effective_port()) {
            (true, Some(port)) => {
                let host = self.host.as_deref().unwrap_or("localhost");
                format!("{} @ {host}:{port} ({})", self.database, self.engine.label())
            }
            _ => format!("{} ({})", self.database, self.engine.label()),
        }
    }
}

/// The add-connection form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionFields {
    pub name: String,
    #[serde(rename = "type")]
    pub engine: EngineKind,
    pub host: String,
    /// Free text as entered; empty means "engine default".
    pub port: String,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl ConnectionFields {
    /// Creates a form with the two required fields filled in.
    pub fn new(name: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            database: database.into(),
            ..Default::default()
        }
    }

    /// Checks the form before it is sent anywhere.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.database.trim().is_empty() {
            return Err(ChatError::validation(
                "Please fill in all required fields (Name, Database)",
            ));
        }
        let port = self.port.trim();
        if !port.is_empty() && port.parse::<u16>().is_err() {
            return Err(ChatError::validation(format!("Invalid port: {port}")));
        }
        Ok(())
    }
}
