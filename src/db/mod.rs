//! Database-facing types for db-chat.
//!
//! The client never talks to a database directly; the backend does. This module
//! holds what the client needs to describe a target database and to read the
//! rows the backend sends back.

mod types;

pub use types::{ResultSet, Row, Value};

use std::fmt;
use std::str::FromStr;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Mysql,
    Postgresql,
    Sqlite,
    Mssql,
}

impl EngineKind {
    /// All engines, in the order they are offered to the user.
    pub const ALL: [EngineKind; 4] = [Self::Mysql, Self::Postgresql, Self::Sqlite, Self::Mssql];

    /// Returns the engine as its wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgresql => "postgresql",
            Self::Sqlite => "sqlite",
            Self::Mssql => "mssql",
        }
    }

    /// Human-readable engine name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Mysql => "MySQL",
            Self::Postgresql => "PostgreSQL",
            Self::Sqlite => "SQLite",
            Self::Mssql => "MS SQL Server",
        }
    }

    /// Returns the default port for this engine. File-based engines have none.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::Mysql => Some(3306),
            Self::Postgresql => Some(5432),
            Self::Sqlite => None,
            Self::Mssql => Some(1433),
        }
    }

    /// Whether the engine is addressed by host/port rather than a local file.
    pub fn is_networked(&self) -> bool {
        self.default_port().is_some()
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::Mysql),
            "postgresql" | "postgres" => Ok(Self::Postgresql),
            "sqlite" => Ok(Self::Sqlite),
            "mssql" | "sqlserver" => Ok(Self::Mssql),
            _ => Err(format!("Unknown database type: {s}")),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
