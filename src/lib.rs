//! db-chat - chat with your databases in plain language.
//!
//! The client keeps session state and interprets backend answers: which saved
//! connection is active and reachable, the per-connection chat transcript, and how
//! a result set should be charted. SQL generation and execution live on the backend.

pub mod backend;
pub mod chart;
pub mod chat;
pub mod cli;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod logging;
pub mod persistence;
pub mod repl;
pub mod session;

pub use error::{ChatError, Result};
pub use session::SessionContext;
