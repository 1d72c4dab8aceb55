//! Connection handling for db-chat.
//!
//! Saved profiles live on the backend; the session tracks which one is active and
//! whether the backend can currently reach it.

pub mod manager;
pub mod profile;

pub use manager::{ConnectionSession, ConnectionState, PendingTest};
pub use profile::{Connection, ConnectionFields, ConnectionId};
