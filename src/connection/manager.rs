//! Connection session: which database the user is talking to right now.
//!
//! Connectivity checks are two-phase so a front end can keep handling input while a
//! check is in flight:
//!
//! 1. [`ConnectionSession::begin_select`] / [`ConnectionSession::begin_retest`] move
//!    the session to `Testing` and hand out a [`PendingTest`] tagged with the current
//!    test generation.
//! 2. [`ConnectionSession::check`] runs the backend call without borrowing the session.
//! 3. [`ConnectionSession::complete_test`] applies the outcome, unless a newer
//!    test, selection or deselection has happened since, in which case the outcome
//!    is dropped.
//!
//! Question/answer exchanges are guarded by the separate selection counter, which
//! retests leave alone: re-testing the active connection never invalidates an
//! answer that is still on its way.

use tracing::{debug, info, warn};

use super::{Connection, ConnectionId};
use crate::backend::{ChatBackend, ConnectivityReport};
use crate::chat::Transcript;
use crate::error::{ChatError, Result};
use crate::persistence::TranscriptStore;

/// Shown when the connectivity check itself could not complete.
pub const CONNECT_NETWORK_ERROR: &str = "Network error. Please check your backend server.";

/// Shown when the backend refuses the connection without saying why.
pub const CONNECT_REFUSED_FALLBACK: &str = "Connection failed";

/// Lifecycle state of the active connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No active connection.
    #[default]
    Idle,
    /// A connectivity check is in flight.
    Testing,
    /// The last check succeeded.
    Connected,
    /// The last check failed, with a user-facing reason.
    Failed(String),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Testing => "testing",
            Self::Connected => "connected",
            Self::Failed(_) => "failed",
        }
    }
}

/// A connectivity check that has been started but not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a pending test must be passed to complete_test"]
pub struct PendingTest {
    generation: u64,
    connection_id: ConnectionId,
}

impl PendingTest {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }
}

/// Turns a check outcome into the state it leads to.
fn resolve(outcome: Result<ConnectivityReport>) -> ConnectionState {
    match outcome {
        Ok(report) if report.success => ConnectionState::Connected,
        Ok(report) => ConnectionState::Failed(
            report
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| CONNECT_REFUSED_FALLBACK.to_string()),
        ),
        Err(ChatError::Logical(message)) => ConnectionState::Failed(message),
        Err(_) => ConnectionState::Failed(CONNECT_NETWORK_ERROR.to_string()),
    }
}

/// Owns the active connection, its status and its in-memory transcript.
#[derive(Debug, Default)]
pub struct ConnectionSession {
    active: Option<Connection>,
    state: ConnectionState,
    generation: u64,
    selection: u64,
    /// Set once the stored transcript for the current selection has been read.
    loaded: bool,
    transcript: Transcript,
}

impl ConnectionSession {
    /// Creates a session with no active connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `connection` active and starts testing it.
    ///
    /// The in-memory transcript is discarded; stored transcripts are untouched.
    pub fn begin_select(&mut self, connection: Connection) -> PendingTest {
        self.generation += 1;
        self.selection += 1;
        self.loaded = false;
        info!(
            connection = %connection.id,
            generation = self.generation,
            "Selecting connection {}",
            connection.name
        );
        let pending = PendingTest {
            generation: self.generation,
            connection_id: connection.id.clone(),
        };
        self.active = Some(connection);
        self.transcript = Transcript::new();
        self.state = ConnectionState::Testing;
        pending
    }

    /// Starts a new check of the active connection. `None` when idle.
    pub fn begin_retest(&mut self) -> Option<PendingTest> {
        let connection_id = self.active.as_ref()?.id.clone();
        self.generation += 1;
        self.state = ConnectionState::Testing;
        Some(PendingTest {
            generation: self.generation,
            connection_id,
        })
    }

    /// Runs the backend check for a pending test.
    pub async fn check(
        backend: &dyn ChatBackend,
        pending: &PendingTest,
    ) -> Result<ConnectivityReport> {
        backend.test_connectivity(&pending.connection_id).await
    }

    /// Applies a check outcome. Returns false if the test was superseded.
    ///
    /// The first success after a selection replaces the in-memory transcript with
    /// the stored one; a storage failure leaves it empty. Later successes (retests)
    /// keep the in-memory turns.
    pub async fn complete_test(
        &mut self,
        pending: PendingTest,
        outcome: Result<ConnectivityReport>,
        store: &dyn TranscriptStore,
    ) -> bool {
        if !self.is_current(pending.generation) {
            debug!(
                connection = %pending.connection_id,
                generation = pending.generation,
                current = self.generation,
                "Discarding stale connectivity result"
            );
            return false;
        }

        self.state = resolve(outcome);
        match &self.state {
            ConnectionState::Connected => {
                info!(connection = %pending.connection_id, "Connected");
                if !self.loaded {
                    self.transcript = match store.load(&pending.connection_id).await {
                        Ok(transcript) => transcript,
                        Err(e) => {
                            warn!(connection = %pending.connection_id, "Could not load transcript: {e}");
                            Transcript::new()
                        }
                    };
                    self.loaded = true;
                }
            }
            ConnectionState::Failed(reason) => {
                warn!(connection = %pending.connection_id, "Connection test failed: {reason}");
            }
            ConnectionState::Idle | ConnectionState::Testing => {}
        }
        true
    }

    /// Selects a connection and tests it to completion.
    pub async fn select(
        &mut self,
        connection: Connection,
        backend: &dyn ChatBackend,
        store: &dyn TranscriptStore,
    ) -> &ConnectionState {
        let pending = self.begin_select(connection);
        let outcome = Self::check(backend, &pending).await;
        self.complete_test(pending, outcome, store).await;
        &self.state
    }

    /// Re-tests the active connection. No-op when idle.
    pub async fn retest(
        &mut self,
        backend: &dyn ChatBackend,
        store: &dyn TranscriptStore,
    ) -> &ConnectionState {
        if let Some(pending) = self.begin_retest() {
            let outcome = Self::check(backend, &pending).await;
            self.complete_test(pending, outcome, store).await;
        }
        &self.state
    }

    /// Drops the active connection. Any check in flight becomes stale.
    pub fn deselect(&mut self) {
        self.generation += 1;
        self.selection += 1;
        self.loaded = false;
        self.active = None;
        self.state = ConnectionState::Idle;
        self.transcript = Transcript::new();
    }

    /// Returns true if `generation` is the latest connectivity test.
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Counter bumped by select and deselect only.
    pub fn selection(&self) -> u64 {
        self.selection
    }

    /// Returns true if `selection` is still the active selection.
    pub fn is_current_selection(&self, selection: u64) -> bool {
        selection == self.selection
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn active(&self) -> Option<&Connection> {
        self.active.as_ref()
    }

    pub fn active_id(&self) -> Option<&ConnectionId> {
        self.active.as_ref().map(|c| &c.id)
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub(crate) fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }
}
