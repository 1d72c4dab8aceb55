//! Question/answer exchanges against the active connection.
//!
//! An exchange is started with [`QueryOrchestrator::begin`], which appends the
//! question to the transcript and marks the orchestrator busy. The backend call runs
//! through [`QueryOrchestrator::dispatch`], and [`QueryOrchestrator::finish`] turns
//! the outcome into an assistant turn and persists the transcript.

use tracing::{debug, info, warn};

use super::{AssistantTurn, ChatTurn};
use crate::backend::{ChatBackend, QueryAnswer};
use crate::chart::{classify, Classification};
use crate::connection::{ConnectionId, ConnectionSession, ConnectionState};
use crate::error::{ChatError, Result};
use crate::persistence::TranscriptStore;

/// Shown when the backend ran the question but returned no SQL text.
pub const QUERY_SUCCESS_FALLBACK: &str = "Query executed successfully";

/// Shown when no usable answer arrived.
pub const QUERY_NETWORK_ERROR: &str = "Network error. Please check your connection.";

/// A question that has been accepted but not answered.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a pending exchange must be passed to finish"]
pub struct PendingExchange {
    selection: u64,
    connection_id: ConnectionId,
    question: String,
}

impl PendingExchange {
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// The question as typed.
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Selection the question was asked under.
    pub fn selection(&self) -> u64 {
        self.selection
    }
}

/// Builds the assistant turn for an exchange outcome.
fn assistant_turn(outcome: Result<QueryAnswer>) -> AssistantTurn {
    match outcome {
        Ok(answer) => {
            let chart = answer
                .results
                .as_ref()
                .map(classify)
                .unwrap_or_else(Classification::none);
            let content = answer
                .query
                .filter(|q| !q.trim().is_empty())
                .unwrap_or_else(|| QUERY_SUCCESS_FALLBACK.to_string());
            AssistantTurn::answer(content, answer.results, chart)
        }
        Err(ChatError::Logical(message)) => AssistantTurn::failure(message),
        Err(_) => AssistantTurn::failure(QUERY_NETWORK_ERROR),
    }
}

/// Runs one exchange at a time against the active connection.
#[derive(Debug, Default)]
pub struct QueryOrchestrator {
    busy: bool,
}

impl QueryOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while an exchange is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Accepts a question if one can be sent right now.
    ///
    /// Returns `None` without touching anything when the input is blank, no
    /// connection is active and connected, or another exchange is in flight.
    pub fn begin(
        &mut self,
        session: &mut ConnectionSession,
        question: &str,
    ) -> Option<PendingExchange> {
        if question.trim().is_empty() {
            return None;
        }
        if self.busy {
            debug!("Ignoring question while another is in flight");
            return None;
        }
        if session.state() != &ConnectionState::Connected {
            debug!(state = session.state().label(), "Ignoring question without a connection");
            return None;
        }
        let connection_id = session.active_id()?.clone();

        session.transcript_mut().push(ChatTurn::user(question));
        self.busy = true;

        Some(PendingExchange {
            selection: session.selection(),
            connection_id,
            question: question.to_string(),
        })
    }

    /// Sends the question to the backend.
    pub async fn dispatch(
        backend: &dyn ChatBackend,
        pending: &PendingExchange,
    ) -> Result<QueryAnswer> {
        info!(connection = %pending.connection_id, "Sending question");
        backend
            .execute_question(&pending.connection_id, pending.question.trim())
            .await
    }

    /// Records the outcome of an exchange. Returns false if another connection was
    /// selected (or the session deselected) while it was in flight, in which case
    /// nothing is recorded. Retests of the same connection do not count.
    pub async fn finish(
        &mut self,
        session: &mut ConnectionSession,
        pending: PendingExchange,
        outcome: Result<QueryAnswer>,
        store: &dyn TranscriptStore,
    ) -> bool {
        self.busy = false;

        if !session.is_current_selection(pending.selection) {
            debug!(
                connection = %pending.connection_id,
                "Discarding answer for a connection that is no longer active"
            );
            return false;
        }

        let turn = assistant_turn(outcome);
        if turn.error {
            warn!(connection = %pending.connection_id, "Question failed: {}", turn.content);
        }
        session.transcript_mut().push(turn);

        if let Err(e) = store.save(&pending.connection_id, session.transcript()).await {
            warn!(connection = %pending.connection_id, "Could not save transcript: {e}");
        }
        true
    }

    /// Runs a full exchange. Returns false if the question was not accepted or the
    /// answer was discarded.
    pub async fn execute(
        &mut self,
        session: &mut ConnectionSession,
        question: &str,
        backend: &dyn ChatBackend,
        store: &dyn TranscriptStore,
    ) -> bool {
        let Some(pending) = self.begin(session, question) else {
            return false;
        };
        let outcome = Self::dispatch(backend, &pending).await;
        self.finish(session, pending, outcome, store).await
    }
}
