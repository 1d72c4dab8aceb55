//! Chat turns and per-connection transcripts.

use serde::{Deserialize, Serialize};

use crate::chart::Classification;
use crate::db::ResultSet;

/// One message in a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatTurn {
    /// A natural-language question, stored exactly as typed.
    User { content: String },
    /// The backend's answer to the preceding question.
    Assistant(AssistantTurn),
}

impl ChatTurn {
    /// Creates a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// The displayed text of the turn.
    pub fn content(&self) -> &str {
        match self {
            Self::User { content } => content,
            Self::Assistant(turn) => &turn.content,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Self::User { .. })
    }

    pub fn as_assistant(&self) -> Option<&AssistantTurn> {
        match self {
            Self::Assistant(turn) => Some(turn),
            Self::User { .. } => None,
        }
    }
}

/// How an assistant turn should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerKind {
    /// No rows came back at all: show the text only.
    TextOnly,
    /// The query ran and matched nothing.
    EmptyResult,
    /// Rows to show as a table and possibly a chart.
    Rows,
}

/// An answer from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantTurn {
    /// Generated SQL, or a status/error message.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<ResultSet>,
    #[serde(default, skip_serializing_if = "Classification::is_none")]
    pub chart: Classification,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl AssistantTurn {
    /// A successful answer.
    pub fn answer(
        content: impl Into<String>,
        results: Option<ResultSet>,
        chart: Classification,
    ) -> Self {
        Self {
            content: content.into(),
            results,
            chart,
            error: false,
        }
    }

    /// A failed exchange.
    pub fn failure(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            results: None,
            chart: Classification::none(),
            error: true,
        }
    }

    pub fn kind(&self) -> AnswerKind {
        match &self.results {
            None => AnswerKind::TextOnly,
            Some(results) if results.is_empty() => AnswerKind::EmptyResult,
            Some(_) => AnswerKind::Rows,
        }
    }
}

impl From<AssistantTurn> for ChatTurn {
    fn from(turn: AssistantTurn) -> Self {
        Self::Assistant(turn)
    }
}

/// The ordered chat history of one connection. Append-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<ChatTurn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: impl Into<ChatTurn>) {
        self.turns.push(turn.into());
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Serializes to the stored JSON blob.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parses a stored JSON blob.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl From<Vec<ChatTurn>> for Transcript {
    fn from(turns: Vec<ChatTurn>) -> Self {
        Self { turns }
    }
}
