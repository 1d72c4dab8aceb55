//! Chat transcripts and the question/answer flow.

pub mod orchestrator;
pub mod transcript;

pub use orchestrator::{PendingExchange, QueryOrchestrator};
pub use transcript::{AnswerKind, AssistantTurn, ChatTurn, Transcript};
