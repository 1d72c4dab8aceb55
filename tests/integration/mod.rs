//! Integration tests for db-chat.

pub mod session_test;
pub mod transcript_store_test;
