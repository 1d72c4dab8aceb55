//! End-to-end session flows against the mock backend.

use std::sync::Arc;

use db_chat::backend::{
    AuthMode, AuthToken, Authenticator, BackendCall, ChatBackend, ConnectivityReport, Credentials,
    MockBackend, QueryAnswer,
};
use db_chat::chart::ChartKind;
use db_chat::chat::{AnswerKind, ChatTurn, QueryOrchestrator};
use db_chat::connection::{ConnectionFields, ConnectionId, ConnectionSession, ConnectionState};
use db_chat::db::{ResultSet, Row};
use db_chat::persistence::{FailingTranscriptStore, MemoryTranscriptStore, TranscriptStore};
use db_chat::{ChatError, SessionContext};
use pretty_assertions::assert_eq;

fn rows(n: usize) -> ResultSet {
    (0..n)
        .map(|i| {
            Row::new()
                .with("day", format!("2024-01-{:02}", i + 1))
                .with("revenue", (i as i64 + 1) * 100)
        })
        .collect::<Vec<_>>()
        .into()
}

fn shop_backend() -> Arc<MockBackend> {
    Arc::new(
        MockBackend::new()
            .with_connection("shop", "shop")
            .with_connection("crm", "crm")
            .with_answer("daily revenue", Ok(QueryAnswer::new("SELECT day, revenue FROM daily", rows(25))))
            .with_answer("top days", Ok(QueryAnswer::new("SELECT day, revenue FROM daily LIMIT 5", rows(5))))
            .with_answer("orderz", Err(ChatError::logical("Table 'shop.orderz' doesn't exist"))),
    )
}

async fn session_with(
    backend: Arc<MockBackend>,
    store: Arc<dyn TranscriptStore>,
) -> SessionContext {
    let token = backend
        .authenticate(&Credentials::new("ann", "secret"), AuthMode::Login)
        .await
        .unwrap();
    SessionContext::establish(token, backend, store).await
}

#[tokio::test]
async fn test_login_select_and_ask() {
    let backend = shop_backend();
    let store = Arc::new(MemoryTranscriptStore::new());
    let mut session = session_with(backend.clone(), store.clone()).await;
    assert_eq!(session.token(), &AuthToken::new("mock-token-ann"));

    let id = ConnectionId::new("1");
    assert_eq!(session.select(&id).await.unwrap(), &ConnectionState::Connected);

    assert!(session.ask("daily revenue this month").await);
    assert!(session.ask("top days").await);

    let turns = session.transcript().turns();
    assert_eq!(turns.len(), 4);
    let line = turns[1].as_assistant().unwrap();
    assert_eq!(line.chart.kind, ChartKind::Line);
    assert_eq!(line.chart.label_column.as_deref(), Some("day"));
    let pie = turns[3].as_assistant().unwrap();
    assert_eq!(pie.chart.kind, ChartKind::Pie);
    assert_eq!(pie.kind(), AnswerKind::Rows);

    assert_eq!(&store.load(&id).await.unwrap(), session.transcript());
}

#[tokio::test]
async fn test_wrong_password_is_logical_failure() {
    let backend = MockBackend::new();
    let err = backend
        .authenticate(&Credentials::new("ann", "wrong"), AuthMode::Login)
        .await
        .unwrap_err();
    assert_eq!(err, ChatError::logical("Invalid username or password"));
}

#[tokio::test]
async fn test_blank_credentials_never_reach_backend() {
    let backend = MockBackend::new();
    let err = backend
        .authenticate(&Credentials::new(" ", "secret"), AuthMode::Login)
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Validation(_)));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_transcripts_are_kept_per_connection() {
    let backend = shop_backend();
    let store: Arc<dyn TranscriptStore> = Arc::new(MemoryTranscriptStore::new());
    let mut session = session_with(backend, store).await;
    let shop = ConnectionId::new("1");
    let crm = ConnectionId::new("2");

    session.select(&shop).await.unwrap();
    session.ask("top days").await;

    session.select(&crm).await.unwrap();
    assert!(session.transcript().is_empty());
    session.ask("how many contacts").await;

    session.select(&shop).await.unwrap();
    let turns = session.transcript().turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0], ChatTurn::user("top days"));
}

#[tokio::test]
async fn test_logical_and_transport_failures_become_error_turns() {
    let backend = shop_backend();
    let store: Arc<dyn TranscriptStore> = Arc::new(MemoryTranscriptStore::new());
    let mut session = session_with(backend.clone(), store).await;
    session.select(&ConnectionId::new("1")).await.unwrap();

    session.ask("count orderz").await;
    let logical = session.transcript().last().and_then(ChatTurn::as_assistant).unwrap();
    assert!(logical.error);
    assert_eq!(logical.content, "Table 'shop.orderz' doesn't exist");

    backend.set_offline(true);
    session.ask("count orders").await;
    let transport = session.transcript().last().and_then(ChatTurn::as_assistant).unwrap();
    assert!(transport.error);
    assert_eq!(transport.content, "Network error. Please check your connection.");
    assert!(!session.is_busy());
}

#[tokio::test]
async fn test_connectivity_failure_messages() {
    let backend = shop_backend();
    backend.set_connectivity("1", Ok(ConnectivityReport::refused("Access denied for user 'app'")));
    backend.set_connectivity(
        "2",
        Ok(ConnectivityReport {
            success: false,
            message: None,
        }),
    );
    let store: Arc<dyn TranscriptStore> = Arc::new(MemoryTranscriptStore::new());
    let mut session = session_with(backend.clone(), store).await;

    session.select(&ConnectionId::new("1")).await.unwrap();
    assert_eq!(
        session.state(),
        &ConnectionState::Failed("Access denied for user 'app'".into())
    );
    assert!(!session.ask("anything").await);

    session.select(&ConnectionId::new("2")).await.unwrap();
    assert_eq!(session.state(), &ConnectionState::Failed("Connection failed".into()));

    backend.set_offline(true);
    session.retest().await;
    assert_eq!(
        session.state(),
        &ConnectionState::Failed("Network error. Please check your backend server.".into())
    );

    backend.set_offline(false);
    backend.set_connectivity("2", Ok(ConnectivityReport::ok()));
    assert!(session.retest().await.is_connected());
}

#[tokio::test]
async fn test_interleaved_selection_keeps_latest() {
    let backend = shop_backend();
    backend.set_connectivity("1", Ok(ConnectivityReport::ok()));
    backend.set_connectivity("2", Ok(ConnectivityReport::refused("crm is down")));
    let store = MemoryTranscriptStore::new();
    let mut session = ConnectionSession::new();
    let connections = backend.list_connections().await.unwrap();

    let a = session.begin_select(connections[0].clone());
    let b = session.begin_select(connections[1].clone());
    let (outcome_a, outcome_b) = futures::join!(
        ConnectionSession::check(backend.as_ref(), &a),
        ConnectionSession::check(backend.as_ref(), &b),
    );

    assert!(session.complete_test(b, outcome_b, &store).await);
    assert!(!session.complete_test(a, outcome_a, &store).await);
    assert_eq!(session.active_id(), Some(&ConnectionId::new("2")));
    assert_eq!(session.state(), &ConnectionState::Failed("crm is down".into()));
}

#[tokio::test]
async fn test_second_question_while_first_outstanding_is_noop() {
    let backend = shop_backend();
    let store = MemoryTranscriptStore::new();
    let mut session = ConnectionSession::new();
    let connections = backend.list_connections().await.unwrap();
    session
        .select(connections[0].clone(), backend.as_ref(), &store)
        .await;

    let mut orchestrator = QueryOrchestrator::new();
    let first = orchestrator.begin(&mut session, "top days").unwrap();
    assert!(
        !orchestrator
            .execute(&mut session, "daily revenue", backend.as_ref(), &store)
            .await
    );
    assert_eq!(session.transcript().len(), 1);

    let outcome = QueryOrchestrator::dispatch(backend.as_ref(), &first).await;
    assert!(orchestrator.finish(&mut session, first, outcome, &store).await);
    assert_eq!(session.transcript().len(), 2);
    assert_eq!(
        backend
            .calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::ExecuteQuestion(..)))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_store_failure_never_blocks_exchange() {
    let backend = shop_backend();
    let mut session = session_with(backend, Arc::new(FailingTranscriptStore)).await;

    assert!(session.select(&ConnectionId::new("1")).await.unwrap().is_connected());
    assert!(session.ask("top days").await);
    assert_eq!(session.transcript().len(), 2);
}

#[tokio::test]
async fn test_deleting_any_connection_clears_its_transcript() {
    let backend = shop_backend();
    let store = Arc::new(MemoryTranscriptStore::new());
    let mut session = session_with(backend, store.clone()).await;
    let shop = ConnectionId::new("1");
    let crm = ConnectionId::new("2");

    session.select(&crm).await.unwrap();
    session.ask("how many contacts").await;
    session.select(&shop).await.unwrap();
    session.ask("top days").await;

    session.delete_connection(&crm).await.unwrap();
    assert!(store.load(&crm).await.unwrap().is_empty());
    assert_eq!(session.active().map(|c| c.id.clone()), Some(shop.clone()));
    assert_eq!(session.transcript().len(), 2);

    session.delete_connection(&shop).await.unwrap();
    assert!(store.load(&shop).await.unwrap().is_empty());
    assert_eq!(session.state(), &ConnectionState::Idle);
    assert!(session.connections().is_empty());
}

#[tokio::test]
async fn test_invalid_connection_form_issues_no_call() {
    let backend = shop_backend();
    let store: Arc<dyn TranscriptStore> = Arc::new(MemoryTranscriptStore::new());
    let mut session = session_with(backend.clone(), store).await;
    let calls_before = backend.calls().len();

    let mut fields = ConnectionFields::new("warehouse", "dw");
    fields.port = "54x2".to_string();
    assert!(matches!(
        session.add_connection(&fields).await,
        Err(ChatError::Validation(_))
    ));
    assert_eq!(backend.calls().len(), calls_before);

    fields.port = "5432".to_string();
    let created = session.add_connection(&fields).await.unwrap();
    assert_eq!(session.connections().last(), Some(&created));
}
