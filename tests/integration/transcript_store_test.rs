//! Integration tests for on-disk transcript storage.

use db_chat::chart::classify;
use db_chat::chat::{AssistantTurn, ChatTurn, Transcript};
use db_chat::connection::ConnectionId;
use db_chat::db::{ResultSet, Row, Value};
use db_chat::persistence::{SqliteTranscriptStore, StateDb, TranscriptStore};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn sample() -> Transcript {
    let results: ResultSet = vec![
        Row::new()
            .with("zone", "eu-west")
            .with("avg_latency", 41.5)
            .with("region", "Europe")
            .with("note", Value::Null),
        Row::new()
            .with("zone", "us-east")
            .with("avg_latency", "38.25")
            .with("region", "Americas")
            .with("note", "peak"),
    ]
    .into();
    let chart = classify(&results);

    let mut transcript = Transcript::new();
    transcript.push(ChatTurn::user("latency by zone"));
    transcript.push(AssistantTurn::answer(
        "SELECT zone, avg(latency) AS avg_latency, region, note FROM pings GROUP BY zone",
        Some(results),
        chart,
    ));
    transcript.push(ChatTurn::user("and by hour?"));
    transcript.push(AssistantTurn::failure("column \"hour\" does not exist"));
    transcript
}

#[tokio::test]
async fn test_transcripts_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.db");
    let id = ConnectionId::new("42");

    let db = StateDb::open(&path).await.unwrap();
    SqliteTranscriptStore::new(&db)
        .save(&id, &sample())
        .await
        .unwrap();
    db.close().await;

    let db = StateDb::open(&path).await.unwrap();
    let loaded = SqliteTranscriptStore::new(&db).load(&id).await.unwrap();
    assert_eq!(loaded, sample());
    db.close().await;
}

#[tokio::test]
async fn test_row_column_order_survives_round_trip() {
    let dir = tempdir().unwrap();
    let db = StateDb::open(&dir.path().join("state.db")).await.unwrap();
    let store = SqliteTranscriptStore::new(&db);
    let id = ConnectionId::new("1");

    store.save(&id, &sample()).await.unwrap();
    let loaded = store.load(&id).await.unwrap();

    let results = loaded.turns()[1]
        .as_assistant()
        .and_then(|turn| turn.results.as_ref())
        .unwrap();
    assert_eq!(results.columns(), vec!["zone", "avg_latency", "region", "note"]);
}

#[tokio::test]
async fn test_clear_only_touches_one_connection() {
    let dir = tempdir().unwrap();
    let db = StateDb::open(&dir.path().join("state.db")).await.unwrap();
    let store = SqliteTranscriptStore::new(&db);
    let one = ConnectionId::new("1");
    let ten = ConnectionId::new("10");

    store.save(&one, &sample()).await.unwrap();
    store.save(&ten, &sample()).await.unwrap();
    store.clear(&one).await.unwrap();

    assert!(store.load(&one).await.unwrap().is_empty());
    assert_eq!(store.load(&ten).await.unwrap(), sample());
    assert!(store.load(&ConnectionId::new("0")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_chart_decision_is_stored_with_turn() {
    let dir = tempdir().unwrap();
    let db = StateDb::open(&dir.path().join("state.db")).await.unwrap();
    let store = SqliteTranscriptStore::new(&db);
    let id = ConnectionId::new("1");

    store.save(&id, &sample()).await.unwrap();
    let loaded = store.load(&id).await.unwrap();
    let answer = loaded.turns()[1].as_assistant().unwrap();

    assert_eq!(answer.chart.label_column.as_deref(), Some("zone"));
    assert_eq!(answer.chart.value_columns, vec!["avg_latency".to_string()]);
}
