use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use escalation_storage::{DocumentStore, Filter, JsonDocumentStore, SortKey};
use serde_json::{json, Value};

static TEMP_SEQ: AtomicU64 = AtomicU64::new(1);

fn temp_store_path() -> std::path::PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();
    std::env::temp_dir()
        .join(format!("escalation-store-{pid}-{now}-{seq}.json"))
}

fn incident(number: &str, priority: &str, state: &str, created_on: &str) -> Value {
    json!({
        "number": number,
        "priority": priority,
        "state": state,
        "created_on": created_on,
    })
}

#[tokio::test]
async fn writes_survive_reopen() {
    let path = temp_store_path();
    {
        let store = JsonDocumentStore::open(&path).expect("open store");
        assert_eq!(store.backend_name(), "json");
        store
            .insert("tickets", json!({"number": "INC0010001", "state": "New"}))
            .expect("seed");
        store
            .upsert(
                "call_contexts",
                "call_id",
                &json!("call-1"),
                json!({"status": "active"}),
            )
            .await
            .expect("upsert");
    }

    let reopened = JsonDocumentStore::open(&path).expect("reopen store");
    let mut collections = reopened.list_collections().await.expect("list");
    collections.sort();
    assert_eq!(collections, vec!["call_contexts", "tickets"]);
    let ticket = reopened
        .find_one("tickets", &Filter::eq("number", "INC0010001"), &[])
        .await
        .expect("find");
    assert!(ticket.is_some());

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn find_one_honours_sort_and_filter() {
    let store = JsonDocumentStore::in_memory();
    store
        .insert_many(
            "incidents",
            [
                incident("INC1", "1 - Critical", "New", "2024-03-01 08:00:00"),
                incident("INC2", "1 - Critical", "Closed", "2024-03-01 11:00:00"),
                incident("INC3", "3 - Moderate", "New", "2024-03-01 12:00:00"),
                incident("INC4", "2 - High", "In Progress", "2024-03-01T09:30:00Z"),
            ],
        )
        .expect("seed");

    let filter = Filter::And(vec![
        Filter::is_in("priority", ["1 - Critical", "2 - High"]),
        Filter::not_in("state", ["Resolved", "Closed", "Cancelled"]),
    ]);
    let newest = store
        .find_one("incidents", &filter, &[SortKey::desc("created_on")])
        .await
        .expect("find")
        .expect("match");
    assert_eq!(newest["number"], "INC4");

    let oldest = store
        .find_one("incidents", &filter, &[SortKey::asc("created_on")])
        .await
        .expect("find")
        .expect("match");
    assert_eq!(oldest["number"], "INC1");

    assert_eq!(store.count("incidents", &filter).await.expect("count"), 2);
    assert_eq!(
        store.count("missing", &Filter::All).await.expect("count"),
        0
    );
}

#[tokio::test]
async fn delete_many_removes_only_matches() {
    let store = JsonDocumentStore::in_memory();
    store
        .insert_many(
            "call_contexts",
            [
                json!({"call_id": "old", "timestamp": {"$date": "2024-01-01T00:00:00.000Z"}}),
                json!({"call_id": "new", "timestamp": {"$date": "2024-03-01T00:00:00.000Z"}}),
            ],
        )
        .expect("seed");

    let removed = store
        .delete_many(
            "call_contexts",
            &Filter::lt("timestamp", json!({"$date": "2024-02-01T00:00:00.000Z"})),
        )
        .await
        .expect("delete");
    assert_eq!(removed, 1);
    assert!(store
        .find_one("call_contexts", &Filter::eq("call_id", "old"), &[])
        .await
        .expect("find")
        .is_none());
    let remaining = store
        .count("call_contexts", &Filter::All)
        .await
        .expect("count");
    assert_eq!(remaining, 1);
}

#[tokio::test]
async fn failed_persist_leaves_memory_matching_disk() {
    let path = temp_store_path();
    let store = JsonDocumentStore::open(&path).expect("open store");
    store
        .insert("tickets", json!({"number": "INC0010001"}))
        .expect("seed");

    std::fs::remove_file(&path).expect("remove store file");
    std::fs::create_dir(&path).expect("block store path");
    let batch = [
        json!({"number": "INC0010002"}),
        json!({"number": "INC0010003"}),
    ];
    assert!(store.insert_many("tickets", batch).is_err());
    assert_eq!(
        store.count("tickets", &Filter::All).await.expect("count"),
        1
    );

    let _ = std::fs::remove_dir(&path);
}
