//! Integration tests for the in-memory backend: filter/order semantics,
//! upsert matching on `id`, failure injection, and snapshot round-trips.

use serde_json::{Value, json};
use uuid::Uuid;

use mktplan_data::backend::{Backend, BackendError, Filter, Order, Relation, Row};
use mktplan_data::memory::MemoryBackend;

fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.clone()))
        .collect()
}

fn activity_row(template_id: Uuid, order_index: i64) -> Row {
    row(&[
        ("id", json!(Uuid::new_v4().to_string())),
        ("template_id", json!(template_id.to_string())),
        ("order_index", json!(order_index)),
    ])
}

#[tokio::test]
async fn select_filters_by_equality() {
    let backend = MemoryBackend::new();
    let template_a = Uuid::new_v4();
    let template_b = Uuid::new_v4();

    backend
        .insert(
            Relation::TemplateActivities,
            vec![
                activity_row(template_a, 0),
                activity_row(template_b, 0),
                activity_row(template_a, 1),
            ],
        )
        .await
        .unwrap();

    let filter = Filter::new().eq("template_id", template_a);
    let rows = backend
        .select(Relation::TemplateActivities, &filter, None)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    for r in &rows {
        assert_eq!(r["template_id"], json!(template_a.to_string()));
    }
}

#[tokio::test]
async fn select_orders_ascending() {
    let backend = MemoryBackend::new();
    let template_id = Uuid::new_v4();

    backend
        .insert(
            Relation::TemplateActivities,
            vec![
                activity_row(template_id, 2),
                activity_row(template_id, 0),
                activity_row(template_id, 1),
            ],
        )
        .await
        .unwrap();

    let rows = backend
        .select(
            Relation::TemplateActivities,
            &Filter::new(),
            Some(&Order::asc("order_index")),
        )
        .await
        .unwrap();

    let indices: Vec<i64> = rows.iter().map(|r| r["order_index"].as_i64().unwrap()).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[tokio::test]
async fn insert_returns_first_row_and_rejects_empty() {
    let backend = MemoryBackend::new();
    let first = row(&[("id", json!("a")), ("title", json!("hello"))]);

    let returned = backend
        .insert(Relation::Documents, vec![first.clone()])
        .await
        .unwrap();
    assert_eq!(returned, first);

    let result = backend.insert(Relation::Documents, vec![]).await;
    assert!(matches!(result, Err(BackendError::Invalid(_))));
}

#[tokio::test]
async fn update_merges_patch_into_matching_rows() {
    let backend = MemoryBackend::new();
    backend
        .insert(
            Relation::Tasks,
            vec![
                row(&[("id", json!("t1")), ("status", json!("open"))]),
                row(&[("id", json!("t2")), ("status", json!("open"))]),
            ],
        )
        .await
        .unwrap();

    let filter = Filter::new().eq("id", "t1");
    backend
        .update(Relation::Tasks, &filter, row(&[("status", json!("done"))]))
        .await
        .unwrap();

    let rows = backend
        .select(Relation::Tasks, &Filter::new(), Some(&Order::asc("id")))
        .await
        .unwrap();
    assert_eq!(rows[0]["status"], json!("done"));
    assert_eq!(rows[1]["status"], json!("open"));
}

#[tokio::test]
async fn delete_removes_only_matching_rows() {
    let backend = MemoryBackend::new();
    backend
        .insert(
            Relation::Tasks,
            vec![
                row(&[("id", json!("t1"))]),
                row(&[("id", json!("t2"))]),
            ],
        )
        .await
        .unwrap();

    backend
        .delete(Relation::Tasks, &Filter::new().eq("id", "t1"))
        .await
        .unwrap();

    assert_eq!(backend.row_count(Relation::Tasks), 1);
    let rows = backend
        .select(Relation::Tasks, &Filter::new(), None)
        .await
        .unwrap();
    assert_eq!(rows[0]["id"], json!("t2"));
}

#[tokio::test]
async fn upsert_replaces_on_id_and_appends_otherwise() {
    let backend = MemoryBackend::new();
    backend
        .insert(
            Relation::Plans,
            vec![row(&[("id", json!("p1")), ("title", json!("old"))])],
        )
        .await
        .unwrap();

    backend
        .upsert(
            Relation::Plans,
            vec![
                row(&[("id", json!("p1")), ("title", json!("new"))]),
                row(&[("id", json!("p2")), ("title", json!("fresh"))]),
            ],
        )
        .await
        .unwrap();

    let rows = backend
        .select(Relation::Plans, &Filter::new(), Some(&Order::asc("id")))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["title"], json!("new"));
    assert_eq!(rows[1]["title"], json!("fresh"));
}

#[tokio::test]
async fn fail_next_fails_exactly_one_call() {
    let backend = MemoryBackend::new();
    backend.fail_next("simulated outage");

    let result = backend
        .select(Relation::Plans, &Filter::new(), None)
        .await;
    match result {
        Err(BackendError::Unavailable(message)) => assert_eq!(message, "simulated outage"),
        other => panic!("expected Unavailable, got {other:?}"),
    }

    // The following call succeeds again.
    let rows = backend
        .select(Relation::Plans, &Filter::new(), None)
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn fail_after_lets_the_allowed_calls_through_first() {
    let backend = MemoryBackend::new();
    backend.fail_after(2, "third call down");

    for _ in 0..2 {
        backend
            .select(Relation::Plans, &Filter::new(), None)
            .await
            .unwrap();
    }

    let result = backend.select(Relation::Plans, &Filter::new(), None).await;
    match result {
        Err(BackendError::Unavailable(message)) => assert_eq!(message, "third call down"),
        other => panic!("expected Unavailable, got {other:?}"),
    }

    // And armed only once.
    backend
        .select(Relation::Plans, &Filter::new(), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn snapshot_roundtrip() {
    let backend = MemoryBackend::new();
    backend
        .insert(
            Relation::Templates,
            vec![row(&[("id", json!("t1")), ("title", json!("Launch"))])],
        )
        .await
        .unwrap();
    backend
        .insert(
            Relation::Documents,
            vec![row(&[("id", json!("d1")), ("body", json!("notes"))])],
        )
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    backend.save_snapshot(&path).unwrap();

    let restored = MemoryBackend::load_snapshot(&path).unwrap();
    assert_eq!(restored.row_count(Relation::Templates), 1);
    assert_eq!(restored.row_count(Relation::Documents), 1);

    let rows = restored
        .select(Relation::Templates, &Filter::new(), None)
        .await
        .unwrap();
    assert_eq!(rows[0]["title"], json!("Launch"));
}

#[tokio::test]
async fn snapshot_skips_unknown_relations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    std::fs::write(
        &path,
        r#"{"templates": [{"id": "t1"}], "widgets": [{"id": "w1"}]}"#,
    )
    .unwrap();

    let backend = MemoryBackend::load_snapshot(&path).unwrap();
    assert_eq!(backend.row_count(Relation::Templates), 1);
}
