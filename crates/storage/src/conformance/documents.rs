use std::future::Future;

use serde_json::json;

use super::{doc, TestResult};
use crate::FieldStore;

pub(super) async fn run_document_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "documents",
            "create_assigns_distinct_ids",
            create_assigns_distinct_ids(factory).await,
        ),
        TestResult::from_result(
            "documents",
            "get_returns_created_fields",
            get_returns_created_fields(factory).await,
        ),
        TestResult::from_result(
            "documents",
            "update_merges_without_dropping_fields",
            update_merges_without_dropping_fields(factory).await,
        ),
        TestResult::from_result(
            "documents",
            "update_returns_merged_document",
            update_returns_merged_document(factory).await,
        ),
        TestResult::from_result(
            "documents",
            "subcollections_are_independent_of_parent",
            subcollections_are_independent_of_parent(factory).await,
        ),
    ]
}

async fn create_assigns_distinct_ids<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let a = s
        .create("visits", doc(json!({"n": 1})))
        .await
        .map_err(|e| format!("create a: {e}"))?;
    let b = s
        .create("visits", doc(json!({"n": 2})))
        .await
        .map_err(|e| format!("create b: {e}"))?;
    if a.id.is_empty() || b.id.is_empty() {
        return Err("store assigned an empty id".to_string());
    }
    if a.id == b.id {
        return Err(format!("both documents got id {}", a.id));
    }
    Ok(())
}

async fn get_returns_created_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = s
        .create(
            "visits",
            doc(json!({"client_id": "c-1", "check_in_coords": {"latitude": 1.5, "longitude": -2.0}})),
        )
        .await
        .map_err(|e| format!("create: {e}"))?;
    let got = s
        .get("visits", &created.id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if got.field("client_id") != Some(&json!("c-1")) {
        return Err(format!("client_id mismatch: {:?}", got.field("client_id")));
    }
    if got.field("check_in_coords") != Some(&json!({"latitude": 1.5, "longitude": -2.0})) {
        return Err(format!(
            "nested coords mismatch: {:?}",
            got.field("check_in_coords")
        ));
    }
    Ok(())
}

async fn update_merges_without_dropping_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = s
        .create("visits", doc(json!({"status": "in_progress", "client_id": "c-1"})))
        .await
        .map_err(|e| format!("create: {e}"))?;
    s.update("visits", &created.id, doc(json!({"status": "completed"})))
        .await
        .map_err(|e| format!("update: {e}"))?;
    let got = s
        .get("visits", &created.id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if got.field("status") != Some(&json!("completed")) {
        return Err(format!("status not updated: {:?}", got.field("status")));
    }
    if got.field("client_id") != Some(&json!("c-1")) {
        return Err("update dropped an untouched field".to_string());
    }
    Ok(())
}

async fn update_returns_merged_document<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = s
        .create("visits", doc(json!({"a": 1})))
        .await
        .map_err(|e| format!("create: {e}"))?;
    let updated = s
        .update("visits", &created.id, doc(json!({"b": 2})))
        .await
        .map_err(|e| format!("update: {e}"))?;
    if updated.id != created.id {
        return Err(format!("update changed id: {} -> {}", created.id, updated.id));
    }
    if updated.field("a") != Some(&json!(1)) || updated.field("b") != Some(&json!(2)) {
        return Err(format!("unexpected merged document: {:?}", updated.data));
    }
    Ok(())
}

async fn subcollections_are_independent_of_parent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let visit = s
        .create("visits", doc(json!({"status": "in_progress"})))
        .await
        .map_err(|e| format!("create visit: {e}"))?;
    let child_path = format!("visits/{}/observations", visit.id);
    s.create(&child_path, doc(json!({"text": "rust on leaves"})))
        .await
        .map_err(|e| format!("create observation: {e}"))?;

    let parents = s
        .query("visits", &crate::Query::new())
        .await
        .map_err(|e| format!("query visits: {e}"))?;
    if parents.len() != 1 {
        return Err(format!("expected 1 visit, got {}", parents.len()));
    }
    let children = s
        .query(&child_path, &crate::Query::new())
        .await
        .map_err(|e| format!("query observations: {e}"))?;
    if children.len() != 1 {
        return Err(format!("expected 1 observation, got {}", children.len()));
    }
    Ok(())
}
