use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use serde_json::json;

use super::{doc, TestResult};
use crate::{FieldStore, Query, StoreError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "concurrent_creates_all_land",
            concurrent_creates_all_land(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_updates_to_different_documents_all_apply",
            concurrent_updates_to_different_documents_all_apply(factory).await,
        ),
    ]
}

/// N tasks create documents in the same collection in parallel. Every
/// create succeeds with a distinct id.
async fn concurrent_creates_all_land<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            s.create("visits", doc(json!({"n": i}))).await
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        let created = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StoreError| format!("storage error: {e}"))?;
        ids.insert(created.id);
    }
    if ids.len() != N {
        return Err(format!("expected {N} distinct ids, got {}", ids.len()));
    }

    let rows = store
        .query("visits", &Query::new())
        .await
        .map_err(|e| format!("query: {e}"))?;
    if rows.len() != N {
        return Err(format!("expected {N} stored documents, got {}", rows.len()));
    }
    Ok(())
}

async fn concurrent_updates_to_different_documents_all_apply<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);

    let mut ids = Vec::new();
    for _ in 0..N {
        let created = store
            .create("visits", doc(json!({"status": "in_progress"})))
            .await
            .map_err(|e| format!("create: {e}"))?;
        ids.push(created.id);
    }

    let mut handles = Vec::new();
    for id in ids.clone() {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            s.update("visits", &id, doc(json!({"status": "completed"})))
                .await
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        handle
            .await
            .map_err(|e| format!("task {i} panic: {e}"))?
            .map_err(|e| format!("task {i} failed: {e}"))?;
    }

    for id in &ids {
        let got = store
            .get("visits", id)
            .await
            .map_err(|e| format!("get {id}: {e}"))?;
        if got.field("status") != Some(&json!("completed")) {
            return Err(format!("{id}: update lost"));
        }
    }
    Ok(())
}
