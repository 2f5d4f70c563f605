use std::future::Future;

use serde_json::json;

use super::{doc, TestResult};
use crate::{FieldStore, Query, StoreError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "error",
            "get_nonexistent_returns_not_found",
            get_nonexistent_returns_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "update_nonexistent_returns_not_found",
            update_nonexistent_returns_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "document_path_is_not_a_collection",
            document_path_is_not_a_collection(factory).await,
        ),
    ]
}

async fn get_nonexistent_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get("visits", "visit-999").await {
        Err(StoreError::NotFound { collection, id }) => {
            if collection != "visits" || id != "visit-999" {
                return Err(format!("NotFound carries wrong fields: {collection}/{id}"));
            }
            Ok(())
        }
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

async fn update_nonexistent_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s
        .update("visits", "visit-999", doc(json!({"status": "completed"})))
        .await
    {
        Err(StoreError::NotFound { .. }) => {}
        other => return Err(format!("expected NotFound, got {:?}", other)),
    }
    // A failed update must not create the document.
    let rows = s
        .query("visits", &Query::new())
        .await
        .map_err(|e| format!("query: {e}"))?;
    if !rows.is_empty() {
        return Err("update of a missing document created it".to_string());
    }
    Ok(())
}

async fn document_path_is_not_a_collection<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.create("visits/v-1", doc(json!({"x": 1}))).await {
        Err(StoreError::InvalidPath { .. }) => Ok(()),
        other => Err(format!("expected InvalidPath, got {:?}", other)),
    }
}
