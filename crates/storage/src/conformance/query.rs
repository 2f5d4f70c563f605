use std::future::Future;

use serde_json::json;

use super::{doc, TestResult};
use crate::{Direction, FieldStore, Query};

pub(super) async fn run_query_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "query",
            "query_empty_collection_returns_nothing",
            query_empty_collection_returns_nothing(factory).await,
        ),
        TestResult::from_result(
            "query",
            "query_applies_all_filters",
            query_applies_all_filters(factory).await,
        ),
        TestResult::from_result(
            "query",
            "query_orders_descending_and_limits",
            query_orders_descending_and_limits(factory).await,
        ),
    ]
}

async fn query_empty_collection_returns_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let rows = s
        .query("visits", &Query::new().where_eq("status", "in_progress"))
        .await
        .map_err(|e| format!("query: {e}"))?;
    if !rows.is_empty() {
        return Err(format!("expected no rows, got {}", rows.len()));
    }
    Ok(())
}

async fn query_applies_all_filters<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for (agronomist, status) in [
        ("ag-1", "in_progress"),
        ("ag-1", "completed"),
        ("ag-2", "in_progress"),
    ] {
        s.create(
            "visits",
            doc(json!({"agronomist_id": agronomist, "status": status})),
        )
        .await
        .map_err(|e| format!("create: {e}"))?;
    }
    let rows = s
        .query(
            "visits",
            &Query::new()
                .where_eq("agronomist_id", "ag-1")
                .where_eq("status", "in_progress"),
        )
        .await
        .map_err(|e| format!("query: {e}"))?;
    if rows.len() != 1 {
        return Err(format!("expected 1 row, got {}", rows.len()));
    }
    Ok(())
}

async fn query_orders_descending_and_limits<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for day in ["2026-03-01", "2026-03-09", "2026-03-05"] {
        s.create("tasks", doc(json!({"due_date": day})))
            .await
            .map_err(|e| format!("create: {e}"))?;
    }
    let rows = s
        .query(
            "tasks",
            &Query::new()
                .order_by("due_date", Direction::Descending)
                .limit(2),
        )
        .await
        .map_err(|e| format!("query: {e}"))?;
    let days: Vec<_> = rows
        .iter()
        .filter_map(|r| r.field("due_date").and_then(|v| v.as_str()))
        .collect();
    if days != ["2026-03-09", "2026-03-05"] {
        return Err(format!("unexpected order: {days:?}"));
    }
    Ok(())
}
