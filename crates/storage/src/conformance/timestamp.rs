use std::future::Future;

use serde_json::json;

use super::{doc, TestResult};
use crate::{is_server_timestamp, server_timestamp, FieldStore};

pub(super) async fn run_timestamp_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "timestamp",
            "create_resolves_sentinel",
            create_resolves_sentinel(factory).await,
        ),
        TestResult::from_result(
            "timestamp",
            "update_resolves_sentinel",
            update_resolves_sentinel(factory).await,
        ),
        TestResult::from_result(
            "timestamp",
            "later_writes_get_later_timestamps",
            later_writes_get_later_timestamps(factory).await,
        ),
    ]
}

/// The returned and the re-read document both carry a concrete timestamp.
async fn create_resolves_sentinel<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = s
        .create("visits", doc(json!({"check_in_time": server_timestamp()})))
        .await
        .map_err(|e| format!("create: {e}"))?;
    let returned = created
        .field("check_in_time")
        .ok_or("returned document lost check_in_time")?;
    if is_server_timestamp(returned) || !returned.is_string() {
        return Err(format!("sentinel not resolved in returned document: {returned}"));
    }
    let stored = s
        .get("visits", &created.id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if stored.field("check_in_time") != Some(returned) {
        return Err("stored timestamp differs from returned timestamp".to_string());
    }
    Ok(())
}

async fn update_resolves_sentinel<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let created = s
        .create("visits", doc(json!({"status": "in_progress"})))
        .await
        .map_err(|e| format!("create: {e}"))?;
    let updated = s
        .update(
            "visits",
            &created.id,
            doc(json!({"check_out_time": server_timestamp()})),
        )
        .await
        .map_err(|e| format!("update: {e}"))?;
    match updated.field("check_out_time") {
        Some(v) if v.is_string() => Ok(()),
        other => Err(format!("check_out_time not resolved: {other:?}")),
    }
}

/// Timestamps of sequential writes order correctly as strings, which is
/// what recovery ordering by check-in time relies on.
async fn later_writes_get_later_timestamps<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: FieldStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let first = s
        .create("visits", doc(json!({"t": server_timestamp()})))
        .await
        .map_err(|e| format!("create first: {e}"))?;
    let second = s
        .create("visits", doc(json!({"t": server_timestamp()})))
        .await
        .map_err(|e| format!("create second: {e}"))?;
    let a = first.field("t").and_then(|v| v.as_str()).unwrap_or_default();
    let b = second.field("t").and_then(|v| v.as_str()).unwrap_or_default();
    if a >= b {
        return Err(format!("expected {a} < {b}"));
    }
    Ok(())
}
