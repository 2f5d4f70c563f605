//! Field activities (spraying, fertilising, harvest, ...) recorded against
//! the active crop cycle of a plot.

use fieldkit_storage::{
    collections, server_timestamp, to_document, ActivityRecord, CropCycleRecord, FieldStore,
    Query,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{blank_fields, FieldError};

pub const CYCLE_ACTIVE: &str = "active";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ActivityDraft {
    pub plot_id: String,
    pub kind: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Serialize)]
struct NewActivity<'a> {
    plot_id: &'a str,
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
    agronomist_id: &'a str,
    recorded_at: Value,
}

/// The active crop cycle on `plot_id`.
///
/// Fails with [`FieldError::NotFound`] when the plot has none.
pub async fn active_crop_cycle<S: FieldStore>(
    store: &S,
    plot_id: &str,
) -> Result<CropCycleRecord, FieldError> {
    let rows = store
        .query(
            collections::CROP_CYCLES,
            &Query::new()
                .where_eq("plot_id", plot_id)
                .where_eq("status", CYCLE_ACTIVE),
        )
        .await?;
    if rows.len() > 1 {
        tracing::warn!(plot_id, count = rows.len(), "plot has several active crop cycles");
    }
    match rows.first() {
        Some(row) => Ok(row.decode()?),
        None => Err(FieldError::NotFound {
            what: format!("active crop cycle for plot '{}'", plot_id),
        }),
    }
}

/// Record an activity under the plot's active crop cycle.
pub async fn register_activity<S: FieldStore>(
    store: &S,
    agronomist_id: &str,
    draft: &ActivityDraft,
) -> Result<ActivityRecord, FieldError> {
    let missing = blank_fields(&[("plot", draft.plot_id.as_str()), ("kind", draft.kind.as_str())]);
    if !missing.is_empty() {
        return Err(FieldError::missing_fields(&missing));
    }
    let plot_id = draft.plot_id.trim();
    let cycle = active_crop_cycle(store, plot_id).await?;

    let document = to_document(&NewActivity {
        plot_id,
        kind: draft.kind.trim(),
        notes: draft
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty()),
        agronomist_id,
        recorded_at: server_timestamp(),
    })?;
    let created = store
        .create(&collections::activities(&cycle.id), document)
        .await?;
    tracing::info!(activity_id = %created.id, cycle_id = %cycle.id, "activity registered");
    Ok(created.decode()?)
}
