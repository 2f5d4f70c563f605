//! Scheduled field tasks.

use fieldkit_storage::{
    collections, server_timestamp, to_document, Direction, FieldStore, Query, TaskRecord,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::macros::format_description;
use time::Date;

use crate::error::{blank_fields, FieldError};

pub const STATUS_PENDING: &str = "pending";

/// User input for a new task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    /// `YYYY-MM-DD`.
    pub due_date: String,
    pub property_id: String,
    pub plot_id: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Serialize)]
struct NewTask<'a> {
    agronomist_id: &'a str,
    title: &'a str,
    due_date: String,
    property_id: &'a str,
    plot_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
    status: &'a str,
    created_at: Value,
}

/// Parse an ISO calendar date, normalising it to `YYYY-MM-DD`.
pub fn parse_due_date(raw: &str) -> Result<String, FieldError> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(raw.trim(), format)
        .ok()
        .and_then(|date| date.format(format).ok())
        .ok_or_else(|| {
            FieldError::Validation(format!(
                "due date '{}' is not a calendar date (YYYY-MM-DD)",
                raw.trim()
            ))
        })
}

/// Validate and persist a task for `agronomist_id`.
///
/// Every missing required field (title, due date, property, plot) is named
/// in a single validation error.
pub async fn schedule_task<S: FieldStore>(
    store: &S,
    agronomist_id: &str,
    draft: &TaskDraft,
) -> Result<TaskRecord, FieldError> {
    let missing = blank_fields(&[
        ("title", draft.title.as_str()),
        ("due_date", draft.due_date.as_str()),
        ("property", draft.property_id.as_str()),
        ("plot", draft.plot_id.as_str()),
    ]);
    if !missing.is_empty() {
        return Err(FieldError::missing_fields(&missing));
    }
    let due_date = parse_due_date(&draft.due_date)?;
    let notes = draft
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let document = to_document(&NewTask {
        agronomist_id,
        title: draft.title.trim(),
        due_date,
        property_id: draft.property_id.trim(),
        plot_id: draft.plot_id.trim(),
        notes,
        status: STATUS_PENDING,
        created_at: server_timestamp(),
    })?;
    let created = store.create(collections::TASKS, document).await?;
    tracing::info!(task_id = %created.id, agronomist_id, "task scheduled");
    Ok(created.decode()?)
}

/// Tasks of `agronomist_id`, soonest due first.
pub async fn list_tasks<S: FieldStore>(
    store: &S,
    agronomist_id: &str,
) -> Result<Vec<TaskRecord>, FieldError> {
    let rows = store
        .query(
            collections::TASKS,
            &Query::new()
                .where_eq("agronomist_id", agronomist_id)
                .order_by("due_date", Direction::Ascending),
        )
        .await?;
    rows.iter()
        .map(|row| row.decode().map_err(FieldError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldkit_storage::LocalStore;

    fn draft() -> TaskDraft {
        TaskDraft {
            title: "Scout for aphids".into(),
            due_date: "2026-11-03".into(),
            property_id: "prop-1".into(),
            plot_id: "plot-7".into(),
            notes: Some("  ".into()),
        }
    }

    #[test]
    fn due_date_must_be_a_real_date() {
        assert_eq!(parse_due_date(" 2026-02-28 ").unwrap(), "2026-02-28");
        assert!(parse_due_date("2026-02-30").is_err());
        assert!(parse_due_date("03/11/2026").is_err());
    }

    #[tokio::test]
    async fn missing_fields_are_all_reported() {
        let store = LocalStore::new();
        let err = schedule_task(
            &store,
            "ag-1",
            &TaskDraft {
                title: " ".into(),
                plot_id: String::new(),
                ..draft()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required field(s): title, plot"
        );
        assert_eq!(store.count(collections::TASKS).unwrap(), 0);
    }

    #[tokio::test]
    async fn scheduled_task_is_pending_with_server_timestamp() {
        let store = LocalStore::new();
        let task = schedule_task(&store, "ag-1", &draft()).await.unwrap();
        assert_eq!(task.status, STATUS_PENDING);
        assert_eq!(task.title, "Scout for aphids");
        assert_eq!(task.notes, None);
        assert!(!task.created_at.is_empty());
    }

    #[tokio::test]
    async fn list_orders_by_due_date_and_filters_by_agronomist() {
        let store = LocalStore::new();
        for (who, date) in [("ag-1", "2026-12-01"), ("ag-2", "2026-10-01"), ("ag-1", "2026-11-01")] {
            schedule_task(
                &store,
                who,
                &TaskDraft {
                    due_date: date.into(),
                    ..draft()
                },
            )
            .await
            .unwrap();
        }
        let tasks = list_tasks(&store, "ag-1").await.unwrap();
        let dates: Vec<_> = tasks.iter().map(|t| t.due_date.as_str()).collect();
        assert_eq!(dates, vec!["2026-11-01", "2026-12-01"]);
    }
}
