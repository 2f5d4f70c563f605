use fieldkit_storage::StoreError;

use crate::location::LocationError;

/// Errors reported to the UI action that initiated an operation.
///
/// None of these are retried by the core; a retry is the user repeating the
/// action.
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    /// A visit is already held; a second one cannot be started.
    #[error("a visit is already in progress ({visit_id})")]
    Conflict { visit_id: String },

    /// The operation needs an in-progress visit and none is held.
    #[error("no visit is in progress")]
    NoActiveVisit,

    /// Required input is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// The geolocation read failed or timed out. No store write happened.
    #[error("location unavailable: {0}")]
    LocationUnavailable(#[from] LocationError),

    /// A referenced parent record does not exist.
    #[error("{what} not found")]
    NotFound { what: String },

    /// The document store rejected or failed the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FieldError {
    /// Validation error naming every missing required field.
    pub fn missing_fields(fields: &[&str]) -> Self {
        FieldError::Validation(format!("missing required field(s): {}", fields.join(", ")))
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, FieldError::Store(e) if e.is_permission_denied())
    }
}

/// Collect the names of blank fields, in the order given.
pub(crate) fn blank_fields<'a>(fields: &[(&'a str, &str)]) -> Vec<&'a str> {
    fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect()
}
