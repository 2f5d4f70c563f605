//! Dependent selectors: choosing a parent (a property) determines the options
//! of the child (its plots).
//!
//! Selecting a parent clears and disables the child before the fetch is
//! issued. A fetch whose selection has since been superseded is discarded on
//! arrival, so a slow response for an earlier parent can never populate the
//! child with the wrong options.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use fieldkit_storage::{collections, FieldStore, Query, StoreError};
use serde::Serialize;

use crate::error::FieldError;

/// One entry of a selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceOption {
    pub id: String,
    pub label: String,
}

impl ChoiceOption {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Fetches the child options belonging to a parent.
#[async_trait]
pub trait OptionSource: Send + Sync {
    async fn fetch_options(&self, parent_id: &str) -> Result<Vec<ChoiceOption>, FieldError>;
}

/// Child selector state as shown to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeState {
    pub selected_parent: Option<String>,
    /// Sorted by label, ascending.
    pub child_options: Vec<ChoiceOption>,
    /// True iff a parent is selected and its options were fetched.
    pub child_enabled: bool,
}

/// What a parent selection did to the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeUpdate {
    /// No parent selected; child cleared and disabled.
    Cleared,
    /// Child populated with this many options and enabled.
    Populated(usize),
    /// The selection changed while the fetch was pending; response discarded.
    Stale,
}

#[derive(Default)]
struct Inner {
    state: CascadeState,
    generation: u64,
}

/// A parent/child selector pair. Instances are independent even when bound
/// to the same parent selector.
pub struct Cascade<S> {
    source: S,
    inner: Mutex<Inner>,
}

impl<S: OptionSource> Cascade<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn state(&self) -> CascadeState {
        self.lock().state.clone()
    }

    /// Reset to no selection, discarding any pending fetch.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.state = CascadeState::default();
    }

    /// Handle a change of the parent selection.
    ///
    /// A blank or absent parent short-circuits to the cleared state without
    /// fetching. A failed fetch leaves the child cleared and disabled and is
    /// returned to the caller, unless the selection has moved on, in which
    /// case it is discarded like any other stale response.
    pub async fn on_parent_selected(
        &self,
        parent_id: Option<&str>,
    ) -> Result<CascadeUpdate, FieldError> {
        let parent = parent_id.map(str::trim).filter(|p| !p.is_empty());
        let generation = {
            let mut inner = self.lock();
            inner.generation += 1;
            inner.state = CascadeState {
                selected_parent: parent.map(str::to_string),
                child_options: Vec::new(),
                child_enabled: false,
            };
            inner.generation
        };
        let Some(parent) = parent else {
            return Ok(CascadeUpdate::Cleared);
        };

        let fetched = self.source.fetch_options(parent).await;

        let mut inner = self.lock();
        if inner.generation != generation {
            tracing::debug!(parent, "discarding options for superseded selection");
            return Ok(CascadeUpdate::Stale);
        }
        match fetched {
            Ok(mut options) => {
                sort_by_label(&mut options);
                let count = options.len();
                inner.state.child_options = options;
                inner.state.child_enabled = true;
                Ok(CascadeUpdate::Populated(count))
            }
            Err(e) => {
                tracing::warn!(parent, error = %e, "could not load child options");
                Err(e)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Case-insensitive label order, ties broken by exact label then id.
fn sort_by_label(options: &mut [ChoiceOption]) {
    options.sort_by(|a, b| {
        a.label
            .to_lowercase()
            .cmp(&b.label.to_lowercase())
            .then_with(|| a.label.cmp(&b.label))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Options read from a store collection filtered by a parent reference field.
pub struct StoreOptionSource<S> {
    store: S,
    collection: String,
    parent_field: String,
    label_field: String,
}

impl<S: FieldStore> StoreOptionSource<S> {
    pub fn new(store: S, collection: &str, parent_field: &str, label_field: &str) -> Self {
        Self {
            store,
            collection: collection.to_string(),
            parent_field: parent_field.to_string(),
            label_field: label_field.to_string(),
        }
    }

    /// Plots of a property, labelled by plot name.
    pub fn plots(store: S) -> Self {
        Self::new(store, collections::PLOTS, "property_id", "name")
    }
}

#[async_trait]
impl<S: FieldStore> OptionSource for StoreOptionSource<S> {
    async fn fetch_options(&self, parent_id: &str) -> Result<Vec<ChoiceOption>, FieldError> {
        let rows = self
            .store
            .query(
                &self.collection,
                &Query::new().where_eq(&self.parent_field, parent_id),
            )
            .await?;
        rows.into_iter()
            .map(|row| -> Result<ChoiceOption, FieldError> {
                let label = row
                    .field(&self.label_field)
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| StoreError::Decode {
                        collection: row.collection.clone(),
                        id: row.id.clone(),
                        message: format!("missing string field '{}'", self.label_field),
                    })?
                    .to_string();
                Ok(ChoiceOption { id: row.id, label })
            })
            .collect()
    }
}
