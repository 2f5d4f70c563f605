//! Visit lifecycle controller.
//!
//! ```text
//!   Idle ──start_visit / check_in_here──▶ InProgress(visit)
//!    ▲                                      │  add_observation (stays)
//!    └──────────────end_visit───────────────┘
//! ```
//!
//! The controller is the only owner of the held visit. Every transition runs
//! under one [`SingleFlight`]: while a transition is pending, further calls
//! (double taps, a check-out racing an observation) return `None` without
//! touching the store. Transitions that need a position read it through the
//! controller's [`LocationPolicy`] before writing anything.
//!
//! The store write and the local transition are not atomic. When the write
//! lands but the local update cannot be completed the controller marks itself
//! desynced and the next operation first re-reads the agronomist's
//! in-progress visit from the store.

use std::sync::{Mutex, MutexGuard, PoisonError};

use fieldkit_guard::SingleFlight;
use fieldkit_storage::{
    collections, server_timestamp, to_document, Coords, Direction, FieldStore, ObservationRecord,
    Query, StoreError, VisitRecord, VisitStatus,
};
use serde::Serialize;
use serde_json::Value;

use crate::error::{blank_fields, FieldError};
use crate::location::{validate_coords, LocationPolicy, LocationProvider};

/// Externally observable controller state.
#[derive(Debug, Clone, PartialEq)]
pub enum VisitState {
    Idle,
    InProgress(VisitRecord),
}

impl VisitState {
    pub fn is_idle(&self) -> bool {
        matches!(self, VisitState::Idle)
    }

    pub fn visit(&self) -> Option<&VisitRecord> {
        match self {
            VisitState::Idle => None,
            VisitState::InProgress(visit) => Some(visit),
        }
    }
}

/// Who and where a visit is for, captured at check-in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckIn {
    pub client_id: String,
    pub property_id: String,
    pub client_name: String,
    pub property_name: String,
}

/// Input for an observation. At least one of text and image must be present.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Observation {
    pub text: Option<String>,
    pub image_ref: Option<String>,
}

impl Observation {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image_ref: None,
        }
    }

    pub fn image(image_ref: impl Into<String>) -> Self {
        Self {
            text: None,
            image_ref: Some(image_ref.into()),
        }
    }

    /// Trim both parts, dropping blank ones; fail if nothing is left.
    fn normalized(self) -> Result<Self, FieldError> {
        let clean = |s: Option<String>| {
            s.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let normalized = Self {
            text: clean(self.text),
            image_ref: clean(self.image_ref),
        };
        if normalized.text.is_none() && normalized.image_ref.is_none() {
            return Err(FieldError::Validation(
                "an observation needs text or an image".to_string(),
            ));
        }
        Ok(normalized)
    }
}

/// Outcome of recovering the held visit from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovery {
    /// The visit now held, if any.
    pub visit: Option<VisitRecord>,
    /// Ids of further in-progress visits for the same agronomist. Non-empty
    /// only when the one-visit invariant has been violated in the store.
    pub duplicates: Vec<String>,
}

impl Recovery {
    pub fn is_consistent(&self) -> bool {
        self.duplicates.is_empty()
    }
}

#[derive(Serialize)]
struct NewVisit<'a> {
    agronomist_id: &'a str,
    client_id: &'a str,
    property_id: &'a str,
    client_name: &'a str,
    property_name: &'a str,
    check_in_time: Value,
    check_in_coords: Coords,
    status: VisitStatus,
}

#[derive(Serialize)]
struct NewObservation<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_ref: Option<&'a str>,
    coords: Coords,
    timestamp: Value,
}

#[derive(Serialize)]
struct CheckOut {
    check_out_time: Value,
    check_out_coords: Coords,
    status: VisitStatus,
}

#[derive(Default)]
struct Held {
    visit: Option<VisitRecord>,
    desynced: bool,
}

/// Owns the single in-progress visit of one agronomist.
pub struct VisitController<S, L> {
    store: S,
    location: L,
    agronomist_id: String,
    policy: LocationPolicy,
    held: Mutex<Held>,
    flight: SingleFlight,
}

impl<S, L> VisitController<S, L>
where
    S: FieldStore,
    L: LocationProvider,
{
    /// A controller in `Idle`. Call [`recover`](Self::recover) on load to
    /// pick up a visit started in an earlier session.
    pub fn new(store: S, location: L, agronomist_id: impl Into<String>) -> Self {
        Self {
            store,
            location,
            agronomist_id: agronomist_id.into(),
            policy: LocationPolicy::default(),
            held: Mutex::new(Held::default()),
            flight: SingleFlight::new(),
        }
    }

    pub fn with_policy(mut self, policy: LocationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn agronomist_id(&self) -> &str {
        &self.agronomist_id
    }

    pub fn policy(&self) -> &LocationPolicy {
        &self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn state(&self) -> VisitState {
        match &self.held().visit {
            Some(visit) => VisitState::InProgress(visit.clone()),
            None => VisitState::Idle,
        }
    }

    /// Whether a transition is currently pending.
    pub fn is_busy(&self) -> bool {
        self.flight.is_in_flight()
    }

    // ── Guarded operations ───────────────────────────────────────────────────
    //
    // Each returns `None` when another operation on this controller is in
    // flight; the call is dropped without side effects.

    /// Re-read the agronomist's in-progress visit from the store.
    ///
    /// Keeps the most recent check-in if the store holds several; the others
    /// are reported in [`Recovery::duplicates`].
    pub async fn recover(&self) -> Option<Result<Recovery, FieldError>> {
        self.flight.run(self.recover_inner()).await
    }

    /// Start a visit at coordinates reported by the caller (e.g. the map
    /// marker the user started the visit from).
    pub async fn start_visit(
        &self,
        check_in: CheckIn,
        coords: Coords,
    ) -> Option<Result<VisitRecord, FieldError>> {
        self.flight
            .run(self.start_inner(check_in, Some(coords)))
            .await
    }

    /// Start a visit at the current position.
    pub async fn check_in_here(&self, check_in: CheckIn) -> Option<Result<VisitRecord, FieldError>> {
        self.flight.run(self.start_inner(check_in, None)).await
    }

    /// Attach an observation to the held visit at the current position.
    pub async fn add_observation(
        &self,
        observation: Observation,
    ) -> Option<Result<ObservationRecord, FieldError>> {
        self.flight.run(self.observe_inner(observation)).await
    }

    /// Check out of the held visit at the current position.
    ///
    /// On any failure the visit stays in progress.
    pub async fn end_visit(&self) -> Option<Result<VisitRecord, FieldError>> {
        self.flight.run(self.end_inner()).await
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    /// Observations of the held visit, oldest first.
    pub async fn observations(&self) -> Result<Vec<ObservationRecord>, FieldError> {
        let visit = self.held().visit.clone().ok_or(FieldError::NoActiveVisit)?;
        let rows = self
            .store
            .query(
                &collections::observations(&visit.id),
                &Query::new().order_by("timestamp", Direction::Ascending),
            )
            .await?;
        rows.iter()
            .map(|row| row.decode().map_err(FieldError::from))
            .collect()
    }

    // ── Transitions ──────────────────────────────────────────────────────────

    async fn recover_inner(&self) -> Result<Recovery, FieldError> {
        let query = Query::new()
            .where_eq("agronomist_id", self.agronomist_id.as_str())
            .where_eq("status", VisitStatus::InProgress.as_str())
            .order_by("check_in_time", Direction::Descending);
        let rows = self.store.query(collections::VISITS, &query).await?;

        let mut visits = rows
            .iter()
            .map(|row| row.decode::<VisitRecord>())
            .collect::<Result<Vec<_>, StoreError>>()?;
        let visit = if visits.is_empty() {
            None
        } else {
            Some(visits.remove(0))
        };
        let duplicates: Vec<String> = visits.into_iter().map(|v| v.id).collect();

        match &visit {
            Some(held) if !duplicates.is_empty() => tracing::warn!(
                agronomist_id = %self.agronomist_id,
                kept = %held.id,
                duplicates = ?duplicates,
                "several in-progress visits found; keeping the most recent check-in"
            ),
            Some(held) => {
                tracing::info!(agronomist_id = %self.agronomist_id, visit_id = %held.id, "recovered in-progress visit")
            }
            None => tracing::debug!(agronomist_id = %self.agronomist_id, "no in-progress visit"),
        }

        let mut held = self.held();
        held.visit = visit.clone();
        held.desynced = false;
        Ok(Recovery { visit, duplicates })
    }

    async fn start_inner(
        &self,
        check_in: CheckIn,
        coords: Option<Coords>,
    ) -> Result<VisitRecord, FieldError> {
        self.resync_if_needed().await?;
        if let Some(current) = &self.held().visit {
            return Err(FieldError::Conflict {
                visit_id: current.id.clone(),
            });
        }

        let missing = blank_fields(&[
            ("client", check_in.client_id.as_str()),
            ("property", check_in.property_id.as_str()),
        ]);
        if !missing.is_empty() {
            return Err(FieldError::missing_fields(&missing));
        }

        let coords = match coords {
            Some(coords) => validate_coords(coords)
                .map_err(|e| FieldError::Validation(e.to_string()))?,
            None => self.policy.read(&self.location).await?.coords,
        };

        let document = to_document(&NewVisit {
            agronomist_id: &self.agronomist_id,
            client_id: &check_in.client_id,
            property_id: &check_in.property_id,
            client_name: &check_in.client_name,
            property_name: &check_in.property_name,
            check_in_time: server_timestamp(),
            check_in_coords: coords,
            status: VisitStatus::InProgress,
        })?;
        let created = self.store.create(collections::VISITS, document).await?;
        let visit = self.decode_after_write::<VisitRecord>(&created)?;

        tracing::info!(visit_id = %visit.id, property_id = %visit.property_id, "visit started");
        self.held().visit = Some(visit.clone());
        Ok(visit)
    }

    async fn observe_inner(&self, observation: Observation) -> Result<ObservationRecord, FieldError> {
        self.resync_if_needed().await?;
        let visit_id = self
            .held()
            .visit
            .as_ref()
            .map(|v| v.id.clone())
            .ok_or(FieldError::NoActiveVisit)?;
        let observation = observation.normalized()?;
        let position = self.policy.read(&self.location).await?;

        let document = to_document(&NewObservation {
            text: observation.text.as_deref(),
            image_ref: observation.image_ref.as_deref(),
            coords: position.coords,
            timestamp: server_timestamp(),
        })?;
        let created = self
            .store
            .create(&collections::observations(&visit_id), document)
            .await?;

        tracing::info!(visit_id = %visit_id, observation_id = %created.id, "observation added");
        // The error names the stored id, so the caller can tell the write
        // landed and must not resubmit.
        created.decode().map_err(|e| {
            tracing::warn!(
                visit_id = %visit_id,
                observation_id = %created.id,
                error = %e,
                "observation stored but could not be read back"
            );
            FieldError::from(e)
        })
    }

    async fn end_inner(&self) -> Result<VisitRecord, FieldError> {
        self.resync_if_needed().await?;
        let visit_id = self
            .held()
            .visit
            .as_ref()
            .map(|v| v.id.clone())
            .ok_or(FieldError::NoActiveVisit)?;
        let position = self.policy.read(&self.location).await?;

        let patch = to_document(&CheckOut {
            check_out_time: server_timestamp(),
            check_out_coords: position.coords,
            status: VisitStatus::Completed,
        })?;
        let updated = self
            .store
            .update(collections::VISITS, &visit_id, patch)
            .await?;
        let visit = self.decode_after_write::<VisitRecord>(&updated)?;

        tracing::info!(visit_id = %visit.id, "visit completed");
        self.held().visit = None;
        Ok(visit)
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn held(&self) -> MutexGuard<'_, Held> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decode a document the store just accepted. A failure here means the
    /// store and the local state disagree until the next recovery.
    fn decode_after_write<T: serde::de::DeserializeOwned>(
        &self,
        stored: &fieldkit_storage::StoredDocument,
    ) -> Result<T, FieldError> {
        stored.decode().map_err(|e| {
            tracing::warn!(
                collection = %stored.collection,
                id = %stored.id,
                error = %e,
                "write succeeded but local state could not be updated; will recover"
            );
            self.held().desynced = true;
            FieldError::from(e)
        })
    }

    async fn resync_if_needed(&self) -> Result<(), FieldError> {
        let desynced = self.held().desynced;
        if desynced {
            self.recover_inner().await?;
        }
        Ok(())
    }
}
