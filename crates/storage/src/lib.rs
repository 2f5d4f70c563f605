//! Document store collaborator for fieldkit.
//!
//! The remote store is an external service; this crate pins down only the
//! boundary the field-visit core depends on:
//!
//! - [`FieldStore`]: create / update / get / query over named collections and
//!   sub-collections (`visits/{id}/observations`)
//! - [`Document`] and [`Query`]: the JSON document shape and the
//!   equality-filter query language
//! - [`server_timestamp`]: the sentinel a store resolves to its own clock
//! - the typed records read back out of the store ([`VisitRecord`], ...)
//!
//! [`LocalStore`] is an in-process implementation, optionally persisted to a
//! JSON file, and [`conformance`] is a backend-agnostic suite any
//! implementation can run.

pub mod conformance;
mod document;
mod error;
mod local;
mod record;
mod traits;

pub use document::{
    compare_values, is_server_timestamp, server_timestamp, to_document, Direction, Document,
    Query, StoredDocument,
};
pub use error::StoreError;
pub use local::LocalStore;
pub use record::{
    collections, ActivityRecord, Coords, CropCycleRecord, ObservationRecord, PlotRecord,
    TaskRecord, VisitRecord, VisitStatus,
};
pub use traits::FieldStore;
