//! Field-visit core: the lifecycle of an agronomist's visit to a client
//! property, and the small amount of UI dispatch logic around it.
//!
//! - [`VisitController`] owns the single in-flight visit and drives
//!   check-in → observations → check-out, each transition gated on a
//!   geolocation read and serialised by a single-flight guard
//! - [`Router`] maps a location fragment to exactly one visible section
//! - [`Cascade`] keeps a dependent child selector (plots of a property) in
//!   step with its parent, discarding responses for superseded selections
//! - [`task`] and [`activity`] cover scheduled tasks and field activities
//!
//! The document store and the geolocation provider are external
//! collaborators: see [`fieldkit_storage::FieldStore`] and
//! [`LocationProvider`].

pub mod activity;
pub mod cascade;
mod error;
pub mod location;
pub mod router;
pub mod task;
pub mod visit;

pub use cascade::{Cascade, CascadeState, CascadeUpdate, ChoiceOption, OptionSource, StoreOptionSource};
pub use error::FieldError;
pub use location::{FixedLocation, LocationError, LocationPolicy, LocationProvider, Position, PositionRequest};
pub use router::{RouteError, RouteState, Router, RouterBuilder, SectionView};
pub use visit::{CheckIn, Observation, Recovery, VisitController, VisitState};
