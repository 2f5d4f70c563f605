//! Guards against duplicate and overlapping user-triggered actions.
//!
//! Three independent wrappers, each pure composition over an arbitrary
//! action (none of them inspects what the action does):
//!
//! - [`Debounce`]: only the last call within a quiet window runs
//! - [`Throttle`]: the first call runs, later calls are dropped until the
//!   window has elapsed
//! - [`AntiDuplicate`]: at most one async invocation in flight, concurrent
//!   callers are dropped (built on [`SingleFlight`])
//!
//! Time is read from `tokio::time`, so behaviour can be driven
//! deterministically from a paused test runtime.

mod debounce;
mod flight;
mod throttle;

pub use debounce::Debounce;
pub use flight::{AntiDuplicate, FlightPermit, SingleFlight};
pub use throttle::Throttle;
