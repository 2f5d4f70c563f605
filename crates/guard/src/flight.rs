use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-flight flag for async work.
///
/// [`run`](SingleFlight::run) executes a future only if nothing else is in
/// flight; otherwise it returns `None` at once without polling the future.
/// Dropped calls are not queued or retried.
#[derive(Debug, Default)]
pub struct SingleFlight {
    busy: AtomicBool,
}

/// Scoped ownership of a [`SingleFlight`]. The flag is cleared when the
/// permit is dropped, whether the guarded work succeeded, failed, panicked
/// or was cancelled.
#[derive(Debug)]
pub struct FlightPermit<'a> {
    busy: &'a AtomicBool,
}

impl Drop for FlightPermit<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

impl SingleFlight {
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// Take the flag if it is free.
    pub fn try_acquire(&self) -> Option<FlightPermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightPermit { busy: &self.busy })
    }

    pub fn is_in_flight(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Await `work` while holding the flag, or return `None` if the flag is
    /// already held.
    pub async fn run<T>(&self, work: impl Future<Output = T>) -> Option<T> {
        let Some(_permit) = self.try_acquire() else {
            tracing::debug!("call dropped: another invocation is in flight");
            return None;
        };
        Some(work.await)
    }
}

/// Wraps an async action so at most one invocation is in flight.
///
/// The executing call gets the action's output unchanged (including any
/// error); calls made while it is pending get `None` and the action is not
/// invoked for them.
pub struct AntiDuplicate<F> {
    action: F,
    flight: SingleFlight,
}

impl<F> AntiDuplicate<F> {
    pub fn new(action: F) -> Self {
        Self {
            action,
            flight: SingleFlight::new(),
        }
    }

    pub async fn call<A, Fut>(&self, args: A) -> Option<Fut::Output>
    where
        F: Fn(A) -> Fut,
        Fut: Future,
    {
        let Some(_permit) = self.flight.try_acquire() else {
            tracing::debug!("duplicate call dropped");
            return None;
        };
        Some((self.action)(args).await)
    }

    pub fn is_in_flight(&self) -> bool {
        self.flight.is_in_flight()
    }
}
