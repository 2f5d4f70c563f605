use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Runs an action only after `wait` has passed without another call.
///
/// Every [`call`](Debounce::call) cancels the pending invocation (if any) and
/// schedules a new one with the latest arguments. Fire-and-forget: the
/// action's result is not observable by callers.
///
/// Must be called from within a tokio runtime.
pub struct Debounce<A> {
    action: Arc<dyn Fn(A) + Send + Sync>,
    wait: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<A: Send + 'static> Debounce<A> {
    pub fn new<F>(action: F, wait: Duration) -> Self
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        Self {
            action: Arc::new(action),
            wait,
            pending: Mutex::new(None),
        }
    }

    /// Schedule the action with `args`, replacing any pending invocation.
    pub fn call(&self, args: A) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        let action = Arc::clone(&self.action);
        let wait = self.wait;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            action(args);
        }));
    }

    /// Drop the pending invocation. Returns true if one was scheduled.
    pub fn cancel(&self) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match pending.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    /// Whether an invocation is scheduled but has not run yet.
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |v| sink.lock().unwrap().push(v))
    }

    #[tokio::test(start_paused = true)]
    async fn burst_within_window_runs_once_with_last_args() {
        let (seen, action) = recorder();
        let debounced = Debounce::new(action, Duration::from_millis(100));

        for i in 1..=5 {
            debounced.call(i);
            sleep(Duration::from_millis(10)).await;
        }
        assert!(seen.lock().unwrap().is_empty());

        sleep(Duration::from_millis(200)).await;
        assert_eq!(*seen.lock().unwrap(), vec![5]);
        assert!(!debounced.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn calls_separated_by_more_than_wait_each_run() {
        let (seen, action) = recorder();
        let debounced = Debounce::new(action, Duration::from_millis(100));

        debounced.call(1);
        sleep(Duration::from_millis(150)).await;
        debounced.call(2);
        sleep(Duration::from_millis(150)).await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_call() {
        let (seen, action) = recorder();
        let debounced = Debounce::new(action, Duration::from_millis(100));

        debounced.call(7);
        assert!(debounced.is_pending());
        assert!(debounced.cancel());
        sleep(Duration::from_millis(200)).await;

        assert!(seen.lock().unwrap().is_empty());
        assert!(!debounced.cancel());
    }
}
