use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Runs the action at most once per `wait`.
///
/// The first call runs immediately; calls arriving before `wait` has elapsed
/// since the last executed call are dropped, not queued.
pub struct Throttle<F> {
    action: F,
    wait: Duration,
    last_run: Mutex<Option<Instant>>,
}

impl<F> Throttle<F> {
    pub fn new(action: F, wait: Duration) -> Self {
        Self {
            action,
            wait,
            last_run: Mutex::new(None),
        }
    }

    /// Run the action with `args` unless throttled. Returns whether it ran.
    pub fn call<A>(&self, args: A) -> bool
    where
        F: Fn(A),
    {
        let now = Instant::now();
        {
            let mut last_run = self.last_run.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(last) = *last_run {
                if now.duration_since(last) < self.wait {
                    tracing::trace!("throttled call dropped");
                    return false;
                }
            }
            *last_run = Some(now);
        }
        (self.action)(args);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn burst_runs_first_call_only_then_reopens() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let throttled = Throttle::new(
            move |v: u32| sink.lock().unwrap().push(v),
            Duration::from_millis(100),
        );

        let ran: Vec<bool> = {
            let mut ran = Vec::new();
            for i in 1..=5 {
                ran.push(throttled.call(i));
                sleep(Duration::from_millis(2)).await;
            }
            ran
        };
        assert_eq!(ran, vec![true, false, false, false, false]);
        assert_eq!(*calls.lock().unwrap(), vec![1]);

        sleep(Duration::from_millis(150)).await;
        assert!(throttled.call(6));
        assert_eq!(*calls.lock().unwrap(), vec![1, 6]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_calls_do_not_extend_the_window() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let throttled = Throttle::new(
            move |()| {
                c.fetch_add(1, Ordering::SeqCst);
            },
            Duration::from_millis(100),
        );

        assert!(throttled.call(()));
        sleep(Duration::from_millis(90)).await;
        assert!(!throttled.call(()));
        sleep(Duration::from_millis(15)).await;
        // 105ms after the executed call, regardless of the dropped one at 90ms.
        assert!(throttled.call(()));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
