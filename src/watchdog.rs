// Idle watchdog: requests a graceful shutdown after a window with no activity.
//
// A single background task sleeps until the current deadline. Resets move the
// deadline forward under the state lock; when the task wakes it re-checks the
// deadline under the same lock and either sleeps again or fires. Only one
// countdown exists at any time.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Receives the watchdog's decision to shut down. How the process actually
/// exits is up to the implementor.
pub trait ShutdownTrigger: Send + Sync + 'static {
    fn request_shutdown(&self);
}

impl ShutdownTrigger for CancellationToken {
    fn request_shutdown(&self) {
        self.cancel();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogPhase {
    /// Not started yet; activity is recorded but nothing counts down.
    Unarmed,
    /// Counting down to the deadline.
    Armed,
    /// Shutdown was requested. Terminal.
    Triggered,
    /// Stopped without firing. Terminal.
    Stopped,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WatchdogError {
    #[error("watchdog already started")]
    AlreadyStarted,
    #[error("idle timeout must be greater than zero")]
    ZeroTimeout,
    #[error("idle timeout of {0:?} is out of range")]
    TimeoutTooLarge(Duration),
}

#[derive(Debug)]
struct WatchdogState {
    idle_timeout: Option<Duration>,
    last_activity: Instant,
    deadline: Option<Instant>,
    phase: WatchdogPhase,
}

pub struct IdleWatchdog {
    state: Arc<Mutex<WatchdogState>>,
    trigger: Arc<dyn ShutdownTrigger>,
    cancel: CancellationToken,
}

impl IdleWatchdog {
    pub fn new(trigger: impl ShutdownTrigger) -> Self {
        Self {
            state: Arc::new(Mutex::new(WatchdogState {
                idle_timeout: None,
                last_activity: Instant::now(),
                deadline: None,
                phase: WatchdogPhase::Unarmed,
            })),
            trigger: Arc::new(trigger),
            cancel: CancellationToken::new(),
        }
    }

    /// Arm the countdown. Must be called from within a tokio runtime, once,
    /// after the inference backend is ready.
    pub fn start(&self, timeout: Duration) -> Result<(), WatchdogError> {
        if timeout.is_zero() {
            return Err(WatchdogError::ZeroTimeout);
        }
        {
            let mut state = self.state.lock();
            if state.phase != WatchdogPhase::Unarmed {
                return Err(WatchdogError::AlreadyStarted);
            }
            let now = Instant::now();
            let deadline = now
                .checked_add(timeout)
                .ok_or(WatchdogError::TimeoutTooLarge(timeout))?;
            state.idle_timeout = Some(timeout);
            state.last_activity = now;
            state.deadline = Some(deadline);
            state.phase = WatchdogPhase::Armed;
        }

        tracing::info!(
            "Auto-shutdown enabled: will shut down after {:.1} minutes of inactivity",
            timeout.as_secs_f64() / 60.0
        );

        let _countdown = tokio::spawn(run_countdown(
            self.state.clone(),
            self.trigger.clone(),
            self.cancel.clone(),
        ));
        Ok(())
    }

    /// Record activity and push the deadline out to a full window from now.
    pub fn reset_activity(&self) {
        let mut state = self.state.lock();
        let now = Instant::now();
        state.last_activity = now;
        if state.phase == WatchdogPhase::Armed {
            if let Some(timeout) = state.idle_timeout {
                state.deadline = now.checked_add(timeout).or(state.deadline);
                tracing::debug!(
                    "Shutdown timer reset. Will shut down after {:.1} minutes of inactivity",
                    timeout.as_secs_f64() / 60.0
                );
            }
        }
    }

    /// Cancel the countdown without firing.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            if state.phase == WatchdogPhase::Triggered {
                return;
            }
            state.phase = WatchdogPhase::Stopped;
            state.deadline = None;
        }
        self.cancel.cancel();
    }

    pub fn phase(&self) -> WatchdogPhase {
        self.state.lock().phase
    }

    #[cfg(test)]
    fn idle_timeout(&self) -> Option<Duration> {
        self.state.lock().idle_timeout
    }

    #[cfg(test)]
    fn last_activity(&self) -> Instant {
        self.state.lock().last_activity
    }

    /// Time left before firing, or `None` when not armed.
    pub fn remaining(&self) -> Option<Duration> {
        let state = self.state.lock();
        match (state.phase, state.deadline) {
            (WatchdogPhase::Armed, Some(deadline)) => {
                Some(deadline.saturating_duration_since(Instant::now()))
            }
            _ => None,
        }
    }
}

impl Drop for IdleWatchdog {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_countdown(
    state: Arc<Mutex<WatchdogState>>,
    trigger: Arc<dyn ShutdownTrigger>,
    cancel: CancellationToken,
) {
    loop {
        let deadline = {
            let state = state.lock();
            match (state.phase, state.deadline) {
                (WatchdogPhase::Armed, Some(deadline)) => deadline,
                _ => return,
            }
        };

        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep_until(deadline) => {}
        }

        let idle_for = {
            let mut state = state.lock();
            if state.phase != WatchdogPhase::Armed {
                return;
            }
            match state.deadline {
                Some(current) if Instant::now() >= current => {
                    state.phase = WatchdogPhase::Triggered;
                    state.deadline = None;
                    state.last_activity.elapsed()
                }
                // A reset moved the deadline while we slept.
                _ => continue,
            }
        };

        tracing::info!(
            "No requests received for {:.1} minutes. Requesting shutdown to free resources",
            idle_for.as_secs_f64() / 60.0
        );
        trigger.request_shutdown();
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct CountingTrigger(Arc<AtomicUsize>);

    impl CountingTrigger {
        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    impl ShutdownTrigger for CountingTrigger {
        fn request_shutdown(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(600);

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_idle_window() {
        let trigger = CountingTrigger::default();
        let watchdog = IdleWatchdog::new(trigger.clone());
        watchdog.start(TIMEOUT).unwrap();

        tokio::time::sleep(TIMEOUT - Duration::from_secs(1)).await;
        assert_eq!(trigger.count(), 0);
        assert_eq!(watchdog.phase(), WatchdogPhase::Armed);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(trigger.count(), 1);
        assert_eq!(watchdog.phase(), WatchdogPhase::Triggered);

        tokio::time::sleep(TIMEOUT * 3).await;
        assert_eq!(trigger.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn resets_inside_window_prevent_firing() {
        let trigger = CountingTrigger::default();
        let watchdog = IdleWatchdog::new(trigger.clone());
        watchdog.start(TIMEOUT).unwrap();

        for _ in 0..50 {
            tokio::time::sleep(Duration::from_secs(590)).await;
            watchdog.reset_activity();
        }
        assert_eq!(trigger.count(), 0);
        assert_eq!(watchdog.phase(), WatchdogPhase::Armed);

        tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;
        assert_eq!(trigger.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn window_is_measured_from_latest_reset() {
        let trigger = CountingTrigger::default();
        let watchdog = IdleWatchdog::new(trigger.clone());
        watchdog.start(TIMEOUT).unwrap();

        tokio::time::sleep(Duration::from_secs(300)).await;
        watchdog.reset_activity();
        assert_eq!(watchdog.remaining(), Some(TIMEOUT));

        // 300s + 599s since start: past the original deadline, not the new one.
        tokio::time::sleep(Duration::from_secs(599)).await;
        assert_eq!(trigger.count(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(trigger.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_after_trigger_does_not_rearm() {
        let trigger = CountingTrigger::default();
        let watchdog = IdleWatchdog::new(trigger.clone());
        watchdog.start(Duration::from_secs(10)).unwrap();

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(trigger.count(), 1);

        watchdog.reset_activity();
        assert_eq!(watchdog.phase(), WatchdogPhase::Triggered);
        assert_eq!(watchdog.remaining(), None);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(trigger.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_before_start_only_records_activity() {
        let trigger = CountingTrigger::default();
        let watchdog = IdleWatchdog::new(trigger.clone());
        let before = watchdog.last_activity();

        tokio::time::sleep(Duration::from_secs(5)).await;
        watchdog.reset_activity();
        assert!(watchdog.last_activity() > before);
        assert_eq!(watchdog.phase(), WatchdogPhase::Unarmed);
        assert_eq!(watchdog.remaining(), None);

        tokio::time::sleep(TIMEOUT * 2).await;
        assert_eq!(trigger.count(), 0);
    }

    #[tokio::test]
    async fn start_twice_is_an_error() {
        let watchdog = IdleWatchdog::new(CountingTrigger::default());
        watchdog.start(TIMEOUT).unwrap();
        assert_eq!(watchdog.start(TIMEOUT), Err(WatchdogError::AlreadyStarted));
        assert_eq!(watchdog.idle_timeout(), Some(TIMEOUT));
    }

    #[tokio::test]
    async fn zero_timeout_rejected() {
        let watchdog = IdleWatchdog::new(CountingTrigger::default());
        assert_eq!(watchdog.start(Duration::ZERO), Err(WatchdogError::ZeroTimeout));
        assert_eq!(watchdog.phase(), WatchdogPhase::Unarmed);
    }

    #[tokio::test]
    async fn oversized_timeout_rejected_without_arming() {
        let watchdog = IdleWatchdog::new(CountingTrigger::default());
        assert_eq!(
            watchdog.start(Duration::MAX),
            Err(WatchdogError::TimeoutTooLarge(Duration::MAX))
        );
        assert_eq!(watchdog.phase(), WatchdogPhase::Unarmed);
        assert_eq!(watchdog.idle_timeout(), None);

        // Still usable with a sane timeout afterwards.
        watchdog.start(TIMEOUT).unwrap();
        assert_eq!(watchdog.phase(), WatchdogPhase::Armed);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_countdown() {
        let trigger = CountingTrigger::default();
        let watchdog = IdleWatchdog::new(trigger.clone());
        watchdog.start(Duration::from_secs(10)).unwrap();
        watchdog.stop();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(trigger.count(), 0);
        assert_eq!(watchdog.phase(), WatchdogPhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_resets_keep_a_single_countdown() {
        let trigger = CountingTrigger::default();
        let watchdog = Arc::new(IdleWatchdog::new(trigger.clone()));
        watchdog.start(TIMEOUT).unwrap();

        tokio::time::sleep(Duration::from_secs(500)).await;
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let watchdog = watchdog.clone();
                tokio::spawn(async move { watchdog.reset_activity() })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(watchdog.phase(), WatchdogPhase::Armed);
        assert_eq!(watchdog.remaining(), Some(TIMEOUT));

        tokio::time::sleep(TIMEOUT - Duration::from_secs(1)).await;
        assert_eq!(trigger.count(), 0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(trigger.count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn resets_from_many_threads_never_fire() {
        let trigger = CountingTrigger::default();
        let watchdog = Arc::new(IdleWatchdog::new(trigger.clone()));
        watchdog.start(Duration::from_secs(3600)).unwrap();

        let threads: Vec<_> = (0..100)
            .map(|_| {
                let watchdog = watchdog.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        watchdog.reset_activity();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(trigger.count(), 0);
        assert_eq!(watchdog.phase(), WatchdogPhase::Armed);
        let remaining = watchdog.remaining().unwrap();
        assert!(remaining <= Duration::from_secs(3600));
        assert!(remaining > Duration::from_secs(3500));
    }

    #[tokio::test]
    async fn cancellation_token_trigger() {
        let token = CancellationToken::new();
        token.request_shutdown();
        assert!(token.is_cancelled());
    }
}
