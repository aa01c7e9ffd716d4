use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::engine::{Attempt, TestSessionEngine, Tick};

/// An attempt shared between the countdown and user actions.
///
/// Both sides go through the same lock, so a timer-driven completion and a
/// manual submit never interleave.
pub type SharedAttempt = Arc<Mutex<Attempt>>;

#[must_use]
pub fn share(attempt: Attempt) -> SharedAttempt {
    Arc::new(Mutex::new(attempt))
}

/// Background task ticking an attempt until it completes.
pub struct Countdown {
    handle: JoinHandle<()>,
}

impl Countdown {
    /// Tick `attempt` every `period`, reporting each step to `on_tick`.
    ///
    /// Stops after the tick that completes the attempt, or as soon as it finds
    /// the attempt already completed by someone else.
    pub fn spawn<F>(
        engine: TestSessionEngine,
        attempt: SharedAttempt,
        period: Duration,
        mut on_tick: F,
    ) -> Self
    where
        F: FnMut(&Tick) + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let mut guard = attempt.lock().await;
                if guard.is_completed() {
                    break;
                }
                let tick = engine.tick(&mut guard).await;
                drop(guard);
                on_tick(&tick);
                if tick.completed.is_some() {
                    break;
                }
            }
        });
        Self { handle }
    }

    /// Stop ticking. Used when the attempt is abandoned.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the countdown to stop on its own or after `cancel`.
    pub async fn join(self) {
        if let Err(err) = self.handle.await {
            if err.is_panic() {
                tracing::warn!("countdown task panicked");
            }
        }
    }
}
