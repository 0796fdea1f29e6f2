//! Cancelable periodic task

use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Runs a callback every `period` on the current tokio runtime until
/// cancelled or until the callback returns `false`. Never re-arms after
/// cancel.
pub struct PeriodicTask {
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Must be called inside a tokio runtime. The first run happens one
    /// period from now.
    pub fn start<F>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut cancel_rx => break,
                    _ = interval.tick() => {
                        if !tick() {
                            break;
                        }
                    }
                }
            }
            debug!("Periodic task stopped");
        });

        Self {
            cancel: Some(cancel_tx),
            task: Some(task),
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the task. Safe to call more than once.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
