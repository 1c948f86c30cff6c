//! Background cache reaper

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Handle to a running reaper task.
///
/// The task is aborted on [`ReaperHandle::shutdown`] or when the handle is
/// dropped.
#[derive(Debug)]
pub struct ReaperHandle {
    task: JoinHandle<()>,
}

impl ReaperHandle {
    pub fn shutdown(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Run `sweep` every `period`, starting one period from now
pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut sweep: F) -> ReaperHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = usize> + Send,
{
    let period = period.max(Duration::from_millis(1));

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(reaper = name, period_secs = period.as_secs(), "Cache reaper started");

        loop {
            ticker.tick().await;
            let evicted = sweep().await;
            if evicted > 0 {
                tracing::info!(reaper = name, evicted, "Evicted expired sessions from cache");
            } else {
                tracing::debug!(reaper = name, "Cache sweep found nothing to evict");
            }
        }
    });

    ReaperHandle { task }
}
