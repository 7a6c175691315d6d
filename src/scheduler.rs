use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Run `task` every `period` on a background tokio task. The first immediate
/// tick is skipped so registering a task at boot does not double-fire it.
/// Tasks contain their own errors; nothing propagates to the scheduler.
pub fn spawn_every<F, Fut>(name: &'static str, period: Duration, task: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            tracing::debug!(task = name, "periodic task firing");
            task().await;
        }
    })
}
