use futures::future::LocalBoxFuture;
use time::{Duration, OffsetDateTime};

/// Wall clock, timers and task spawning for a single-threaded event loop.
pub trait Platform {
    fn now(&self) -> OffsetDateTime;

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;

    /// Runs `task` to completion on the current thread.
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);
}
