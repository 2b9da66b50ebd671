//! The voter-visible countdown and the background token health check.
//!
//! Both run as tasks on the platform's event loop and are owned by a
//! [`SessionTimers`] guard: dropping the guard aborts both.

use std::cell::Cell;
use std::rc::Rc;

use futures::future::{AbortHandle, Abortable, FutureExt};
use time::Duration;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::Error;
use crate::platform::Platform;
use crate::refresh::RefreshCoordinator;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Tick(Duration),
    /// A proactive refresh succeeded and the countdown was reset.
    Extended,
    TimedOut,
    RefreshFailed(Error),
}

#[derive(Debug, Clone)]
pub struct Countdown {
    remaining: Rc<Cell<Duration>>,
    window: Duration,
    expiring_threshold: Duration,
}

impl Countdown {
    pub fn new(window: Duration, expiring_threshold: Duration) -> Self {
        Self {
            remaining: Rc::new(Cell::new(Duration::ZERO)),
            window,
            expiring_threshold,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.remaining.get()
    }

    pub fn reset(&self) {
        self.remaining.set(self.window);
    }

    pub fn stop(&self) {
        self.remaining.set(Duration::ZERO);
    }

    pub fn tick(&self, step: Duration) -> Duration {
        let left = (self.remaining.get() - step).max(Duration::ZERO);
        self.remaining.set(left);
        left
    }

    pub fn is_expiring(&self) -> bool {
        self.remaining() < self.expiring_threshold
    }

    /// `m:ss`
    pub fn display(&self) -> String {
        let secs = self.remaining().whole_seconds().max(0);
        format!("{}:{:02}", secs / 60, secs % 60)
    }
}

/// Aborts both session tasks when dropped.
pub struct SessionTimers {
    handles: [AbortHandle; 2],
}

impl Drop for SessionTimers {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
        debug!("Session timers stopped");
    }
}

#[derive(Clone)]
pub struct SessionClock {
    platform: Rc<dyn Platform>,
    credentials: CredentialStore,
    refresher: RefreshCoordinator,
    countdown: Countdown,
    tick: Duration,
    health_check_interval: Duration,
}

impl SessionClock {
    pub fn new(
        config: &ClientConfig,
        platform: Rc<dyn Platform>,
        credentials: CredentialStore,
        refresher: RefreshCoordinator,
    ) -> Self {
        Self {
            platform,
            credentials,
            refresher,
            countdown: Countdown::new(config.session_window, config.expiring_threshold),
            tick: config.tick,
            health_check_interval: config.health_check_interval,
        }
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    /// Resets the countdown to the full window and starts both tasks.
    pub fn start(&self, on_event: Rc<dyn Fn(SessionEvent)>) -> SessionTimers {
        self.countdown.reset();

        let (countdown_handle, countdown_registration) = AbortHandle::new_pair();
        let (health_handle, health_registration) = AbortHandle::new_pair();

        let countdown = Abortable::new(self.clone().run_countdown(on_event.clone()), countdown_registration);
        let health = Abortable::new(self.clone().run_health_check(on_event), health_registration);
        self.platform.spawn(countdown.map(|_| ()).boxed_local());
        self.platform.spawn(health.map(|_| ()).boxed_local());

        info!(window_secs = self.countdown.window.whole_seconds(), "Session timers started");
        SessionTimers { handles: [countdown_handle, health_handle] }
    }

    async fn run_countdown(self, on_event: Rc<dyn Fn(SessionEvent)>) {
        loop {
            self.platform.sleep(self.tick).await;
            let left = self.countdown.tick(self.tick);
            on_event(SessionEvent::Tick(left));
            if left <= Duration::ZERO {
                info!("Session window elapsed");
                on_event(SessionEvent::TimedOut);
                return;
            }
        }
    }

    async fn run_health_check(self, on_event: Rc<dyn Fn(SessionEvent)>) {
        loop {
            self.platform.sleep(self.health_check_interval).await;
            if !self.credentials.needs_refresh() {
                continue;
            }

            debug!("Access token close to expiry, refreshing from health check");
            match self.refresher.refresh().await {
                Ok(_) => {
                    self.countdown.reset();
                    info!("Session extended");
                    on_event(SessionEvent::Extended);
                }
                Err(e) => {
                    warn!(error = %e, "Health check refresh failed");
                    on_event(SessionEvent::RefreshFailed(e));
                    return;
                }
            }
        }
    }
}
