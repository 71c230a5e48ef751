//! Inactivity countdown for a mounted protected view.

use std::time::Duration;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{sleep_until, Instant},
};

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// User activity that keeps a view alive.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActivityEvent {
    PointerDown,
    PointerMove,
    KeyDown,
    Scroll,
    TouchStart,
}

impl ActivityEvent {
    /// Map a DOM event name to an activity event.
    #[must_use]
    pub fn from_dom_event(name: &str) -> Option<Self> {
        match name {
            "mousedown" | "pointerdown" => Some(Self::PointerDown),
            "mousemove" | "pointermove" => Some(Self::PointerMove),
            "keydown" => Some(Self::KeyDown),
            "scroll" => Some(Self::Scroll),
            "touchstart" => Some(Self::TouchStart),
            _ => None,
        }
    }
}

/// One cooperative task per timer. Dropping the timer cancels it.
#[derive(Debug)]
pub struct IdleTimer {
    activity: watch::Sender<Instant>,
    task: JoinHandle<()>,
}

impl IdleTimer {
    /// Start counting down from now; `on_timeout` runs once if `timeout` passes
    /// with no [`IdleTimer::reset`].
    pub fn start<F>(timeout: Duration, on_timeout: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (activity, mut last_activity) = watch::channel(Instant::now());
        let task = tokio::spawn(async move {
            loop {
                let deadline = *last_activity.borrow_and_update() + timeout;
                tokio::select! {
                    () = sleep_until(deadline) => {
                        if last_activity.has_changed().unwrap_or(false) {
                            continue;
                        }
                        break;
                    }
                    changed = last_activity.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            }
            on_timeout();
        });

        Self { activity, task }
    }

    /// Restart the countdown. Safe to call any number of times.
    pub fn reset(&self) {
        self.activity.send_replace(Instant::now());
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
