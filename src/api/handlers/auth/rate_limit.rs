//! Rate limiting primitives for login attempts.
//!
//! Failed attempts are counted per client identifier in a window that starts at
//! the first failure. Once `max_failures` is reached, further attempts are refused
//! until the window ends. A successful login deletes the record.
//!
//! `check` reserves the attempt it allows: a caller holding a reservation must
//! settle it with `record_failure`, `record_success` or `release`. Reservations
//! count against the budget, so concurrent callers cannot all slip past the check
//! while their verifications are in flight.

use anyhow::Result;
use std::{collections::HashMap, future::Future, pin::Pin, time::Duration};
use tokio::{sync::Mutex, time::Instant};

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_MAX_FAILURES: u32 = 5;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub window: Duration,
    pub max_failures: u32,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            max_failures: DEFAULT_MAX_FAILURES,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// One attempt is reserved for the caller.
    Allowed,
    Limited { retry_after: Duration },
}

/// Attempt bookkeeping shared by all login requests.
///
/// Implementations must apply each update atomically per identifier.
pub trait AttemptStore: Send + Sync {
    /// Refuse or reserve one attempt for `client_id`.
    fn check<'a>(&'a self, client_id: &'a str) -> StoreFuture<'a, RateLimitDecision>;
    /// Settle a reservation as a failed attempt.
    fn record_failure<'a>(&'a self, client_id: &'a str) -> StoreFuture<'a, ()>;
    /// Settle a reservation as a success and forget past failures.
    fn record_success<'a>(&'a self, client_id: &'a str) -> StoreFuture<'a, ()>;
    /// Give a reservation back without counting it.
    fn release<'a>(&'a self, client_id: &'a str) -> StoreFuture<'a, ()>;
    fn policy(&self) -> RateLimitPolicy;
    /// Short backend name reported by `/health`.
    fn backend(&self) -> &'static str;
    fn ping(&self) -> StoreFuture<'_, ()>;
}

#[derive(Clone, Copy, Debug)]
struct AttemptRecord {
    count: u32,
    window_start: Instant,
    pending: u32,
    last_reserved: Instant,
}

impl AttemptRecord {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
            pending: 0,
            last_reserved: now,
        }
    }

    /// Drop failures from an elapsed window and reservations nobody settled.
    fn refresh(&mut self, now: Instant, window: Duration) {
        if now.saturating_duration_since(self.window_start) > window {
            self.count = 0;
        }
        if now.saturating_duration_since(self.last_reserved) > window {
            self.pending = 0;
        }
    }

    fn is_empty(&self) -> bool {
        self.count == 0 && self.pending == 0
    }
}

/// Process-local store. State is lost on restart and is not shared between
/// instances, so each instance grants its own failure budget.
#[derive(Debug, Default)]
pub struct MemoryAttemptStore {
    policy: RateLimitPolicy,
    attempts: Mutex<HashMap<String, AttemptRecord>>,
}

impl MemoryAttemptStore {
    #[must_use]
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    async fn reserve(&self, client_id: &str) -> RateLimitDecision {
        let now = Instant::now();
        let window = self.policy.window;
        let mut attempts = self.attempts.lock().await;
        attempts.retain(|_, record| {
            record.refresh(now, window);
            !record.is_empty()
        });

        let record = attempts
            .entry(client_id.to_string())
            .or_insert_with(|| AttemptRecord::new(now));
        if record.count.saturating_add(record.pending) >= self.policy.max_failures {
            let retry_after = if record.count > 0 {
                (record.window_start + window).saturating_duration_since(now)
            } else {
                window
            };
            if record.is_empty() {
                attempts.remove(client_id);
            }
            return RateLimitDecision::Limited { retry_after };
        }

        record.pending += 1;
        record.last_reserved = now;
        RateLimitDecision::Allowed
    }

    async fn add_failure(&self, client_id: &str) {
        let now = Instant::now();
        let window = self.policy.window;
        let mut attempts = self.attempts.lock().await;
        let record = attempts
            .entry(client_id.to_string())
            .or_insert_with(|| AttemptRecord::new(now));
        record.refresh(now, window);
        if record.count == 0 {
            record.window_start = now;
        }
        record.count = record.count.saturating_add(1);
        record.pending = record.pending.saturating_sub(1);
    }

    async fn clear(&self, client_id: &str) {
        self.attempts.lock().await.remove(client_id);
    }

    async fn give_back(&self, client_id: &str) {
        let mut attempts = self.attempts.lock().await;
        if let Some(record) = attempts.get_mut(client_id) {
            record.pending = record.pending.saturating_sub(1);
            if record.is_empty() {
                attempts.remove(client_id);
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn failures(&self, client_id: &str) -> u32 {
        let now = Instant::now();
        self.attempts
            .lock()
            .await
            .get(client_id)
            .copied()
            .map_or(0, |mut record| {
                record.refresh(now, self.policy.window);
                record.count
            })
    }

    #[cfg(test)]
    pub(crate) async fn in_flight(&self, client_id: &str) -> u32 {
        self.attempts
            .lock()
            .await
            .get(client_id)
            .map_or(0, |record| record.pending)
    }
}

impl AttemptStore for MemoryAttemptStore {
    fn check<'a>(&'a self, client_id: &'a str) -> StoreFuture<'a, RateLimitDecision> {
        Box::pin(async move { Ok(self.reserve(client_id).await) })
    }

    fn record_failure<'a>(&'a self, client_id: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.add_failure(client_id).await;
            Ok(())
        })
    }

    fn record_success<'a>(&'a self, client_id: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.clear(client_id).await;
            Ok(())
        })
    }

    fn release<'a>(&'a self, client_id: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.give_back(client_id).await;
            Ok(())
        })
    }

    fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    fn backend(&self) -> &'static str {
        "memory"
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}
