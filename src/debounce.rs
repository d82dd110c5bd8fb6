//! Cancellable deferred-fire primitive used to collapse event bursts.
//!
//! A [`Debouncer`] holds at most one pending fire. Arming it again cancels
//! and replaces the pending fire, so when the deadline finally elapses only
//! the latest payload is delivered — a burst of rapid state changes collapses
//! into one outbound emission. Time is passed in explicitly so behavior is
//! deterministic under test.

use std::time::{SystemTime, UNIX_EPOCH};

/// Single-slot debounce timer carrying the latest payload.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay_ms: u64,
    pending: Option<PendingFire<T>>,
}

#[derive(Debug, Clone)]
struct PendingFire<T> {
    deadline_ms: u64,
    payload: T,
}

impl<T> Debouncer<T> {
    /// Debouncer with a fixed delay window. A zero delay still defers firing
    /// to the next `take_ready` call, collapsing same-turn bursts.
    #[must_use]
    pub const fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            pending: None,
        }
    }

    #[must_use]
    pub const fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    /// Arm (or re-arm) the timer with `payload`, replacing any pending fire.
    ///
    /// Returns true when an earlier pending fire was cancelled.
    pub fn arm(&mut self, now_ms: u64, payload: T) -> bool {
        let replaced = self.pending.is_some();
        self.pending = Some(PendingFire {
            deadline_ms: now_ms.saturating_add(self.delay_ms),
            payload,
        });
        replaced
    }

    /// Fire if the deadline has elapsed, yielding the latest payload.
    pub fn take_ready(&mut self, now_ms: u64) -> Option<T> {
        let ready = matches!(&self.pending, Some(fire) if fire.deadline_ms <= now_ms);
        if ready {
            self.pending.take().map(|fire| fire.payload)
        } else {
            None
        }
    }

    /// Deadline of the pending fire, if any. Used by the worker to size its
    /// wait.
    #[must_use]
    pub fn deadline_ms(&self) -> Option<u64> {
        self.pending.as_ref().map(|fire| fire.deadline_ms)
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
