use crate::protocol::SelectionSnapshot;
use std::time::{Duration, Instant};

/// Trailing-edge throttle for `ELEMENT_HOVERED`.
///
/// Holds a single pending snapshot and at most one timer. Only the latest snapshot queued
/// before the timer fires is considered, and it is dropped when its selector equals the
/// last emitted one.
#[derive(Debug)]
pub struct HoverThrottle {
    interval: Duration,
    pending: Option<SelectionSnapshot>,
    timer_armed: bool,
    last_emit_at: Option<Instant>,
    last_selector: Option<String>,
}

impl HoverThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: None,
            timer_armed: false,
            last_emit_at: None,
            last_selector: None,
        }
    }

    /// Replace the pending snapshot. Returns the delay of a timer to schedule, or `None`
    /// when one is already running.
    pub fn queue(&mut self, snapshot: Option<SelectionSnapshot>, now: Instant) -> Option<Duration> {
        self.pending = snapshot;
        if self.timer_armed {
            return None;
        }

        self.timer_armed = true;
        let elapsed = self
            .last_emit_at
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or(self.interval);
        Some(self.interval.saturating_sub(elapsed))
    }

    /// Timer callback. Returns the hover payload to emit, if any.
    pub fn flush(&mut self, now: Instant) -> Option<Option<SelectionSnapshot>> {
        self.timer_armed = false;
        let next = self.pending.take();

        let next_selector = next.as_ref().map(|snapshot| snapshot.selector.clone());
        if next_selector == self.last_selector {
            return None;
        }

        self.last_selector = next_selector;
        self.last_emit_at = Some(now);
        Some(next)
    }

    /// Drop the timer and the pending snapshot. Returns true when a timer was running.
    pub fn cancel(&mut self) -> bool {
        self.pending = None;
        std::mem::take(&mut self.timer_armed)
    }

    /// Forget the last emitted selector so the next hover is always sent
    pub fn forget_last_selector(&mut self) {
        self.last_selector = None;
    }

    pub fn is_armed(&self) -> bool {
        self.timer_armed
    }
}
