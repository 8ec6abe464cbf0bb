//! Latest-value-wins coalescing of hover recomputations

use std::time::{Duration, Instant};

use tracing::trace;

/// Holds at most one pending value and releases it at most once per frame.
///
/// Hosts either poll with their clock (`poll_frame`) or call `fire` from their
/// own frame callback.
#[derive(Debug)]
pub struct HoverThrottle<T> {
    pending: Option<T>,
    frame_interval: Duration,
    last_release: Option<Instant>,
}

impl<T> HoverThrottle<T> {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            pending: None,
            frame_interval,
            last_release: None,
        }
    }

    /// Replace any pending value with `value`.
    pub fn request(&mut self, value: T) {
        if self.pending.replace(value).is_some() {
            trace!("hover coalesced");
        }
    }

    /// Release the pending value if a full frame has passed since the last release.
    pub fn poll_frame(&mut self, now: Instant) -> Option<T> {
        let due = self
            .last_release
            .map_or(true, |last| now.saturating_duration_since(last) >= self.frame_interval);
        if !due || self.pending.is_none() {
            return None;
        }
        self.last_release = Some(now);
        self.pending.take()
    }

    /// Release the pending value unconditionally.
    pub fn fire(&mut self) -> Option<T> {
        let value = self.pending.take();
        if value.is_some() {
            self.last_release = Some(Instant::now());
        }
        value
    }

    /// Drop the pending value.
    pub fn cancel(&mut self) {
        if self.pending.take().is_some() {
            trace!("pending hover cancelled");
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
