//! Last-structural-change marker for the capture history
//!
//! Bulk imports and purges stamp this marker. A history window polling on a
//! timer remembers the value it last saw and only re-lists captures when the
//! marker moved, instead of diffing the whole table.

use std::sync::{Mutex, PoisonError};

use tracing::debug;

#[derive(Debug, Default)]
pub struct ChangeNotifier {
    marker: Mutex<Option<i64>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current marker in milliseconds since the epoch; `None` until the first
    /// bulk change.
    pub fn current(&self) -> Option<i64> {
        *self.marker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a bulk change happened after `previous` was observed.
    pub fn changed_since(&self, previous: Option<i64>) -> bool {
        self.current() != previous
    }

    /// Stamp a bulk change with the current time and return the new marker.
    ///
    /// Two stamps in the same millisecond (or a clock step backwards) still
    /// yield a strictly larger marker so pollers never miss a change.
    pub(crate) fn mark(&self) -> i64 {
        self.mark_at(chrono::Utc::now().timestamp_millis())
    }

    fn mark_at(&self, now_ms: i64) -> i64 {
        let mut marker = self.marker.lock().unwrap_or_else(PoisonError::into_inner);
        let next = match *marker {
            Some(previous) if now_ms <= previous => previous + 1,
            _ => now_ms,
        };
        *marker = Some(next);
        debug!(marker = next, "Capture history change marker updated");
        next
    }
}
