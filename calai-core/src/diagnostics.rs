//! Record of values that could not be read back.
//!
//! A corrupt value is read as empty so the app keeps working, but each
//! occurrence is logged and kept here so it can be told apart from a value
//! that was never written.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Events kept before the oldest is dropped.
const MAX_EVENTS: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorruptionEvent {
    pub key: String,
    pub error: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Log {
    events: VecDeque<CorruptionEvent>,
    total: u64,
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    log: Mutex<Log>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_corruption(&self, key: &str, error: &str, at: DateTime<Utc>) {
        tracing::warn!(key, error, "discarding unreadable value");

        let mut log = self.lock();
        if log.events.len() == MAX_EVENTS {
            log.events.pop_front();
        }
        log.events.push_back(CorruptionEvent {
            key: key.to_string(),
            error: error.to_string(),
            at,
        });
        log.total += 1;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Log> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Most recent corruption events, oldest first.
    pub fn corruption_events(&self) -> Vec<CorruptionEvent> {
        self.lock().events.iter().cloned().collect()
    }

    /// Number of corruption events since creation, including dropped ones.
    pub fn corruption_count(&self) -> u64 {
        self.lock().total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keeps_bounded_history() {
        let diagnostics = Diagnostics::new();
        let now = Utc::now();

        for i in 0..(MAX_EVENTS + 5) {
            diagnostics.record_corruption(&format!("key{}", i), "bad json", now);
        }

        let events = diagnostics.corruption_events();
        assert_eq!(events.len(), MAX_EVENTS);
        assert_eq!(events[0].key, "key5");
        assert_eq!(diagnostics.corruption_count(), (MAX_EVENTS + 5) as u64);
    }

    #[test]
    fn test_concurrent_records_are_all_counted() {
        let diagnostics = Diagnostics::new();
        let now = Utc::now();

        std::thread::scope(|scope| {
            for t in 0..8 {
                let diagnostics = &diagnostics;
                scope.spawn(move || {
                    for i in 0..20 {
                        diagnostics.record_corruption(&format!("t{}-{}", t, i), "bad json", now);
                    }
                });
            }
        });

        assert_eq!(diagnostics.corruption_count(), 160);
        assert_eq!(diagnostics.corruption_events().len(), MAX_EVENTS);
    }
}
