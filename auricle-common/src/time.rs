//! Small time helpers shared by the catalog and the search orchestrator.

use chrono::{DateTime, Utc};
use std::time::Instant;

/// Current wall-clock timestamp, server-assigned (used for `ingested_at` /
/// `updated_at` on track records).
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// A monotonic stopwatch for request-level elapsed-time accounting.
/// Wraps `std::time::Instant` so the orchestrator never derives elapsed
/// time from wall-clock timestamps, which can jump backwards under NTP
/// correction.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopwatch_reports_nonzero_after_sleep() {
        let sw = Stopwatch::start();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(sw.elapsed_ms() >= 5);
    }
}
