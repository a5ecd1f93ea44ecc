//! Pipeline counters and the periodic summary.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::info;

/// Counters shared by the poll loop and the workers.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    records_received: AtomicU64,
    documents_written: AtomicU64,
    dead_lettered: AtomicU64,
    dead_letter_failures: AtomicU64,
    batches_handled: AtomicU64,
    batches_exhausted: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_received: u64,
    pub documents_written: u64,
    pub dead_lettered: u64,
    pub dead_letter_failures: u64,
    pub batches_handled: u64,
    pub batches_exhausted: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_received(&self, count: usize) {
        self.records_received
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn add_written(&self, count: usize) {
        self.documents_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn add_dead_lettered(&self, count: usize) {
        self.dead_lettered.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn add_dead_letter_failures(&self, count: usize) {
        self.dead_letter_failures
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn batch_handled(&self, exhausted: bool) {
        self.batches_handled.fetch_add(1, Ordering::Relaxed);
        if exhausted {
            self.batches_exhausted.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_received: self.records_received.load(Ordering::Relaxed),
            documents_written: self.documents_written.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            dead_letter_failures: self.dead_letter_failures.load(Ordering::Relaxed),
            batches_handled: self.batches_handled.load(Ordering::Relaxed),
            batches_exhausted: self.batches_exhausted.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// Share of handled documents that were written rather than dead-lettered.
    ///
    /// 1.0 while nothing has been handled.
    pub fn success_rate(&self) -> f64 {
        let handled = self.documents_written + self.dead_lettered;
        if handled == 0 {
            return 1.0;
        }
        self.documents_written as f64 / handled as f64
    }

    /// Log totals and per-second rates since `previous`.
    pub fn log_summary(&self, previous: &MetricsSnapshot, elapsed: Duration) {
        let elapsed_secs = elapsed.as_secs_f64();
        let rate = |now: u64, before: u64| {
            if elapsed_secs > 0.0 {
                (now.saturating_sub(before) as f64) / elapsed_secs
            } else {
                0.0
            }
        };

        info!(
            records_received = self.records_received,
            documents_written = self.documents_written,
            dead_lettered = self.dead_lettered,
            dead_letter_failures = self.dead_letter_failures,
            batches_handled = self.batches_handled,
            batches_exhausted = self.batches_exhausted,
            records_per_sec = format!("{:.2}", rate(self.records_received, previous.records_received)),
            documents_per_sec = format!("{:.2}", rate(self.documents_written, previous.documents_written)),
            success_rate = format!("{:.2}%", self.success_rate() * 100.0),
            "Processing summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = PipelineMetrics::new();
        metrics.add_received(5);
        metrics.add_written(4);
        metrics.add_dead_lettered(1);
        metrics.batch_handled(false);
        metrics.batch_handled(true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records_received, 5);
        assert_eq!(snapshot.documents_written, 4);
        assert_eq!(snapshot.dead_lettered, 1);
        assert_eq!(snapshot.batches_handled, 2);
        assert_eq!(snapshot.batches_exhausted, 1);
    }

    #[test]
    fn test_success_rate() {
        assert_eq!(MetricsSnapshot::default().success_rate(), 1.0);

        let snapshot = MetricsSnapshot {
            documents_written: 3,
            dead_lettered: 1,
            ..Default::default()
        };
        assert!((snapshot.success_rate() - 0.75).abs() < f64::EPSILON);

        let all_failed = MetricsSnapshot {
            dead_lettered: 2,
            ..Default::default()
        };
        assert_eq!(all_failed.success_rate(), 0.0);
    }
}
