//! Pipeline metrics
//!
//! Counters written by the ingestion path and read by the periodic
//! status reporter. Shared by `Arc`, never global.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-lifetime counters for the pipeline.
///
/// Each counter is an independent atomic: a snapshot is torn-read free
/// per counter but not linearized across counters.
#[derive(Debug, Default)]
pub struct Metrics {
    recv: AtomicU64,
    valid: AtomicU64,
    invalid: AtomicU64,
    sent: AtomicU64,
    errors: AtomicU64,
    reconnects: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr_recv(&self) {
        self.recv.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_valid(&self) {
        self.valid.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_invalid(&self) {
        self.invalid.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_reconnects(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters. Values may come from slightly different
    /// instants.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            recv: self.recv.load(Ordering::Relaxed),
            valid: self.valid.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub recv: u64,
    pub valid: u64,
    pub invalid: u64,
    pub sent: u64,
    pub errors: u64,
    pub reconnects: u64,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "recv={} valid={} invalid={} sent={} errors={} reconnects={}",
            self.recv, self.valid, self.invalid, self.sent, self.errors, self.reconnects
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_increments_visible_in_snapshot() {
        let metrics = Metrics::new();
        metrics.incr_recv();
        metrics.incr_recv();
        metrics.incr_invalid();
        metrics.incr_reconnects();

        let snap = metrics.snapshot();
        assert_eq!(snap.recv, 2);
        assert_eq!(snap.invalid, 1);
        assert_eq!(snap.reconnects, 1);
        assert_eq!(snap.valid, 0);
        assert_eq!(snap.sent, 0);
        assert_eq!(snap.errors, 0);
    }

    #[test]
    fn test_concurrent_increments() {
        let metrics = Arc::new(Metrics::new());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = metrics.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        m.incr_recv();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread panicked");
        }

        assert_eq!(metrics.snapshot().recv, 4000);
    }

    #[test]
    fn test_status_line_format() {
        let metrics = Metrics::new();
        metrics.incr_recv();
        metrics.incr_valid();
        metrics.incr_sent();

        assert_eq!(
            metrics.snapshot().to_string(),
            "recv=1 valid=1 invalid=0 sent=1 errors=0 reconnects=0"
        );
    }
}
