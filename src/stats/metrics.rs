//! Statistics and metrics for generator runs

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters of a run
///
/// Shared between the receive path and the transmitter.
#[derive(Debug, Default)]
pub struct RunStats {
    /// Datagrams received
    pub datagrams: AtomicU64,
    /// Media packets forwarded to the engine
    pub forwarded: AtomicU64,
    /// Datagrams dropped because they failed to decode
    pub invalid: AtomicU64,
    /// Column parity packets sent
    pub columns_sent: AtomicU64,
    /// Row parity packets sent
    pub rows_sent: AtomicU64,
    /// Parity packets that failed to send
    pub send_failures: AtomicU64,
    /// Engine resets caused by sequence discontinuities
    pub resets: AtomicU64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the counters
    pub fn summary(&self, duration: Duration) -> RunSummary {
        RunSummary {
            duration,
            datagrams: self.datagrams.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            columns_sent: self.columns_sent.load(Ordering::Relaxed),
            rows_sent: self.rows_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
        }
    }
}

/// Counters of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Wall time spent in the running state
    pub duration: Duration,
    pub datagrams: u64,
    pub forwarded: u64,
    pub invalid: u64,
    pub columns_sent: u64,
    pub rows_sent: u64,
    pub send_failures: u64,
    pub resets: u64,
}

impl RunSummary {
    /// Forwarded media packets per second
    pub fn packet_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.forwarded as f64 / secs
        } else {
            0.0
        }
    }

    pub(crate) fn log(&self) {
        tracing::info!(
            duration_secs = self.duration.as_secs_f64(),
            datagrams = self.datagrams,
            forwarded = self.forwarded,
            invalid = self.invalid,
            columns = self.columns_sent,
            rows = self.rows_sent,
            send_failures = self.send_failures,
            resets = self.resets,
            "Stopped listening"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_stats_new() {
        let stats = RunStats::new();
        let summary = stats.summary(Duration::ZERO);

        assert_eq!(summary, RunSummary::default());
    }

    #[test]
    fn test_run_stats_summary() {
        let stats = RunStats::new();
        RunStats::incr(&stats.datagrams);
        RunStats::incr(&stats.datagrams);
        RunStats::incr(&stats.forwarded);
        RunStats::incr(&stats.invalid);
        RunStats::incr(&stats.columns_sent);
        RunStats::incr(&stats.rows_sent);
        RunStats::incr(&stats.resets);

        let summary = stats.summary(Duration::from_secs(2));

        assert_eq!(summary.duration, Duration::from_secs(2));
        assert_eq!(summary.datagrams, 2);
        assert_eq!(summary.forwarded, 1);
        assert_eq!(summary.invalid, 1);
        assert_eq!(summary.columns_sent, 1);
        assert_eq!(summary.rows_sent, 1);
        assert_eq!(summary.send_failures, 0);
        assert_eq!(summary.resets, 1);
    }

    #[test]
    fn test_packet_rate() {
        let summary = RunSummary {
            duration: Duration::from_secs(10),
            forwarded: 1000,
            ..Default::default()
        };
        assert_eq!(summary.packet_rate(), 100.0);
    }

    #[test]
    fn test_packet_rate_zero_duration() {
        let summary = RunSummary {
            forwarded: 1000,
            ..Default::default()
        };
        assert_eq!(summary.packet_rate(), 0.0);
    }
}
