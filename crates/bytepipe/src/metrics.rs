use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters tracked on the pipe's hot path.
///
/// Named after `ringmpsc-rs`'s `Metrics`/`MetricsSnapshot` pair, scoped to
/// total bytes read/written plus a couple of counters useful for diagnosing
/// backpressure. This crate does not log on the hot path; these counters
/// are the only per-byte-operation bookkeeping it keeps.
#[derive(Debug, Default)]
pub struct PipeMetrics {
    total_bytes_read: AtomicU64,
    total_bytes_written: AtomicU64,
    flushes: AtomicU64,
    reader_suspensions: AtomicU64,
    writer_suspensions: AtomicU64,
}

impl PipeMetrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_bytes_read(&self, n: u64) {
        self.total_bytes_read.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_bytes_written(&self, n: u64) {
        self.total_bytes_written.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reader_suspension(&self) {
        self.reader_suspensions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_writer_suspension(&self) {
        self.writer_suspensions.fetch_add(1, Ordering::Relaxed);
    }

    /// Total bytes ever read from the pipe.
    #[must_use]
    pub fn total_bytes_read(&self) -> u64 {
        self.total_bytes_read.load(Ordering::Relaxed)
    }

    /// Total bytes ever written to the pipe.
    #[must_use]
    pub fn total_bytes_written(&self) -> u64 {
        self.total_bytes_written.load(Ordering::Relaxed)
    }

    /// Snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_bytes_read: self.total_bytes_read(),
            total_bytes_written: self.total_bytes_written(),
            flushes: self.flushes.load(Ordering::Relaxed),
            reader_suspensions: self.reader_suspensions.load(Ordering::Relaxed),
            writer_suspensions: self.writer_suspensions.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`PipeMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total_bytes_read: u64,
    pub total_bytes_written: u64,
    pub flushes: u64,
    pub reader_suspensions: u64,
    pub writer_suspensions: u64,
}
