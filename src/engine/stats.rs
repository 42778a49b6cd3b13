// Live download progress: completion count, bytes written, worker occupancy.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub completed: u64,
    pub bytes_written: u64,
    pub active_workers: u32,
    pub peak_workers: u32,
    pub download_bps: u64,
}

/// Shared by every worker of one run; values only ever grow, except the
/// active worker gauge.
pub struct ProgressCounter {
    completed: AtomicU64,
    bytes_written: AtomicU64,
    active_workers: AtomicU32,
    peak_workers: AtomicU32,
    started: Instant,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self {
            completed: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            active_workers: AtomicU32::new(0),
            peak_workers: AtomicU32::new(0),
            started: Instant::now(),
        }
    }

    /// Record one finished task. Returns the new completion count.
    pub fn record_completed(&self, bytes: u64) -> u64 {
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn increment_workers(&self) {
        let now = self.active_workers.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_workers.fetch_max(now, Ordering::AcqRel);
    }

    pub fn decrement_workers(&self) {
        self.active_workers.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    pub fn peak_workers(&self) -> u32 {
        self.peak_workers.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let bytes_written = self.bytes_written.load(Ordering::Relaxed);
        let elapsed = self.started.elapsed().as_secs_f64();
        let download_bps = if elapsed > 0.1 {
            (bytes_written as f64 / elapsed) as u64
        } else {
            0
        };

        ProgressSnapshot {
            completed: self.completed(),
            bytes_written,
            active_workers: self.active_workers.load(Ordering::Relaxed),
            peak_workers: self.peak_workers(),
            download_bps,
        }
    }
}

impl Default for ProgressCounter {
    fn default() -> Self {
        Self::new()
    }
}
