//! Per-task outcomes and the batch summary built from them.

use std::fmt;

/// Terminal outcome of one task. Every dequeued task ends in exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Fetched and persisted.
    Written { bytes: u64 },
    /// Destination already existed; nothing fetched.
    Skipped,
    FetchFailed,
    /// Shard directory or file could not be written.
    WriteFailed,
}

/// Tallies for a finished (or in-progress) batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub written: u64,
    pub skipped: u64,
    pub fetch_failed: u64,
    pub write_failed: u64,
    pub bytes_written: u64,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Written { bytes } => {
                self.written += 1;
                self.bytes_written += bytes;
            }
            TaskOutcome::Skipped => self.skipped += 1,
            TaskOutcome::FetchFailed => self.fetch_failed += 1,
            TaskOutcome::WriteFailed => self.write_failed += 1,
        }
    }

    /// Number of tasks accounted for.
    pub fn total(&self) -> u64 {
        self.written + self.skipped + self.fetch_failed + self.write_failed
    }

    pub fn failed(&self) -> u64 {
        self.fetch_failed + self.write_failed
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} task(s): {} written ({:.1} MiB), {} skipped, {} fetch failed, {} write failed",
            self.total(),
            self.written,
            self.bytes_written as f64 / 1_048_576.0,
            self.skipped,
            self.fetch_failed,
            self.write_failed
        )
    }
}
