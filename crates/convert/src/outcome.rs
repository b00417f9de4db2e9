//! Batch outcome aggregation.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Aggregate result of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every file converted
    AllSucceeded,
    /// At least one file failed; details are only in the log
    PartialFailure,
}

impl BatchOutcome {
    /// True for `AllSucceeded`
    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::AllSucceeded)
    }
}

/// Per-batch counters shared by every worker.
///
/// This is the only state workers write concurrently. Counters only grow;
/// they are read once the pool has drained.
#[derive(Debug, Default)]
pub struct BatchStatus {
    converted: AtomicUsize,
    failed: AtomicUsize,
}

impl BatchStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one converted file
    pub fn record_success(&self) {
        self.converted.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one failed file
    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn converted(&self) -> usize {
        self.converted.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    /// `PartialFailure` as soon as any failure was recorded
    pub fn outcome(&self) -> BatchOutcome {
        if self.failed() > 0 {
            BatchOutcome::PartialFailure
        } else {
            BatchOutcome::AllSucceeded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_empty_status_succeeds() {
        let status = BatchStatus::new();
        assert_eq!(status.outcome(), BatchOutcome::AllSucceeded);
        assert!(status.outcome().is_success());
    }

    #[test]
    fn test_single_failure_is_partial() {
        let status = BatchStatus::new();
        status.record_success();
        status.record_failure();
        status.record_success();
        assert_eq!(status.converted(), 2);
        assert_eq!(status.failed(), 1);
        assert_eq!(status.outcome(), BatchOutcome::PartialFailure);
        assert!(!status.outcome().is_success());
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let status = Arc::new(BatchStatus::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let status = Arc::clone(&status);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        if i % 2 == 0 {
                            status.record_success();
                        } else {
                            status.record_failure();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(status.converted(), 4000);
        assert_eq!(status.failed(), 4000);
    }
}
