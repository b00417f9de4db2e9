//! Concurrency planning module for kelp
//!
//! Derives the worker count and job queue depth from configuration.

use crate::config::{Config, ConfigError};

/// Job queue slots per worker
pub const QUEUE_DEPTH_PER_WORKER: usize = 10;

/// Concurrency plan derived from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyPlan {
    /// Number of long-lived conversion workers
    pub workers: usize,
    /// Capacity of the bounded job queue
    pub queue_capacity: usize,
}

impl ConcurrencyPlan {
    /// Derive a concurrency plan from configuration
    ///
    /// Uses the following rules:
    /// - `workers` is `batch.jobs`, which must be at least one
    /// - `queue_capacity` is `workers * QUEUE_DEPTH_PER_WORKER`
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidJobs` if `batch.jobs` is below one.
    pub fn derive(cfg: &Config) -> Result<Self, ConfigError> {
        let workers = cfg.batch.validated_jobs()? as usize;
        Ok(Self::with_workers(workers))
    }

    /// Plan for exactly `workers` workers (clamped to at least one)
    pub fn with_workers(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            queue_capacity: workers.saturating_mul(QUEUE_DEPTH_PER_WORKER),
        }
    }

    /// The single-worker plan used for piped conversions
    pub fn single() -> Self {
        Self::with_workers(1)
    }
}

/// Public function to derive a concurrency plan from configuration
pub fn derive_plan(cfg: &Config) -> Result<ConcurrencyPlan, ConfigError> {
    ConcurrencyPlan::derive(cfg)
}
