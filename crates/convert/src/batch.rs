//! Batch controller for kelp
//!
//! Wires configuration, the dispatch pool, the conversion worker and the
//! progress observer together, and reduces a batch to a single outcome.

use crate::codec::FormatEncoder;
use crate::concurrency::{derive_plan, ConcurrencyPlan};
use crate::config::{Config, ConfigError};
use crate::outcome::{BatchOutcome, BatchStatus};
use crate::pipe::PipeJob;
use crate::pool::DispatchPool;
use crate::progress::{BarProgress, NoProgress, ProgressObserver};
use crate::worker::{ConversionJob, ConversionWorker, ConvertSettings};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// Error type for batch operations
#[derive(Debug, Error)]
pub enum BatchError {
    /// Configuration error, reported before any file I/O
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Nothing to convert
    #[error("no input files")]
    NoInputFiles,
}

/// Runs one batch of conversions
pub struct BatchController {
    plan: ConcurrencyPlan,
    settings: Arc<ConvertSettings>,
    progress: Arc<dyn ProgressObserver>,
}

impl BatchController {
    /// Build a controller from configuration
    ///
    /// # Errors
    /// Returns `BatchError::Config` if `batch.jobs` is below one.
    pub fn new(config: &Config, encoder: Arc<dyn FormatEncoder>) -> Result<Self, BatchError> {
        let plan = derive_plan(config)?;

        let settings = ConvertSettings {
            encoder,
            overwrite: config.batch.overwrite,
            output_dir: config.batch.output_dir.clone(),
        };

        let progress: Arc<dyn ProgressObserver> = if config.batch.progress {
            Arc::new(BarProgress::new())
        } else {
            Arc::new(NoProgress)
        };

        Ok(Self {
            plan,
            settings: Arc::new(settings),
            progress,
        })
    }

    /// Replace the progress observer
    pub fn with_progress(mut self, progress: Arc<dyn ProgressObserver>) -> Self {
        self.progress = progress;
        self
    }

    pub fn plan(&self) -> ConcurrencyPlan {
        self.plan
    }

    pub fn settings(&self) -> &ConvertSettings {
        &self.settings
    }

    /// Convert every source and wait for all of them.
    ///
    /// Per-file failures are logged by the worker and only show up here as
    /// `PartialFailure`.
    ///
    /// # Errors
    /// Returns `BatchError::NoInputFiles` for an empty source list.
    pub async fn run(&self, sources: Vec<PathBuf>) -> Result<BatchOutcome, BatchError> {
        self.run_with_status(sources, Arc::new(BatchStatus::new())).await
    }

    /// Like [`run`](Self::run), recording per-file results into `status`
    pub async fn run_with_status(
        &self,
        sources: Vec<PathBuf>,
        status: Arc<BatchStatus>,
    ) -> Result<BatchOutcome, BatchError> {
        if sources.is_empty() {
            return Err(BatchError::NoInputFiles);
        }

        let total = sources.len();
        let worker = ConversionWorker::new(
            Arc::clone(&self.settings),
            Arc::clone(&status),
            Arc::clone(&self.progress),
        );

        self.progress.start(total as u64);
        let report = DispatchPool::new(self.plan)
            .run(
                sources.into_iter().map(ConversionJob::new),
                move |job| worker.process(job),
            )
            .await;
        self.progress.finish();

        // jobs lost to a panic outside the worker still count against the batch
        for _ in 0..report.panicked {
            status.record_failure();
        }

        info!(
            total,
            converted = status.converted(),
            failed = status.failed(),
            workers = self.plan.workers,
            "batch finished"
        );

        Ok(status.outcome())
    }

    /// Convert one image read from `input` and write it to `output`.
    ///
    /// Always runs on a single worker without progress, whatever the
    /// configuration says. Destination paths and overwrite rules do not apply.
    pub async fn run_piped<R, W>(&self, input: R, output: W) -> BatchOutcome
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let status = Arc::new(BatchStatus::new());
        let encoder = Arc::clone(&self.settings.encoder);
        let recorder = Arc::clone(&status);

        let report = DispatchPool::new(ConcurrencyPlan::single())
            .run(
                std::iter::once(PipeJob::new(input, output)),
                move |job: PipeJob<R, W>| match job.run(encoder.as_ref()) {
                    Ok(()) => recorder.record_success(),
                    Err(e) => {
                        error!(error = %e, "piped conversion failed");
                        recorder.record_failure();
                    }
                },
            )
            .await;

        if report.panicked > 0 || status.converted() == 0 {
            BatchOutcome::PartialFailure
        } else {
            status.outcome()
        }
    }
}

/// Convert `sources` with `encoder` under `config`
pub async fn run_batch(
    sources: Vec<PathBuf>,
    config: &Config,
    encoder: Arc<dyn FormatEncoder>,
) -> Result<BatchOutcome, BatchError> {
    BatchController::new(config, encoder)?.run(sources).await
}
