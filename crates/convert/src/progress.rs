//! Progress reporting for batch conversions.
//!
//! Observers are cosmetic: they are ticked once per finished job, success or
//! failure, and never influence scheduling or the batch outcome.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const BAR_TEMPLATE: &str =
    "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} files ({percent}%)";

/// Receives batch progress events. Shared by every worker.
pub trait ProgressObserver: Send + Sync {
    /// Batch is about to start with `total` files
    fn start(&self, total: u64);
    /// One file finished
    fn tick(&self);
    /// Every file finished
    fn finish(&self);
}

/// Observer that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn start(&self, _total: u64) {}
    fn tick(&self) {}
    fn finish(&self) {}
}

/// Terminal progress bar drawn on stderr
#[derive(Clone)]
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }

    /// Files reported so far
    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for BarProgress {
    fn start(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
    }

    fn tick(&self) {
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish();
    }
}
