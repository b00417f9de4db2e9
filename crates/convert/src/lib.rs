//! kelp
//!
//! Batch image format conversion: decodes each source image, re-encodes it in
//! one target format and writes it next to the source or under an output root,
//! spreading files over a bounded pool of workers.

pub mod batch;
pub mod codec;
pub mod concurrency;
pub mod outcome;
pub mod path_map;
pub mod pipe;
pub mod pool;
pub mod progress;
pub mod sources;
pub mod worker;

pub use batch::{run_batch, BatchController, BatchError};
pub use codec::{DecodeError, EncodeError, FormatEncoder, TargetFormat};
pub use concurrency::{derive_plan, ConcurrencyPlan};
pub use kelp_config as config;
pub use kelp_config::Config;
pub use outcome::{BatchOutcome, BatchStatus};
pub use path_map::destination_path;
pub use pipe::{convert_stream, PipeJob};
pub use pool::{DispatchPool, PoolPhase, PoolReport};
pub use progress::{BarProgress, NoProgress, ProgressObserver};
pub use sources::resolve_sources;
pub use worker::{convert_file, ConversionJob, ConversionWorker, ConvertError, ConvertSettings};
