//! Conversion worker for kelp
//!
//! Runs the single-file pipeline: open source, decode, compute destination,
//! create destination, encode. Every failure is reported per file and never
//! aborts the rest of the batch.

use crate::codec::{decode_reader, DecodeError, EncodeError, FormatEncoder};
use crate::outcome::BatchStatus;
use crate::path_map::destination_path;
use crate::progress::ProgressObserver;
use std::any::Any;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

/// Error type for a single-file conversion
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Source is missing or unreadable
    #[error("cannot open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    /// Source data is corrupt or in an unsupported format
    #[error("cannot decode {}: {source}", .path.display())]
    Decode { path: PathBuf, source: DecodeError },

    /// Destination exists and overwriting is not allowed
    #[error("destination already exists: {}", .path.display())]
    DestinationExists { path: PathBuf },

    /// Destination could not be created for another reason
    #[error("cannot create {}: {source}", .path.display())]
    CreateDestination { path: PathBuf, source: io::Error },

    /// Encoder failed while writing the destination
    #[error("cannot encode {}: {source}", .path.display())]
    Encode { path: PathBuf, source: EncodeError },

    /// Reading piped input failed
    #[error("cannot read input: {0}")]
    Read(io::Error),

    /// Writing piped output failed
    #[error("cannot write output: {0}")]
    Write(io::Error),
}

/// One source file to convert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    source: PathBuf,
}

impl ConversionJob {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Source path of this job
    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// Settings shared by every worker of a batch
#[derive(Clone)]
pub struct ConvertSettings {
    /// Encoder for the target format
    pub encoder: Arc<dyn FormatEncoder>,
    /// Replace existing destinations instead of failing
    pub overwrite: bool,
    /// Output-root remap (None = next to the source)
    pub output_dir: Option<PathBuf>,
}

impl ConvertSettings {
    pub fn new(encoder: Arc<dyn FormatEncoder>) -> Self {
        Self {
            encoder,
            overwrite: false,
            output_dir: None,
        }
    }

    /// Destination path for `source` under these settings
    pub fn destination_for(&self, source: &Path) -> PathBuf {
        destination_path(source, self.encoder.extension(), self.output_dir.as_deref())
    }
}

impl std::fmt::Debug for ConvertSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvertSettings")
            .field("extension", &self.encoder.extension())
            .field("overwrite", &self.overwrite)
            .field("output_dir", &self.output_dir)
            .finish()
    }
}

/// Convert one file and return the destination that was written.
///
/// Pipeline:
/// 1. Open the source (`Open`)
/// 2. Decode it, detecting the format from content (`Decode`)
/// 3. Compute the destination; with an output root, create its parent directory
/// 4. Create the destination exclusively unless overwriting (`DestinationExists`)
/// 5. Encode into it (`Encode`); a partially written destination is removed
///
/// File handles are owned locally, so they are closed on every return path.
pub fn convert_file(source: &Path, settings: &ConvertSettings) -> Result<PathBuf, ConvertError> {
    let input = File::open(source).map_err(|e| ConvertError::Open {
        path: source.to_path_buf(),
        source: e,
    })?;

    let image = decode_reader(BufReader::new(input)).map_err(|e| ConvertError::Decode {
        path: source.to_path_buf(),
        source: e,
    })?;

    let dest = settings.destination_for(source);
    if settings.output_dir.is_some() {
        ensure_parent_dir(&dest);
    }

    let output = create_destination(&dest, settings.overwrite)?;
    let mut writer = BufWriter::new(output);

    let written = settings
        .encoder
        .encode(&image, &mut writer)
        .and_then(|()| writer.flush().map_err(EncodeError::from));

    if let Err(e) = written {
        drop(writer);
        if let Err(remove_err) = fs::remove_file(&dest) {
            debug!(path = %dest.display(), "could not remove partial output: {}", remove_err);
        }
        return Err(ConvertError::Encode {
            path: dest,
            source: e,
        });
    }

    Ok(dest)
}

/// Best-effort creation of the destination's parent directory.
///
/// A failure here surfaces as `CreateDestination` in the next step.
fn ensure_parent_dir(dest: &Path) {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent) {
            debug!(path = %parent.display(), "could not create output directory: {}", e);
        }
    }
}

/// Open the destination for writing.
///
/// Without `overwrite` the file is created with `create_new`, which fails
/// atomically if the path exists. With it, any existing file is truncated.
fn create_destination(dest: &Path, overwrite: bool) -> Result<File, ConvertError> {
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    options.open(dest).map_err(|e| {
        if e.kind() == io::ErrorKind::AlreadyExists {
            ConvertError::DestinationExists {
                path: dest.to_path_buf(),
            }
        } else {
            ConvertError::CreateDestination {
                path: dest.to_path_buf(),
                source: e,
            }
        }
    })
}

/// Runs conversion jobs and records their results.
///
/// Cheap to clone; every clone shares the same settings, status and progress observer.
#[derive(Clone)]
pub struct ConversionWorker {
    settings: Arc<ConvertSettings>,
    status: Arc<BatchStatus>,
    progress: Arc<dyn ProgressObserver>,
}

impl ConversionWorker {
    pub fn new(
        settings: Arc<ConvertSettings>,
        status: Arc<BatchStatus>,
        progress: Arc<dyn ProgressObserver>,
    ) -> Self {
        Self {
            settings,
            status,
            progress,
        }
    }

    /// Convert one job. Failures are logged and recorded, never returned.
    ///
    /// A panic inside a codec is caught here and counted as a failure of this file.
    pub fn process(&self, job: ConversionJob) {
        let result =
            panic::catch_unwind(AssertUnwindSafe(|| convert_file(job.source(), &self.settings)));

        match result {
            Ok(Ok(dest)) => {
                debug!(
                    source = %job.source().display(),
                    dest = %dest.display(),
                    "converted"
                );
                self.status.record_success();
            }
            Ok(Err(e)) => {
                error!(path = %job.source().display(), error = %e, "conversion failed");
                self.status.record_failure();
            }
            Err(payload) => {
                error!(
                    path = %job.source().display(),
                    error = panic_message(payload.as_ref()),
                    "conversion panicked"
                );
                self.status.record_failure();
            }
        }
        self.progress.tick();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
