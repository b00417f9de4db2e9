//! Piped conversion: raw image bytes in, encoded bytes out.
//!
//! No destination path is computed and no existence check is made.

use crate::codec::{decode_bytes, FormatEncoder};
use crate::worker::ConvertError;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Display name used for piped input in error messages
const STDIN_NAME: &str = "<stdin>";
/// Display name used for piped output in error messages
const STDOUT_NAME: &str = "<stdout>";

/// A single piped conversion: where to read from and where to write to
pub struct PipeJob<R, W> {
    pub input: R,
    pub output: W,
}

impl<R: Read, W: Write> PipeJob<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Run the conversion, consuming the job
    pub fn run(self, encoder: &dyn FormatEncoder) -> Result<(), ConvertError> {
        convert_stream(self.input, self.output, encoder)
    }
}

/// Read all of `input`, decode it, and write it to `output` encoded by `encoder`.
///
/// Encoding happens in memory so nothing reaches `output` unless encoding succeeded.
pub fn convert_stream<R: Read, W: Write>(
    mut input: R,
    mut output: W,
    encoder: &dyn FormatEncoder,
) -> Result<(), ConvertError> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes).map_err(ConvertError::Read)?;

    let image = decode_bytes(&bytes).map_err(|e| ConvertError::Decode {
        path: PathBuf::from(STDIN_NAME),
        source: e,
    })?;

    let mut encoded = Vec::new();
    encoder
        .encode(&image, &mut encoded)
        .map_err(|e| ConvertError::Encode {
            path: PathBuf::from(STDOUT_NAME),
            source: e,
        })?;

    output.write_all(&encoded).map_err(ConvertError::Write)?;
    output.flush().map_err(ConvertError::Write)
}
