// THEORY:
// Errors are split by who is at fault. A `StructureError` is always a caller bug:
// the grid handed to the engine was absent, empty, or not rectangular. It aborts
// the single call that triggered it and never produces partial results.
//
// The frame and sampling errors belong to the collaborators around the engine
// (decoders, output files). "No frame at this instant" and "no group in this
// frame" are NOT errors; they are ordinary `None`/empty results.

use thiserror::Error;

/// Raised when a raster handed to the engine is structurally unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    /// The raster itself, or one of its rows, is absent.
    #[error("Null array or subarray")]
    Null,
    /// The raster has no rows, an empty row, ragged rows, or a non-binary cell.
    #[error("Invalid array: {0}")]
    Invalid(String),
}

/// Failures reported by a frame source (decoder, image sequence, ...).
#[derive(Debug, Error)]
pub enum FrameSourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("unsupported input: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Structure(#[from] StructureError),
}

/// Failures that abort a whole sampling run.
#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("frame source failed: {0}")]
    Source(#[from] FrameSourceError),
    #[error("record sink failed: {0}")]
    Sink(#[from] std::io::Error),
    #[error("worker failed: {0}")]
    Worker(String),
}
