// THEORY:
// This file is the entry point for the `centroid_finder` library crate. It
// exposes the engine that locates the dominant region of a target color in a
// frame, plus the samplers that turn a stream of frames into a `(second, x, y)`
// time series.
//
// Layers, leaf first:
// - `core_modules`: raster containers, color distance, binarizer, group finder.
// - `pipeline`: binarizer + group finder behind a single call.
// - `sampler` / `parallel_sampler`: frame source -> pipeline -> record sink.
//
// Decoding video, parsing a command line and choosing output files live in the
// `video_summary` binary, not here.

pub mod core_modules;
pub mod parallel_sampler;
pub mod pipeline;
pub mod sampler;

pub use core_modules::binarizer::{DistanceImageBinarizer, ImageBinarizer};
pub use core_modules::color_distance::color_distance::{ColorDistance, EuclideanColorDistance};
pub use core_modules::error::{FrameSourceError, SamplingError, StructureError};
pub use core_modules::group::{Group, GroupList};
pub use core_modules::group_finder::{BinaryGroupFinder, Connectivity, FloodFillGroupFinder};
pub use core_modules::raster::{BinaryRaster, Coordinate, Raster};
pub use parallel_sampler::{ParallelSampler, WorkerPool};
pub use pipeline::{
    BinarizingImageGroupFinder, ImageGroupFinder, PipelineConfig, VisionPipeline, binarize, find_groups,
    find_groups_in_image,
};
pub use sampler::{
    CsvRecordWriter, FrameSource, ImageSequenceSource, RecordSink, SampleRecord, Sampler, SamplingConfig,
    SamplingSummary,
};
