// Shared by the `video_summary` command and the job server: choosing a frame
// source for an input path, parsing colors the way users type them, and the
// sequential "video in, CSV out" run.

pub mod frame_source;

use anyhow::Context;
use centroid_finder::{CsvRecordWriter, PipelineConfig, Sampler, SamplingConfig, SamplingSummary, VisionPipeline};
use std::path::Path;

/// Parses a 24-bit hexadecimal RGB color, with or without a `#`/`0x` prefix.
pub fn parse_target_color(arg: &str) -> Result<u32, String> {
    let digits = arg
        .strip_prefix('#')
        .or_else(|| arg.strip_prefix("0x"))
        .or_else(|| arg.strip_prefix("0X"))
        .unwrap_or(arg);
    if digits.is_empty() || digits.len() > 6 {
        return Err(format!("expected up to 6 hex digits, got {:?}", arg));
    }
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid hex color {:?}: {}", arg, e))
}

/// Samples `input` one frame at a time and writes the CSV to `output`.
pub fn summarize(
    input: &Path,
    output: &Path,
    pipeline: PipelineConfig,
    sampling: SamplingConfig,
    frames_per_second: f64,
) -> anyhow::Result<SamplingSummary> {
    let mut source =
        frame_source::open(input, frames_per_second).with_context(|| format!("opening input {:?}", input))?;
    let mut sink = CsvRecordWriter::create(output).with_context(|| format!("creating output {:?}", output))?;
    let summary = Sampler::new(VisionPipeline::from_config(pipeline), sampling).run(&mut *source, &mut sink)?;
    Ok(summary)
}
