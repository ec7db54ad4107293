use anyhow::Context;
use centroid_finder::{
    Connectivity, CsvRecordWriter, ParallelSampler, PipelineConfig, SamplingConfig, SamplingSummary, VisionPipeline,
};
use clap::{Parser, ValueEnum};
use log::info;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use video_summary::{frame_source, parse_target_color, summarize};

/// Samples a video once per interval and writes the centroid of the largest
/// region of the target color to a `time,x,y` CSV file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Video file to process, or a directory of still frames.
    input: PathBuf,

    /// CSV file to write.
    output: PathBuf,

    /// Target color as hexadecimal RGB, e.g. FFA200, #FFA200 or 0xFFA200.
    #[arg(value_parser = parse_target_color)]
    target_color: u32,

    /// Maximum Euclidean RGB distance (inclusive) counted as the target color.
    threshold: u32,

    /// Seconds of media time between two samples.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    interval_secs: u64,

    /// Frame rate used when the input is a directory of still frames.
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// Frames analyzed concurrently. 0 uses one worker per CPU.
    #[arg(long, default_value_t = 1)]
    jobs: usize,

    /// Which neighbors join a region.
    #[arg(long, value_enum, default_value_t = ConnectivityArg::Four)]
    connectivity: ConnectivityArg,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ConnectivityArg {
    Four,
    Eight,
}

impl From<ConnectivityArg> for Connectivity {
    fn from(arg: ConnectivityArg) -> Self {
        match arg {
            ConnectivityArg::Four => Connectivity::Four,
            ConnectivityArg::Eight => Connectivity::Eight,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let start = Instant::now();

    let pipeline_config = PipelineConfig {
        target_color: args.target_color,
        threshold: args.threshold,
        connectivity: args.connectivity.into(),
    };
    let sampling = SamplingConfig {
        interval: Duration::from_secs(args.interval_secs),
    };

    let summary: SamplingSummary = if args.jobs == 1 {
        summarize(&args.input, &args.output, pipeline_config, sampling, args.fps)?
    } else {
        let mut source = frame_source::open(&args.input, args.fps)
            .with_context(|| format!("opening input {:?}", args.input))?;
        let mut sink = CsvRecordWriter::create(&args.output)
            .with_context(|| format!("creating output {:?}", args.output))?;

        let mut sampler = ParallelSampler::new(VisionPipeline::from_config(pipeline_config), sampling);
        if args.jobs > 0 {
            sampler = sampler.with_workers(args.jobs);
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("starting worker runtime")?;
        runtime.block_on(sampler.run(&mut *source, &mut sink))?
    };

    info!("Processing complete, saved to: {}", args.output.display());
    info!(
        "{} samples, {} with a detection, {} skipped",
        summary.sampled, summary.detected, summary.skipped
    );
    info!("Elapsed time: {:.3} seconds", start.elapsed().as_secs_f64());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_all_positionals() {
        assert!(Args::try_parse_from(["video_summary", "in.mp4", "out.csv", "FF0000"]).is_err());
        assert!(Args::try_parse_from(["video_summary", "in.mp4", "out.csv", "FF0000", "-3"]).is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let args = Args::try_parse_from(["video_summary", "in.mp4", "out.csv", "#FF0000", "25"]).unwrap();
        assert_eq!(args.target_color, 0xFF0000);
        assert_eq!(args.threshold, 25);
        assert_eq!(args.interval_secs, 1);
        assert_eq!(args.jobs, 1);
        assert_eq!(args.connectivity, ConnectivityArg::Four);
    }

    #[test]
    fn test_cli_rejects_zero_interval() {
        assert!(
            Args::try_parse_from(["video_summary", "a", "b", "FF0000", "1", "--interval-secs", "0"]).is_err()
        );
    }

    #[test]
    fn test_clap_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
