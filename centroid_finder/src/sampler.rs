// THEORY:
// The `sampler` turns a stream of frames into a compact time series. It is the
// only stateful piece of the system, and its only state is "which instant comes
// next".
//
// For every sample instant (0s, 1s, 2s, ... by default):
// 1.  Seek the frame source to the instant and grab one frame.
// 2.  No frame -> the instant is skipped, no record is written.
// 3.  Run the pipeline and keep the centroid of the top ranked group.
// 4.  Append one `(second, x, y)` record to the sink, using -1/-1 when no group
//     was found.
//
// Records are written as they are produced, so memory use does not grow with
// the length of the media. Decoder failures and write failures abort the run;
// a missing frame or an empty frame never does.

use crate::core_modules::error::{FrameSourceError, SamplingError};
use crate::core_modules::raster::{Coordinate, Raster};
use crate::pipeline::ImageGroupFinder;
use log::{debug, info, warn};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Header line written before any record.
pub const CSV_HEADER: &str = "time,x,y";
/// Coordinate value written when no group was detected.
pub const NO_DETECTION: i64 = -1;

/// Anything that can hand out decoded frames at given media times.
pub trait FrameSource {
    /// Total media length.
    fn duration(&self) -> Duration;
    /// Positions the source so that the next grab returns the frame at `timestamp`.
    fn seek(&mut self, timestamp: Duration) -> Result<(), FrameSourceError>;
    /// The frame at the current position, or `None` if there is none.
    fn grab_frame(&mut self) -> Result<Option<Raster>, FrameSourceError>;
}

/// One output row: the sampled second and the detected centroid, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRecord {
    pub second: u64,
    pub centroid: Option<Coordinate>,
}

impl SampleRecord {
    /// `(x, y)` as written to output, with the -1 sentinel for no detection.
    pub fn coordinates(&self) -> (i64, i64) {
        match self.centroid {
            Some(c) => (c.x as i64, c.y as i64),
            None => (NO_DETECTION, NO_DETECTION),
        }
    }
}

/// Where records go.
pub trait RecordSink {
    fn write_header(&mut self) -> io::Result<()>;
    fn write_record(&mut self, record: &SampleRecord) -> io::Result<()>;
    /// Flushes anything buffered. Called once after the last record.
    fn finish(&mut self) -> io::Result<()>;
}

/// Writes records as `time,x,y` CSV lines.
pub struct CsvRecordWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> CsvRecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::new(inner),
        }
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}

impl CsvRecordWriter<fs::File> {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(fs::File::create(path)?))
    }
}

impl<W: Write> RecordSink for CsvRecordWriter<W> {
    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "{}", CSV_HEADER)
    }

    fn write_record(&mut self, record: &SampleRecord) -> io::Result<()> {
        let (x, y) = record.coordinates();
        writeln!(self.writer, "{},{},{}", record.second, x, y)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl RecordSink for Vec<SampleRecord> {
    fn write_header(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn write_record(&mut self, record: &SampleRecord) -> io::Result<()> {
        self.push(*record);
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sampling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingConfig {
    /// Media time between two sample instants. Must be non-zero.
    pub interval: Duration,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

impl SamplingConfig {
    /// Sample instants starting at zero, strictly before `duration` truncated
    /// to whole seconds. A 10.033s clip is sampled at 0..=9.
    pub fn instants(&self, duration: Duration) -> impl Iterator<Item = Duration> + use<> {
        let interval = self.interval.max(Duration::from_millis(1));
        let limit = Duration::from_secs(duration.as_secs());
        let mut next = Duration::ZERO;
        std::iter::from_fn(move || {
            if next >= limit {
                return None;
            }
            let current = next;
            next += interval;
            Some(current)
        })
    }
}

/// Counters for one sampling run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplingSummary {
    /// Records written.
    pub sampled: u64,
    /// Records with a detected centroid.
    pub detected: u64,
    /// Instants with no frame available.
    pub skipped: u64,
}

impl SamplingSummary {
    pub(crate) fn count(&mut self, record: &SampleRecord) {
        self.sampled += 1;
        if record.centroid.is_some() {
            self.detected += 1;
        }
    }
}

/// Seeks and grabs the frame for one instant.
pub(crate) fn acquire<S: FrameSource + ?Sized>(
    source: &mut S,
    instant: Duration,
) -> Result<Option<Raster>, FrameSourceError> {
    source.seek(instant)?;
    source.grab_frame()
}

/// Sequential sampler: one frame at a time, in time order.
pub struct Sampler<P> {
    pipeline: P,
    config: SamplingConfig,
}

impl<P: ImageGroupFinder> Sampler<P> {
    pub fn new(pipeline: P, config: SamplingConfig) -> Self {
        Self { pipeline, config }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Samples `source` and writes one record per available instant to `sink`.
    pub fn run<S, K>(&self, source: &mut S, sink: &mut K) -> Result<SamplingSummary, SamplingError>
    where
        S: FrameSource + ?Sized,
        K: RecordSink + ?Sized,
    {
        let duration = source.duration();
        info!(
            "Sampling {:.3}s of media every {:?}",
            duration.as_secs_f64(),
            self.config.interval
        );

        let mut summary = SamplingSummary::default();
        sink.write_header()?;

        for instant in self.config.instants(duration) {
            let second = instant.as_secs();
            let Some(raster) = acquire(source, instant)? else {
                warn!("No frame available at {:?}, skipping", instant);
                summary.skipped += 1;
                continue;
            };

            let record = SampleRecord {
                second,
                centroid: self.pipeline.locate(&raster),
            };
            sink.write_record(&record)?;
            summary.count(&record);
            debug!("Processed second {}", second);
        }

        sink.finish()?;
        info!(
            "Sampled {} instants ({} detections, {} skipped)",
            summary.sampled, summary.detected, summary.skipped
        );
        Ok(summary)
    }
}

/// Still frames in a directory, played back at a fixed frame rate.
///
/// Frames are ordered by file name; only png, jpg/jpeg and bmp files are used.
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    frames: Vec<PathBuf>,
    frames_per_second: f64,
    duration: Duration,
    position: usize,
}

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

impl ImageSequenceSource {
    pub fn open(directory: impl AsRef<Path>, frames_per_second: f64) -> Result<Self, FrameSourceError> {
        let mut frames = Vec::new();
        for entry in fs::read_dir(directory.as_ref())? {
            let path = entry?.path();
            let is_frame = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if path.is_file() && is_frame {
                frames.push(path);
            }
        }
        frames.sort();
        Self::from_frames(frames, frames_per_second)
    }

    pub fn from_frames(frames: Vec<PathBuf>, frames_per_second: f64) -> Result<Self, FrameSourceError> {
        if !(frames_per_second.is_finite() && frames_per_second > 0.0) {
            return Err(FrameSourceError::Unsupported(format!(
                "frame rate must be positive, got {}",
                frames_per_second
            )));
        }
        let duration = Duration::try_from_secs_f64(frames.len() as f64 / frames_per_second).map_err(|_| {
            FrameSourceError::Unsupported(format!(
                "{} frames at {} fps do not fit in a media duration",
                frames.len(),
                frames_per_second
            ))
        })?;
        Ok(Self {
            frames,
            frames_per_second,
            duration,
            position: 0,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ImageSequenceSource {
    fn duration(&self) -> Duration {
        self.duration
    }

    fn seek(&mut self, timestamp: Duration) -> Result<(), FrameSourceError> {
        self.position = (timestamp.as_secs_f64() * self.frames_per_second).floor() as usize;
        Ok(())
    }

    fn grab_frame(&mut self) -> Result<Option<Raster>, FrameSourceError> {
        let Some(path) = self.frames.get(self.position) else {
            return Ok(None);
        };
        let image = image::open(path)?;
        self.position += 1;
        Ok(Some(Raster::try_from(&image)?))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pipeline::{PipelineConfig, VisionPipeline};

    pub const MARKER: u32 = 0x00FF00;
    pub const BACKGROUND: u32 = 0x202020;

    /// In-memory source: one optional frame per whole second of media.
    pub struct MockFrameSource {
        pub frames: Vec<Option<Raster>>,
        pub position: usize,
        pub seeks: Vec<Duration>,
    }

    impl MockFrameSource {
        pub fn new(frames: Vec<Option<Raster>>) -> Self {
            Self {
                frames,
                position: 0,
                seeks: Vec::new(),
            }
        }
    }

    impl FrameSource for MockFrameSource {
        fn duration(&self) -> Duration {
            Duration::from_secs(self.frames.len() as u64)
        }

        fn seek(&mut self, timestamp: Duration) -> Result<(), FrameSourceError> {
            self.seeks.push(timestamp);
            self.position = timestamp.as_secs() as usize;
            Ok(())
        }

        fn grab_frame(&mut self) -> Result<Option<Raster>, FrameSourceError> {
            Ok(self.frames.get(self.position).cloned().flatten())
        }
    }

    /// An 8x6 frame with a 2x2 marker whose top-left corner is `(x, y)`.
    pub fn frame_with_marker(x: u32, y: u32) -> Raster {
        let mut pixels = vec![BACKGROUND; 8 * 6];
        for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            pixels[((y + dy) * 8 + x + dx) as usize] = MARKER;
        }
        Raster::new(8, 6, pixels).unwrap()
    }

    pub fn blank_frame() -> Raster {
        Raster::filled(8, 6, BACKGROUND).unwrap()
    }

    pub fn marker_pipeline() -> VisionPipeline {
        VisionPipeline::from_config(PipelineConfig {
            target_color: MARKER,
            threshold: 30,
            ..Default::default()
        })
    }

    #[test]
    fn test_writes_one_record_per_second() {
        let mut source = MockFrameSource::new(vec![
            Some(frame_with_marker(0, 0)),
            Some(frame_with_marker(4, 2)),
            Some(frame_with_marker(6, 4)),
        ]);
        let sampler = Sampler::new(marker_pipeline(), SamplingConfig::default());
        let mut records: Vec<SampleRecord> = Vec::new();
        let summary = sampler.run(&mut source, &mut records).unwrap();

        assert_eq!(
            records,
            vec![
                SampleRecord { second: 0, centroid: Some(Coordinate::new(0, 0)) },
                SampleRecord { second: 1, centroid: Some(Coordinate::new(4, 2)) },
                SampleRecord { second: 2, centroid: Some(Coordinate::new(6, 4)) },
            ]
        );
        assert_eq!(summary, SamplingSummary { sampled: 3, detected: 3, skipped: 0 });
        assert_eq!(
            source.seeks,
            vec![Duration::ZERO, Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn test_missing_frames_are_skipped_and_blank_frames_are_sentinels() {
        let mut source = MockFrameSource::new(vec![
            Some(blank_frame()),
            None,
            Some(frame_with_marker(2, 2)),
        ]);
        let sampler = Sampler::new(marker_pipeline(), SamplingConfig::default());
        let mut records: Vec<SampleRecord> = Vec::new();
        let summary = sampler.run(&mut source, &mut records).unwrap();

        assert_eq!(
            records,
            vec![
                SampleRecord { second: 0, centroid: None },
                SampleRecord { second: 2, centroid: Some(Coordinate::new(2, 2)) },
            ]
        );
        assert_eq!(summary, SamplingSummary { sampled: 2, detected: 1, skipped: 1 });
    }

    #[test]
    fn test_csv_output_format() {
        let mut source = MockFrameSource::new(vec![Some(frame_with_marker(3, 1)), Some(blank_frame())]);
        let sampler = Sampler::new(marker_pipeline(), SamplingConfig::default());
        let mut sink = CsvRecordWriter::new(Vec::new());
        sampler.run(&mut source, &mut sink).unwrap();

        let csv = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(csv, "time,x,y\n0,3,1\n1,-1,-1\n");
    }

    #[test]
    fn test_empty_media_writes_only_the_header() {
        let mut source = MockFrameSource::new(vec![]);
        let sampler = Sampler::new(marker_pipeline(), SamplingConfig::default());
        let mut sink = CsvRecordWriter::new(Vec::new());
        let summary = sampler.run(&mut source, &mut sink).unwrap();

        assert_eq!(summary, SamplingSummary::default());
        assert_eq!(String::from_utf8(sink.into_inner().unwrap()).unwrap(), "time,x,y\n");
    }

    #[test]
    fn test_instants_stop_before_duration() {
        let config = SamplingConfig::default();
        let instants: Vec<_> = config.instants(Duration::from_millis(3500)).collect();
        assert_eq!(
            instants,
            vec![Duration::ZERO, Duration::from_secs(1), Duration::from_secs(2)]
        );

        let every_two = SamplingConfig { interval: Duration::from_secs(2) };
        assert_eq!(every_two.instants(Duration::from_secs(4)).count(), 2);
        assert_eq!(every_two.instants(Duration::from_millis(4900)).count(), 2);
        assert_eq!(config.instants(Duration::from_secs(3)).count(), 3);
        assert_eq!(config.instants(Duration::from_millis(999)).count(), 0);
        assert_eq!(config.instants(Duration::ZERO).count(), 0);
    }

    #[test]
    fn test_fractional_duration_drops_the_partial_second() {
        struct MarkerForever;
        impl FrameSource for MarkerForever {
            fn duration(&self) -> Duration {
                Duration::from_millis(10_033)
            }
            fn seek(&mut self, _: Duration) -> Result<(), FrameSourceError> {
                Ok(())
            }
            fn grab_frame(&mut self) -> Result<Option<Raster>, FrameSourceError> {
                Ok(Some(frame_with_marker(1, 1)))
            }
        }

        let sampler = Sampler::new(marker_pipeline(), SamplingConfig::default());
        let mut sink = CsvRecordWriter::new(Vec::new());
        let summary = sampler.run(&mut MarkerForever, &mut sink).unwrap();

        let csv = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        let rows: Vec<&str> = csv.lines().skip(1).collect();
        assert_eq!(rows.len(), 10);
        assert_eq!(rows.last(), Some(&"9,1,1"));
        assert_eq!(summary.sampled, 10);
    }

    #[test]
    fn test_source_errors_abort_the_run() {
        struct BrokenSource;
        impl FrameSource for BrokenSource {
            fn duration(&self) -> Duration {
                Duration::from_secs(5)
            }
            fn seek(&mut self, _: Duration) -> Result<(), FrameSourceError> {
                Ok(())
            }
            fn grab_frame(&mut self) -> Result<Option<Raster>, FrameSourceError> {
                Err(FrameSourceError::Decode("corrupt packet".into()))
            }
        }

        let sampler = Sampler::new(marker_pipeline(), SamplingConfig::default());
        let mut records: Vec<SampleRecord> = Vec::new();
        let result = sampler.run(&mut BrokenSource, &mut records);
        assert!(matches!(result, Err(SamplingError::Source(FrameSourceError::Decode(_)))));
        assert!(records.is_empty());
    }

    #[test]
    fn test_image_sequence_seeks_by_frame_rate() {
        let directory = std::env::temp_dir().join(format!("centroid_finder_seq_{}", std::process::id()));
        fs::create_dir_all(&directory).unwrap();
        for (index, x) in [0u32, 2, 4, 6].iter().enumerate() {
            let path = directory.join(format!("frame_{:03}.png", index));
            frame_with_marker(*x, 0).to_rgb_image().save(&path).unwrap();
        }
        fs::write(directory.join("notes.txt"), "not a frame").unwrap();

        let mut source = ImageSequenceSource::open(&directory, 2.0).unwrap();
        assert_eq!(source.frame_count(), 4);
        assert_eq!(source.duration(), Duration::from_secs(2));

        let sampler = Sampler::new(marker_pipeline(), SamplingConfig::default());
        let mut records: Vec<SampleRecord> = Vec::new();
        sampler.run(&mut source, &mut records).unwrap();
        assert_eq!(
            records,
            vec![
                SampleRecord { second: 0, centroid: Some(Coordinate::new(0, 0)) },
                SampleRecord { second: 1, centroid: Some(Coordinate::new(4, 0)) },
            ]
        );

        source.seek(Duration::from_secs(10)).unwrap();
        assert!(source.grab_frame().unwrap().is_none());

        fs::remove_dir_all(&directory).unwrap();
    }

    #[test]
    fn test_image_sequence_rejects_bad_frame_rate() {
        assert!(ImageSequenceSource::from_frames(vec![], 0.0).is_err());
        assert!(ImageSequenceSource::from_frames(vec![], f64::NAN).is_err());
    }

    #[test]
    fn test_image_sequence_rejects_unrepresentable_duration() {
        let result = ImageSequenceSource::from_frames(vec![PathBuf::from("a.png")], 1e-300);
        assert!(matches!(result, Err(FrameSourceError::Unsupported(_))));

        let slow = ImageSequenceSource::from_frames(vec![PathBuf::from("a.png")], 0.5).unwrap();
        assert_eq!(slow.duration(), Duration::from_secs(2));
    }
}
