// Picks a frame source for an input path: a directory is read as a still-frame
// sequence, anything else is handed to the video decoder.

use centroid_finder::{FrameSource, FrameSourceError, ImageSequenceSource};
use std::path::Path;

pub fn open(input: &Path, frames_per_second: f64) -> Result<Box<dyn FrameSource>, FrameSourceError> {
    if input.is_dir() {
        let source = ImageSequenceSource::open(input, frames_per_second)?;
        log::info!("Reading {} frames from {:?} at {} fps", source.frame_count(), input, frames_per_second);
        return Ok(Box::new(source));
    }
    open_video(input)
}

#[cfg(feature = "opencv")]
fn open_video(input: &Path) -> Result<Box<dyn FrameSource>, FrameSourceError> {
    Ok(Box::new(video::VideoCaptureSource::open(input)?))
}

#[cfg(not(feature = "opencv"))]
fn open_video(input: &Path) -> Result<Box<dyn FrameSource>, FrameSourceError> {
    Err(FrameSourceError::Unsupported(format!(
        "{:?} is not a directory and video decoding needs the `opencv` feature",
        input
    )))
}

#[cfg(feature = "opencv")]
mod video {
    use centroid_finder::{FrameSource, FrameSourceError, Raster};
    use image::RgbImage;
    use opencv::{
        core::Mat,
        imgproc,
        prelude::*,
        videoio::{self, VideoCapture},
    };
    use std::path::Path;
    use std::time::Duration;

    fn decode_error(e: opencv::Error) -> FrameSourceError {
        FrameSourceError::Decode(e.to_string())
    }

    /// Frames decoded by OpenCV's `VideoCapture`.
    pub struct VideoCaptureSource {
        capture: VideoCapture,
        duration: Duration,
    }

    impl VideoCaptureSource {
        pub fn open(path: &Path) -> Result<Self, FrameSourceError> {
            let path_str = path
                .to_str()
                .ok_or_else(|| FrameSourceError::Unsupported(format!("non UTF-8 path {:?}", path)))?;
            let capture = VideoCapture::from_file(path_str, videoio::CAP_ANY).map_err(decode_error)?;
            if !capture.is_opened().map_err(decode_error)? {
                return Err(FrameSourceError::Decode(format!("cannot open video {:?}", path)));
            }

            let fps = capture.get(videoio::CAP_PROP_FPS).map_err(decode_error)?;
            let frame_count = capture.get(videoio::CAP_PROP_FRAME_COUNT).map_err(decode_error)?;
            let seconds = if fps > 0.0 && frame_count > 0.0 { frame_count / fps } else { 0.0 };
            log::info!("Video duration: {:.3} seconds", seconds);
            log::info!("Frame rate: {} fps", fps);

            Ok(Self {
                capture,
                duration: Duration::from_secs_f64(seconds),
            })
        }
    }

    impl FrameSource for VideoCaptureSource {
        fn duration(&self) -> Duration {
            self.duration
        }

        fn seek(&mut self, timestamp: Duration) -> Result<(), FrameSourceError> {
            self.capture
                .set(videoio::CAP_PROP_POS_MSEC, timestamp.as_secs_f64() * 1000.0)
                .map_err(decode_error)?;
            Ok(())
        }

        fn grab_frame(&mut self) -> Result<Option<Raster>, FrameSourceError> {
            let mut frame = Mat::default();
            if !self.capture.read(&mut frame).map_err(decode_error)? || frame.empty() {
                return Ok(None);
            }

            // OpenCV decodes to BGR.
            let mut rgb_frame = Mat::default();
            imgproc::cvt_color(&frame, &mut rgb_frame, imgproc::COLOR_BGR2RGB, 0).map_err(decode_error)?;
            let width = rgb_frame.cols() as u32;
            let height = rgb_frame.rows() as u32;
            let bytes = rgb_frame.data_bytes().map_err(decode_error)?.to_vec();

            let image = RgbImage::from_raw(width, height, bytes)
                .ok_or_else(|| FrameSourceError::Decode("frame buffer has unexpected size".into()))?;
            Ok(Some(Raster::try_from(&image)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_directory_is_treated_as_video() {
        let result = open(Path::new("/definitely/not/here.mp4"), 30.0);
        assert!(result.is_err());
    }

    #[test]
    fn test_directory_opens_as_sequence() {
        let directory = tempfile::tempdir().unwrap();
        let source = open(directory.path(), 10.0).unwrap();
        assert_eq!(source.duration(), std::time::Duration::ZERO);
    }
}
