// src/video.rs - Video sinks backed by an ffmpeg encoder process

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;

use image::{Rgb, RgbImage};
use thiserror::Error;

use crate::frame::DepthFrame;
use crate::record::{timestamp_name, Clock};

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to launch ffmpeg: {0}")]
    Spawn(std::io::Error),
    #[error("ffmpeg stdin unavailable")]
    NoStdin,
    #[error("failed to write frame: {0}")]
    Write(std::io::Error),
    #[error("ffmpeg exited with {0}")]
    Exit(std::process::ExitStatus),
    #[error("failed to wait for ffmpeg: {0}")]
    Wait(std::io::Error),
}

/// An open encoder accepting RGB frames of a fixed size.
pub trait FrameEncoder {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), EncodeError>;
    fn finish(self: Box<Self>) -> Result<(), EncodeError>;
}

/// Opens encoders on demand. The sink holds a backend rather than a process
/// so lifecycle tests can swap in an in-memory fake.
pub trait EncoderBackend {
    fn open(
        &self,
        path: &Path,
        fps: u32,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn FrameEncoder>, EncodeError>;
}

/// Motion-JPEG encoder fed raw RGB frames over the child's stdin.
pub struct MjpegBackend;

impl EncoderBackend for MjpegBackend {
    fn open(
        &self,
        path: &Path,
        fps: u32,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn FrameEncoder>, EncodeError> {
        let mut child = Command::new("ffmpeg")
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-y",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-s",
                &format!("{width}x{height}"),
                "-r",
                &fps.to_string(),
                "-i",
                "-",
                "-c:v",
                "mjpeg",
                "-q:v",
                "3",
            ])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(EncodeError::Spawn)?;

        let stdin = child.stdin.take().ok_or(EncodeError::NoStdin)?;
        Ok(Box::new(FfmpegEncoder {
            child,
            stdin: Some(stdin),
        }))
    }
}

struct FfmpegEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl FrameEncoder for FfmpegEncoder {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), EncodeError> {
        let stdin = self.stdin.as_mut().ok_or(EncodeError::NoStdin)?;
        stdin.write_all(frame.as_raw()).map_err(EncodeError::Write)
    }

    fn finish(mut self: Box<Self>) -> Result<(), EncodeError> {
        // Dropping stdin signals EOF so ffmpeg finalizes the container.
        drop(self.stdin.take());
        let status = self.child.wait().map_err(EncodeError::Wait)?;
        if status.success() {
            Ok(())
        } else {
            Err(EncodeError::Exit(status))
        }
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if self.stdin.take().is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// One video output with the shared sink lifecycle: lazily opened on the
/// first frame of a valid session (file named from the wall clock plus the
/// kind suffix), written while the session holds, closed as soon as it does
/// not. A failed open leaves the sink closed and frames drop silently.
pub struct VideoSink {
    output_dir: PathBuf,
    suffix: &'static str,
    fps: u32,
    clock: Arc<dyn Clock>,
    backend: Box<dyn EncoderBackend>,
    encoder: Option<Box<dyn FrameEncoder>>,
}

impl VideoSink {
    pub fn new(
        output_dir: impl AsRef<Path>,
        suffix: &'static str,
        fps: u32,
        clock: Arc<dyn Clock>,
        backend: Box<dyn EncoderBackend>,
    ) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            suffix,
            fps,
            clock,
            backend,
            encoder: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.encoder.is_some()
    }

    /// Applies the sink policy for one frame. `session_valid` is the current
    /// session state; an open sink seeing an invalid session closes without
    /// writing.
    pub fn write(&mut self, frame: &RgbImage, session_valid: bool) {
        match (self.is_open(), session_valid) {
            (true, false) => {
                self.close();
            }
            (true, true) => {
                if let Some(encoder) = self.encoder.as_mut() {
                    if let Err(error) = encoder.write_frame(frame) {
                        tracing::warn!(%error, suffix = self.suffix, "dropping video frame");
                    }
                }
            }
            (false, true) => {
                if self.open(frame.width(), frame.height()) {
                    self.write(frame, true);
                }
            }
            (false, false) => {}
        }
    }

    /// Finishes the encoder if one is open. No-op otherwise.
    pub fn close(&mut self) -> bool {
        let Some(encoder) = self.encoder.take() else {
            return false;
        };
        if let Err(error) = encoder.finish() {
            tracing::warn!(%error, suffix = self.suffix, "video encoder failed on close");
        }
        true
    }

    fn open(&mut self, width: u32, height: u32) -> bool {
        if let Err(error) = std::fs::create_dir_all(&self.output_dir) {
            tracing::warn!(%error, dir = %self.output_dir.display(), "cannot create output directory");
            return false;
        }
        let path = self.output_dir.join(format!(
            "{}{}.avi",
            timestamp_name(self.clock.as_ref()),
            self.suffix
        ));
        match self.backend.open(&path, self.fps, width, height) {
            Ok(encoder) => {
                tracing::info!(path = %path.display(), "created video file");
                self.encoder = Some(encoder);
                true
            }
            Err(error) => {
                tracing::warn!(%error, path = %path.display(), "cannot open video encoder");
                false
            }
        }
    }
}

impl Drop for VideoSink {
    fn drop(&mut self) {
        self.close();
    }
}

/// Tone-maps a depth frame to 8-bit gray for encoding, scaling by the
/// configured maximum range. Zero stays black (no reading).
pub fn depth_to_gray(frame: &DepthFrame, max_depth_mm: u16) -> RgbImage {
    let max = u32::from(max_depth_mm.max(1));
    RgbImage::from_fn(frame.width, frame.height, |x, y| {
        let sample = frame.samples[y as usize * frame.width as usize + x as usize];
        let level = (u32::from(sample.min(max_depth_mm)) * 255 / max) as u8;
        Rgb([level, level, level])
    })
}

#[cfg(test)]
pub(crate) mod test_backend {
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use image::RgbImage;

    use super::{EncodeError, EncoderBackend, FrameEncoder};

    #[derive(Debug, PartialEq, Eq)]
    pub enum Event {
        Opened(PathBuf),
        Frame,
        Finished,
    }

    /// Records sink activity instead of launching ffmpeg.
    #[derive(Clone, Default)]
    pub struct RecordingBackend {
        pub events: Arc<Mutex<Vec<Event>>>,
    }

    impl EncoderBackend for RecordingBackend {
        fn open(
            &self,
            path: &Path,
            _fps: u32,
            _width: u32,
            _height: u32,
        ) -> Result<Box<dyn FrameEncoder>, EncodeError> {
            self.events
                .lock()
                .unwrap()
                .push(Event::Opened(path.to_path_buf()));
            Ok(Box::new(RecordingEncoder {
                events: self.events.clone(),
            }))
        }
    }

    struct RecordingEncoder {
        events: Arc<Mutex<Vec<Event>>>,
    }

    impl FrameEncoder for RecordingEncoder {
        fn write_frame(&mut self, _frame: &RgbImage) -> Result<(), EncodeError> {
            self.events.lock().unwrap().push(Event::Frame);
            Ok(())
        }

        fn finish(self: Box<Self>) -> Result<(), EncodeError> {
            self.events.lock().unwrap().push(Event::Finished);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::test_backend::{Event, RecordingBackend};
    use super::*;
    use crate::record::test_clock::TickingClock;

    fn sink_with_backend(dir: &Path, backend: RecordingBackend) -> VideoSink {
        VideoSink::new(
            dir,
            "Rgb",
            15,
            Arc::new(TickingClock::new()),
            Box::new(backend),
        )
    }

    #[test]
    fn test_opens_lazily_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RecordingBackend::default();
        let events = backend.events.clone();
        let mut sink = sink_with_backend(dir.path(), backend);

        let frame = RgbImage::new(4, 4);
        assert!(!sink.is_open());
        sink.write(&frame, true);
        sink.write(&frame, true);
        assert!(sink.is_open());

        let events = events.lock().unwrap();
        assert!(matches!(events[0], Event::Opened(_)));
        assert_eq!(events[1], Event::Frame);
        assert_eq!(events[2], Event::Frame);
    }

    #[test]
    fn test_invalid_session_closes_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RecordingBackend::default();
        let events = backend.events.clone();
        let mut sink = sink_with_backend(dir.path(), backend);

        let frame = RgbImage::new(4, 4);
        sink.write(&frame, true);
        sink.write(&frame, false);
        assert!(!sink.is_open());

        let events = events.lock().unwrap();
        assert_eq!(
            events
                .iter()
                .filter(|event| matches!(event, Event::Frame))
                .count(),
            1
        );
        assert_eq!(*events.last().unwrap(), Event::Finished);
    }

    #[test]
    fn test_closed_sink_ignores_invalid_session() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RecordingBackend::default();
        let events = backend.events.clone();
        let mut sink = sink_with_backend(dir.path(), backend);

        sink.write(&RgbImage::new(4, 4), false);
        assert!(!sink.is_open());
        assert!(events.lock().unwrap().is_empty());
        assert!(!sink.close());
    }

    #[test]
    fn test_reopen_uses_a_fresh_timestamped_name() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RecordingBackend::default();
        let events = backend.events.clone();
        let mut sink = sink_with_backend(dir.path(), backend);

        let frame = RgbImage::new(4, 4);
        sink.write(&frame, true);
        sink.close();
        sink.write(&frame, true);

        let events = events.lock().unwrap();
        let opened: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                Event::Opened(path) => Some(path.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(opened.len(), 2);
        assert_ne!(opened[0], opened[1]);
        assert!(opened[0].to_string_lossy().ends_with("Rgb.avi"));
    }

    #[test]
    fn test_depth_tone_mapping_scales_to_gray() {
        let frame = DepthFrame {
            index: 0,
            width: 2,
            height: 1,
            samples: vec![0, 4500],
        };
        let image = depth_to_gray(&frame, 4500);
        assert_eq!(*image.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(1, 0), Rgb([255, 255, 255]));
    }
}
