// src/source.rs - Frame acquisition seam and the file-replay source

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use image::RgbImage;
use thiserror::Error;

use crate::frame::{ColorFrame, DepthFrame, FrameBundle};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("ffprobe failed: {0}")]
    Probe(String),
    #[error("failed to launch ffmpeg: {0}")]
    Spawn(std::io::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Delivers frame bundles until the stream ends. The sensor-SDK-backed
/// implementation lives outside this crate behind the same trait.
pub trait FrameSource {
    fn next_bundle(&mut self) -> Result<Option<FrameBundle>, SourceError>;
}

/// Replays a recorded take: color frames decoded from a video file through
/// an ffmpeg rawvideo pipe, and optionally depth frames streamed from a raw
/// little-endian u16 dump of the same length. Lets the whole pipeline run
/// without sensor hardware.
pub struct ReplaySource {
    decoder: ColorDecoder,
    depth: Option<DepthReplay>,
    next_index: i64,
}

impl ReplaySource {
    pub fn open(
        color_video: &Path,
        depth_raw: Option<&Path>,
        depth_size: (u32, u32),
    ) -> Result<Self, SourceError> {
        let decoder = ColorDecoder::open(color_video)?;
        let depth = match depth_raw {
            Some(path) => Some(DepthReplay::open(path, depth_size.0, depth_size.1)?),
            None => None,
        };
        Ok(Self {
            decoder,
            depth,
            next_index: 0,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.decoder.width, self.decoder.height)
    }
}

impl FrameSource for ReplaySource {
    fn next_bundle(&mut self) -> Result<Option<FrameBundle>, SourceError> {
        let index = self.next_index;
        let Some(image) = self.decoder.read_frame()? else {
            return Ok(None);
        };
        let depth = match self.depth.as_mut() {
            Some(replay) => replay.read_frame(index)?,
            None => None,
        };
        self.next_index += 1;
        Ok(Some(FrameBundle {
            color: Some(ColorFrame { index, image }),
            depth,
            body: None,
        }))
    }
}

struct ColorDecoder {
    child: Child,
    stdout: BufReader<ChildStdout>,
    width: u32,
    height: u32,
    frame_size: usize,
}

impl ColorDecoder {
    fn open(path: &Path) -> Result<Self, SourceError> {
        let (width, height) = probe_dimensions(path)?;
        let mut child = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(SourceError::Spawn)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::Probe("ffmpeg stdout unavailable".to_string()))?;
        let frame_size = (width * height * 3) as usize;
        tracing::info!(path = %path.display(), width, height, "replaying color video");
        Ok(Self {
            child,
            stdout: BufReader::with_capacity(frame_size * 2, stdout),
            width,
            height,
            frame_size,
        })
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>, SourceError> {
        let mut buffer = vec![0u8; self.frame_size];
        match self.stdout.read_exact(&mut buffer) {
            Ok(()) => Ok(RgbImage::from_raw(self.width, self.height, buffer)),
            Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(error) => Err(SourceError::Io(error)),
        }
    }
}

impl Drop for ColorDecoder {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn probe_dimensions(path: &Path) -> Result<(u32, u32), SourceError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=p=0",
        ])
        .arg(path)
        .output()
        .map_err(SourceError::Spawn)?;
    if !output.status.success() {
        return Err(SourceError::Probe(
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }
    let text = String::from_utf8_lossy(&output.stdout);
    let mut parts = text.trim().split(',');
    let width = parts
        .next()
        .and_then(|part| part.trim().parse().ok())
        .ok_or_else(|| SourceError::Probe(format!("unexpected ffprobe output: {text}")))?;
    let height = parts
        .next()
        .and_then(|part| part.trim().parse().ok())
        .ok_or_else(|| SourceError::Probe(format!("unexpected ffprobe output: {text}")))?;
    Ok((width, height))
}

struct DepthReplay {
    reader: BufReader<File>,
    width: u32,
    height: u32,
    exhausted: bool,
}

impl DepthReplay {
    fn open(path: &Path, width: u32, height: u32) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        tracing::info!(path = %path.display(), width, height, "replaying depth frames");
        Ok(Self {
            reader: BufReader::new(file),
            width,
            height,
            exhausted: false,
        })
    }

    fn read_frame(&mut self, index: i64) -> Result<Option<DepthFrame>, SourceError> {
        if self.exhausted {
            return Ok(None);
        }
        let count = (self.width * self.height) as usize;
        let mut raw = vec![0u8; count * 2];
        match self.reader.read_exact(&mut raw) {
            Ok(()) => {
                let samples = raw
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                Ok(Some(DepthFrame {
                    index,
                    width: self.width,
                    height: self.height,
                    samples,
                }))
            }
            Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => {
                // Depth dump shorter than the color take; keep serving color.
                self.exhausted = true;
                Ok(None)
            }
            Err(error) => Err(SourceError::Io(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_depth_replay_decodes_little_endian_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depth.raw");
        let mut file = File::create(&path).unwrap();
        // two 2x1 frames
        file.write_all(&500u16.to_le_bytes()).unwrap();
        file.write_all(&0u16.to_le_bytes()).unwrap();
        file.write_all(&1200u16.to_le_bytes()).unwrap();
        file.write_all(&900u16.to_le_bytes()).unwrap();
        drop(file);

        let mut replay = DepthReplay::open(&path, 2, 1).unwrap();
        let first = replay.read_frame(0).unwrap().unwrap();
        assert_eq!(first.samples, vec![500, 0]);
        assert!(first.is_valid());
        let second = replay.read_frame(1).unwrap().unwrap();
        assert_eq!(second.samples, vec![1200, 900]);
        assert!(replay.read_frame(2).unwrap().is_none());
    }

    #[test]
    fn test_depth_replay_stops_on_truncated_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depth.raw");
        let mut file = File::create(&path).unwrap();
        file.write_all(&[0x10]).unwrap();
        drop(file);

        let mut replay = DepthReplay::open(&path, 2, 1).unwrap();
        assert!(replay.read_frame(0).unwrap().is_none());
        assert!(replay.read_frame(1).unwrap().is_none());
    }
}
