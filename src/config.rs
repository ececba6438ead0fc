// src/config.rs - CLI arguments and the capture configuration

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Per-frame processing strategy, fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CaptureMode {
    /// External pose estimator on the color frame, joints lifted to 3D via
    /// depth lookup; records both videos and a joint file.
    Pose3d,
    /// Sensor-native 3D joints keyed by body id; records the joint file and
    /// the raw RGB video.
    Body3d,
    /// Raw RGB and depth capture, started and stopped from the keyboard.
    Raw,
    /// Sensor-native 2D joints drawn over the color frame, display only.
    Overlay2d,
}

#[derive(Debug, Parser)]
#[command(name = "pose_capture", about = "Depth-camera capture and joint recording tool")]
pub struct Cli {
    /// Processing mode.
    #[arg(long, value_enum, default_value = "pose3d")]
    pub mode: CaptureMode,

    /// Directory receiving video and joint record files.
    #[arg(long, default_value = "./output")]
    pub output_dir: PathBuf,

    /// Frame rate written into the video containers.
    #[arg(long, default_value_t = 15)]
    pub fps: u32,

    /// Apply the 5-point neighborhood average to joint depth lookups.
    #[arg(long)]
    pub smooth_depth: bool,

    /// Depth value mapped to white in the depth video.
    #[arg(long, default_value_t = 4500)]
    pub max_depth_mm: u16,

    /// Color video to replay instead of a live sensor.
    #[arg(long)]
    pub color_video: Option<PathBuf>,

    /// Raw little-endian u16 depth dump replayed alongside the color video.
    #[arg(long, requires = "color_video")]
    pub depth_raw: Option<PathBuf>,

    /// Depth frame width of the raw dump.
    #[arg(long, default_value_t = 640)]
    pub depth_width: u32,

    /// Depth frame height of the raw dump.
    #[arg(long, default_value_t = 480)]
    pub depth_height: u32,
}

/// The subset of the CLI the controller needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub mode: CaptureMode,
    pub output_dir: PathBuf,
    pub fps: u32,
    pub smooth_depth: bool,
    pub max_depth_mm: u16,
}

impl Cli {
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            mode: self.mode,
            output_dir: self.output_dir.clone(),
            fps: self.fps,
            smooth_depth: self.smooth_depth,
            max_depth_mm: self.max_depth_mm,
        }
    }
}
