// src/main.rs
use anyhow::{bail, Result};
use clap::Parser;

use pose_capture::capture::CaptureController;
use pose_capture::config::{CaptureMode, Cli};
use pose_capture::display::NullDisplay;
use pose_capture::frame::PinholeMapper;
use pose_capture::pose::{OpenPoseBridge, PoseEstimator};
use pose_capture::source::{FrameSource, ReplaySource};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = cli.capture_config();
    tracing::info!(mode = ?config.mode, output = %config.output_dir.display(), "starting capture");

    let mut source: Box<dyn FrameSource> = match cli.color_video.as_deref() {
        Some(path) => Box::new(ReplaySource::open(
            path,
            cli.depth_raw.as_deref(),
            (cli.depth_width, cli.depth_height),
        )?),
        None => bail!("no frame source configured, pass --color-video to replay a take"),
    };

    let estimator: Option<Box<dyn PoseEstimator>> = match config.mode {
        CaptureMode::Pose3d => Some(Box::new(OpenPoseBridge::new()?)),
        _ => None,
    };

    let mut controller = CaptureController::new(
        &config,
        estimator,
        Box::new(PinholeMapper::default()),
        Box::new(NullDisplay),
    );

    let mut frames = 0u64;
    while let Some(bundle) = source.next_bundle()? {
        controller.on_frame(&bundle);
        frames += 1;
    }
    tracing::info!(frames, "frame stream ended");

    Ok(())
}
