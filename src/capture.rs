// src/capture.rs - Capture session controller

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{CaptureConfig, CaptureMode};
use crate::display::Display;
use crate::frame::{CoordinateMapper, DepthFrame, FrameBundle, TrackingStatus};
use crate::keyboard::KeyboardControl;
use crate::overlay;
use crate::pose::PoseEstimator;
use crate::record::{body_key, Clock, FrameRecord, RecordSink, SystemClock, SINGLE_BODY_KEY};
use crate::session::{Session, Transition};
use crate::skeleton::{JointType, POSE_NECK};
use crate::smooth::smooth_depth;
use crate::video::{depth_to_gray, MjpegBackend, VideoSink};

/// Owns the session state machine, the output sinks and the per-mode frame
/// processing. One frame bundle is handled to completion before the next
/// arrives; nothing here is shared across threads except the manual capture
/// flag.
pub struct CaptureController {
    mode: CaptureMode,
    estimator: Option<Box<dyn PoseEstimator>>,
    mapper: Box<dyn CoordinateMapper>,
    display: Box<dyn Display>,
    manual_flag: Option<Arc<AtomicBool>>,
    _keyboard: Option<KeyboardControl>,
    session: Session,
    smooth_depth: bool,
    max_depth_mm: u16,
    rgb_sink: VideoSink,
    joints_sink: VideoSink,
    depth_sink: VideoSink,
    record_sink: RecordSink,
}

impl CaptureController {
    pub fn new(
        config: &CaptureConfig,
        estimator: Option<Box<dyn PoseEstimator>>,
        mapper: Box<dyn CoordinateMapper>,
        display: Box<dyn Display>,
    ) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let keyboard = matches!(config.mode, CaptureMode::Raw).then(KeyboardControl::spawn);
        let manual_flag = keyboard.as_ref().map(|keyboard| keyboard.capture_flag());
        let sink = |suffix| {
            VideoSink::new(
                &config.output_dir,
                suffix,
                config.fps,
                clock.clone(),
                Box::new(MjpegBackend),
            )
        };
        Self {
            mode: config.mode,
            estimator,
            mapper,
            display,
            manual_flag,
            _keyboard: keyboard,
            session: Session::new(),
            smooth_depth: config.smooth_depth,
            max_depth_mm: config.max_depth_mm,
            rgb_sink: sink("Rgb"),
            joints_sink: sink("RgbJoints"),
            depth_sink: sink("Depth"),
            record_sink: RecordSink::new(&config.output_dir, clock),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_active()
    }

    /// Handles one frame bundle according to the configured mode. Invalid or
    /// absent frames skip their part of the work without touching the
    /// session.
    pub fn on_frame(&mut self, bundle: &FrameBundle) {
        match self.mode {
            CaptureMode::Pose3d => self.process_pose3d(bundle),
            CaptureMode::Body3d => {
                self.process_body3d(bundle);
                self.process_rgb(bundle);
            }
            CaptureMode::Raw => {
                self.update_manual_session(bundle);
                self.process_rgb(bundle);
                self.process_depth(bundle);
            }
            CaptureMode::Overlay2d => self.process_overlay2d(bundle),
        }
    }

    fn process_pose3d(&mut self, bundle: &FrameBundle) {
        let (Some(color), Some(depth)) = (&bundle.color, &bundle.depth) else {
            return;
        };
        if !color.is_valid() || !depth.is_valid() {
            return;
        }
        let Some(estimator) = self.estimator.as_mut() else {
            return;
        };
        let detection = match estimator.detect(&color.image) {
            Ok(detection) => detection,
            Err(error) => {
                tracing::warn!(%error, "pose estimator failed, skipping frame");
                return;
            }
        };
        self.display.show("rgb with joints", &detection.annotated);

        let transition = self.session.observe(!detection.is_empty(), depth.index);
        let Some(relative_index) = transition.relative_index() else {
            if transition == Transition::Stopped {
                self.close_sinks();
            }
            return;
        };
        if matches!(transition, Transition::Started { .. }) {
            tracing::info!(start_index = depth.index, "capture session started");
        }

        self.joints_sink.write(&detection.annotated, true);
        self.rgb_sink.write(&color.image, true);

        let mut record = FrameRecord::new(relative_index);
        for (point, keypoint) in detection.keypoints.iter().enumerate() {
            let px = keypoint.x as i32;
            let py = keypoint.y as i32;
            let z = self.joint_depth(depth, px, py);
            let world = self.mapper.depth_to_world(keypoint.x, keypoint.y, f32::from(z));
            if point == POSE_NECK {
                tracing::debug!(
                    x = px,
                    y = py,
                    depth = z,
                    world_x = world.x,
                    world_y = world.y,
                    world_z = world.z,
                    "neck sample"
                );
            }
            record.insert_joint(
                SINGLE_BODY_KEY,
                point.to_string(),
                vec![
                    f64::from(px),
                    f64::from(py),
                    f64::from(z),
                    f64::from(keypoint.score),
                    f64::from(world.x),
                    f64::from(world.y),
                    f64::from(world.z),
                ],
            );
        }
        self.record_sink.write(record);
    }

    fn process_body3d(&mut self, bundle: &FrameBundle) {
        let (Some(body), Some(depth)) = (&bundle.body, &bundle.depth) else {
            return;
        };
        if !body.is_valid() || !depth.is_valid() {
            return;
        }

        let transition = self.session.observe(!body.bodies.is_empty(), body.index);
        let Some(relative_index) = transition.relative_index() else {
            if transition == Transition::Stopped {
                self.close_sinks();
            }
            return;
        };
        if matches!(transition, Transition::Started { .. }) {
            tracing::info!(start_index = body.index, "capture session started");
        }

        let mut record = FrameRecord::new(relative_index);
        for tracked in &body.bodies {
            let key = body_key(tracked.id);
            for joint in &tracked.joints {
                let px = joint.x as i32;
                let py = joint.y as i32;
                // Joints projected outside the depth frame are skipped, the
                // rest of the body still goes into the record.
                let Some(z) = depth.sample_at(px, py) else {
                    continue;
                };
                record.insert_joint(
                    &key,
                    joint.joint.code().to_string(),
                    vec![
                        f64::from(px),
                        f64::from(py),
                        f64::from(z),
                        f64::from(joint.status.code()),
                    ],
                );
            }
        }
        self.record_sink.write(record);
    }

    fn process_overlay2d(&mut self, bundle: &FrameBundle) {
        let (Some(color), Some(body)) = (&bundle.color, &bundle.body) else {
            return;
        };
        if !color.is_valid() || !body.is_valid() {
            return;
        }
        let mut annotated = color.image.clone();
        for tracked in &body.bodies {
            let joints: BTreeMap<JointType, (i32, i32)> = tracked
                .joints
                .iter()
                .filter(|joint| joint.status != TrackingStatus::NotTracked)
                .map(|joint| (joint.joint, (joint.x as i32, joint.y as i32)))
                .collect();
            overlay::draw_skeleton(&mut annotated, &joints);
        }
        self.display.show("rgb with joints", &annotated);
    }

    fn process_rgb(&mut self, bundle: &FrameBundle) {
        let Some(color) = &bundle.color else {
            return;
        };
        if !color.is_valid() {
            return;
        }
        self.rgb_sink.write(&color.image, self.session.is_active());
        self.display.show("rgb", &color.image);
    }

    fn process_depth(&mut self, bundle: &FrameBundle) {
        let Some(depth) = &bundle.depth else {
            return;
        };
        if !depth.is_valid() {
            return;
        }
        let image = depth_to_gray(depth, self.max_depth_mm);
        self.depth_sink.write(&image, self.session.is_active());
        self.display.show("depth", &image);
    }

    fn update_manual_session(&mut self, bundle: &FrameBundle) {
        let requested = self
            .manual_flag
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false);
        let index = bundle
            .color
            .as_ref()
            .map(|frame| frame.index)
            .or_else(|| bundle.depth.as_ref().map(|frame| frame.index));
        let Some(index) = index else {
            return;
        };
        match self.session.observe(requested, index) {
            Transition::Started { .. } => {
                tracing::info!(start_index = index, "manual capture started");
            }
            Transition::Stopped => self.close_sinks(),
            Transition::Recording { .. } | Transition::Idle => {}
        }
    }

    fn joint_depth(&self, depth: &DepthFrame, x: i32, y: i32) -> u16 {
        if self.smooth_depth {
            match depth.flat_index(x, y) {
                Some(idx) => smooth_depth(
                    &depth.samples,
                    idx,
                    depth.width as usize,
                    depth.height as usize,
                ),
                None => 0,
            }
        } else {
            depth.sample_at(x, y).unwrap_or(0)
        }
    }

    fn close_sinks(&mut self) {
        let mut closed = self.record_sink.close();
        closed |= self.rgb_sink.close();
        closed |= self.joints_sink.close();
        closed |= self.depth_sink.close();
        if closed {
            tracing::info!("video and joint files saved");
        }
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.close_sinks();
        if let Some(keyboard) = &self._keyboard {
            keyboard.shutdown();
        }
    }
}
