// src/pose.rs - External pose estimator seam

use anyhow::Result;
use image::RgbImage;

use crate::skeleton::POSE_POINT_COUNT;

/// One estimated keypoint in color-frame pixels with its detection score.
#[derive(Debug, Clone, Copy)]
pub struct PoseKeypoint {
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

/// Result of running the estimator over one color frame: the frame with
/// joints painted on, plus the keypoint set. `keypoints` is empty when no
/// person was detected, otherwise it covers the full fixed topology.
#[derive(Debug, Clone)]
pub struct PoseDetection {
    pub annotated: RgbImage,
    pub keypoints: Vec<PoseKeypoint>,
}

impl PoseDetection {
    pub fn nobody(frame: &RgbImage) -> Self {
        Self {
            annotated: frame.clone(),
            keypoints: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Contract for the pose estimation library. Implementations receive an
/// 8-bit RGB frame and return an annotated copy plus keypoints over the
/// fixed 18-point topology.
pub trait PoseEstimator {
    fn detect(&mut self, frame: &RgbImage) -> Result<PoseDetection>;
}

/// Bridge to the out-of-process estimator. Stub version: reports no
/// detections until the inference backend is attached, so detection-driven
/// capture stays idle.
pub struct OpenPoseBridge;

impl OpenPoseBridge {
    pub fn new() -> Result<Self> {
        tracing::warn!("pose estimator backend not attached, no subjects will be detected");
        Ok(Self)
    }
}

impl PoseEstimator for OpenPoseBridge {
    fn detect(&mut self, frame: &RgbImage) -> Result<PoseDetection> {
        Ok(PoseDetection::nobody(frame))
    }
}

/// Replays a scripted sequence of keypoint sets, one per frame. Used by the
/// pipeline tests and handy for dry runs without the estimator installed.
pub struct ScriptedEstimator {
    frames: std::collections::VecDeque<Vec<PoseKeypoint>>,
}

impl ScriptedEstimator {
    pub fn new(frames: Vec<Vec<PoseKeypoint>>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    /// A full topology of identical keypoints at the given pixel.
    pub fn uniform_detection(x: f32, y: f32, score: f32) -> Vec<PoseKeypoint> {
        vec![PoseKeypoint { x, y, score }; POSE_POINT_COUNT]
    }
}

impl PoseEstimator for ScriptedEstimator {
    fn detect(&mut self, frame: &RgbImage) -> Result<PoseDetection> {
        let keypoints = self.frames.pop_front().unwrap_or_default();
        Ok(PoseDetection {
            annotated: frame.clone(),
            keypoints,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_estimator_replays_then_goes_quiet() {
        let mut estimator = ScriptedEstimator::new(vec![
            ScriptedEstimator::uniform_detection(10.0, 20.0, 0.9),
            Vec::new(),
        ]);
        let frame = RgbImage::new(4, 4);

        let first = estimator.detect(&frame).unwrap();
        assert_eq!(first.keypoints.len(), POSE_POINT_COUNT);
        assert!(estimator.detect(&frame).unwrap().is_empty());
        assert!(estimator.detect(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_stub_bridge_detects_nobody() {
        let mut bridge = OpenPoseBridge::new().unwrap();
        let frame = RgbImage::new(8, 8);
        let detection = bridge.detect(&frame).unwrap();
        assert!(detection.is_empty());
        assert_eq!(detection.annotated.dimensions(), frame.dimensions());
    }
}
