// src/frame.rs - Frame bundle types delivered by a sensor source

use image::RgbImage;
use nalgebra::Vector3;

use crate::skeleton::JointType;

/// One color frame with the sensor's absolute frame index.
#[derive(Debug, Clone)]
pub struct ColorFrame {
    pub index: i64,
    pub image: RgbImage,
}

impl ColorFrame {
    pub fn is_valid(&self) -> bool {
        self.image.width() > 0 && self.image.height() > 0
    }
}

/// One depth frame, samples in millimeters, row-major. A sample of 0 means
/// the sensor had no reading at that pixel.
#[derive(Debug, Clone)]
pub struct DepthFrame {
    pub index: i64,
    pub width: u32,
    pub height: u32,
    pub samples: Vec<u16>,
}

impl DepthFrame {
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.samples.len() == (self.width * self.height) as usize
    }

    /// Bounds-checked depth lookup. Returns None for pixels outside the frame.
    pub fn sample_at(&self, x: i32, y: i32) -> Option<u16> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        self.samples
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Flattened index for a pixel known to be inside the frame.
    pub fn flat_index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }
}

/// Sensor confidence for one tracked joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingStatus {
    NotTracked,
    LowConfidence,
    Tracked,
}

impl TrackingStatus {
    pub fn code(&self) -> u8 {
        match self {
            TrackingStatus::NotTracked => 0,
            TrackingStatus::LowConfidence => 1,
            TrackingStatus::Tracked => 2,
        }
    }
}

/// One joint as reported by the sensor's body tracker, in depth-frame pixels.
#[derive(Debug, Clone)]
pub struct TrackedJoint {
    pub joint: JointType,
    pub status: TrackingStatus,
    pub x: f32,
    pub y: f32,
}

/// One tracked person in a body frame.
#[derive(Debug, Clone)]
pub struct Body {
    pub id: u8,
    pub joints: Vec<TrackedJoint>,
}

/// One body-tracking frame.
#[derive(Debug, Clone)]
pub struct BodyFrame {
    pub index: i64,
    pub width: u32,
    pub height: u32,
    pub bodies: Vec<Body>,
}

impl BodyFrame {
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// What the frame source hands over per callback. Any of the three streams
/// may be absent depending on the sensor configuration.
#[derive(Debug, Clone, Default)]
pub struct FrameBundle {
    pub color: Option<ColorFrame>,
    pub depth: Option<DepthFrame>,
    pub body: Option<BodyFrame>,
}

/// Converts a depth-frame pixel and its depth reading into world coordinates.
pub trait CoordinateMapper {
    fn depth_to_world(&self, x: f32, y: f32, depth_mm: f32) -> Vector3<f32>;
}

/// Pinhole unprojection from camera intrinsics. Output units follow the depth
/// units (millimeters).
#[derive(Debug, Clone, Copy)]
pub struct PinholeMapper {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl PinholeMapper {
    pub fn new(fx: f32, fy: f32, cx: f32, cy: f32) -> Self {
        Self { fx, fy, cx, cy }
    }
}

impl Default for PinholeMapper {
    /// Factory intrinsics for the 640x480 depth mode.
    fn default() -> Self {
        Self {
            fx: 594.21,
            fy: 591.04,
            cx: 339.5,
            cy: 242.7,
        }
    }
}

impl CoordinateMapper for PinholeMapper {
    fn depth_to_world(&self, x: f32, y: f32, depth_mm: f32) -> Vector3<f32> {
        Vector3::new(
            (x - self.cx) * depth_mm / self.fx,
            (y - self.cy) * depth_mm / self.fy,
            depth_mm,
        )
    }
}
