// src/display.rs - On-screen preview seam

use image::RgbImage;

/// Non-blocking frame preview. Windowing backends implement this outside
/// the capture pipeline.
pub trait Display {
    fn show(&mut self, window: &str, frame: &RgbImage);
}

/// Discards frames; used for headless runs and tests.
pub struct NullDisplay;

impl Display for NullDisplay {
    fn show(&mut self, _window: &str, _frame: &RgbImage) {}
}
