// src/overlay.rs - Draw detected joints and bones into a color frame

use std::collections::BTreeMap;

use image::{Rgb, RgbImage};

use crate::skeleton::{JointType, BONES};

const JOINT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BONE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const JOINT_RADIUS: i32 = 3;

/// Paints one body's joints as filled circles and its bones as line
/// segments. Bones are drawn only when both endpoint joints are present.
pub fn draw_skeleton(frame: &mut RgbImage, joints: &BTreeMap<JointType, (i32, i32)>) {
    for (a, b) in BONES.iter() {
        let (Some(p1), Some(p2)) = (joints.get(a), joints.get(b)) else {
            continue;
        };
        draw_line(frame, *p1, *p2, BONE_COLOR);
    }
    for position in joints.values() {
        draw_circle(frame, *position, JOINT_RADIUS, JOINT_COLOR);
    }
}

/// Bresenham line, clipped at the frame bounds.
fn draw_line(frame: &mut RgbImage, (x0, y0): (i32, i32), (x1, y1): (i32, i32), color: Rgb<u8>) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        set_pixel(frame, x, y, color);

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

fn draw_circle(frame: &mut RgbImage, (cx, cy): (i32, i32), radius: i32, color: Rgb<u8>) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                set_pixel(frame, cx + dx, cy + dy, color);
            }
        }
    }
}

fn set_pixel(frame: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < frame.width() && (y as u32) < frame.height() {
        frame.put_pixel(x as u32, y as u32, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joints_are_painted() {
        let mut frame = RgbImage::new(32, 32);
        let mut joints = BTreeMap::new();
        joints.insert(JointType::Head, (10, 10));
        draw_skeleton(&mut frame, &joints);
        assert_eq!(*frame.get_pixel(10, 10), JOINT_COLOR);
    }

    #[test]
    fn test_bone_drawn_between_detected_endpoints() {
        let mut frame = RgbImage::new(32, 32);
        let mut joints = BTreeMap::new();
        joints.insert(JointType::Head, (4, 16));
        joints.insert(JointType::Neck, (28, 16));
        draw_skeleton(&mut frame, &joints);
        // midpoint of the head-neck bone, away from both joint circles
        assert_eq!(*frame.get_pixel(16, 16), BONE_COLOR);
    }

    #[test]
    fn test_bone_skipped_when_endpoint_missing() {
        let mut frame = RgbImage::new(32, 32);
        let mut joints = BTreeMap::new();
        joints.insert(JointType::Head, (4, 16));
        // Neck missing, so no bone should reach the midpoint.
        draw_skeleton(&mut frame, &joints);
        assert_eq!(*frame.get_pixel(16, 16), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_out_of_bounds_joint_does_not_panic() {
        let mut frame = RgbImage::new(16, 16);
        let mut joints = BTreeMap::new();
        joints.insert(JointType::Head, (-5, 40));
        joints.insert(JointType::Neck, (8, 8));
        draw_skeleton(&mut frame, &joints);
    }
}
