// src/keyboard.rs - Operator start/stop control for manual capture

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

const KEY_START: u8 = b' ';
const KEY_STOP: u8 = b's';

/// Polls stdin from a detached thread and mirrors the operator's intent in
/// an atomic flag: space starts capture, `s` stops it, everything else is
/// ignored. The thread is never joined; clearing the alive flag ends its
/// loop cooperatively and a stale read costs at most one frame of delay.
pub struct KeyboardControl {
    capture_on: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
}

impl KeyboardControl {
    pub fn spawn() -> Self {
        let capture_on = Arc::new(AtomicBool::new(false));
        let alive = Arc::new(AtomicBool::new(true));
        {
            let capture_on = capture_on.clone();
            let alive = alive.clone();
            thread::spawn(move || poll_keys(&capture_on, &alive));
        }
        tracing::info!("keyboard control active: space starts capture, 's' stops it");
        Self { capture_on, alive }
    }

    pub fn capture_requested(&self) -> bool {
        self.capture_on.load(Ordering::Relaxed)
    }

    /// Shared handle to the capture flag for the frame-processing side.
    pub fn capture_flag(&self) -> Arc<AtomicBool> {
        self.capture_on.clone()
    }

    pub fn shutdown(&self) {
        self.alive.store(false, Ordering::Relaxed);
    }
}

impl Drop for KeyboardControl {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn poll_keys(capture_on: &AtomicBool, alive: &AtomicBool) {
    let stdin = std::io::stdin();
    for byte in stdin.lock().bytes() {
        if !alive.load(Ordering::Relaxed) {
            break;
        }
        match byte {
            Ok(key) => apply_key(key, capture_on),
            Err(_) => break,
        }
    }
}

fn apply_key(key: u8, capture_on: &AtomicBool) {
    match key {
        KEY_START => capture_on.store(true, Ordering::Relaxed),
        KEY_STOP => capture_on.store(false, Ordering::Relaxed),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_starts_and_s_stops() {
        let flag = AtomicBool::new(false);
        apply_key(b' ', &flag);
        assert!(flag.load(Ordering::Relaxed));
        apply_key(b's', &flag);
        assert!(!flag.load(Ordering::Relaxed));
    }

    #[test]
    fn test_other_keys_are_ignored() {
        let flag = AtomicBool::new(true);
        apply_key(b'x', &flag);
        apply_key(b'\n', &flag);
        assert!(flag.load(Ordering::Relaxed));

        let flag = AtomicBool::new(false);
        apply_key(b'q', &flag);
        assert!(!flag.load(Ordering::Relaxed));
    }
}
