// src/session.rs - Capture session state machine

/// Outcome of feeding one frame's detection result into the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First populated frame after an idle period; recording begins here.
    Started { relative_index: i64 },
    /// Populated frame while already recording.
    Recording { relative_index: i64 },
    /// First empty frame while recording; sinks must flush and close.
    Stopped,
    /// Empty frame while idle.
    Idle,
}

impl Transition {
    /// Session-relative index of the frame, when the frame is part of a
    /// recording.
    pub fn relative_index(&self) -> Option<i64> {
        match self {
            Transition::Started { relative_index } | Transition::Recording { relative_index } => {
                Some(*relative_index)
            }
            Transition::Stopped | Transition::Idle => None,
        }
    }
}

/// Tracks whether a capture session is running and rebases sensor frame
/// indices to session-relative ones.
///
/// A session becomes active on the first frame with at least one detected
/// subject (or when the operator flag is raised in manual mode) and ends on
/// the first frame without one. There is no debounce: a single empty frame
/// ends the session.
#[derive(Debug, Default)]
pub struct Session {
    active: bool,
    start_index: i64,
}

impl Session {
    pub fn new() -> Self {
        Self {
            active: false,
            start_index: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Feed one frame's observation. `subject_present` is true when the
    /// frame's extraction yielded at least one subject (or the manual flag is
    /// set); `frame_index` is the sensor's absolute frame index.
    pub fn observe(&mut self, subject_present: bool, frame_index: i64) -> Transition {
        match (self.active, subject_present) {
            (false, true) => {
                self.active = true;
                self.start_index = frame_index;
                Transition::Started { relative_index: 0 }
            }
            (true, true) => Transition::Recording {
                relative_index: frame_index - self.start_index,
            },
            (true, false) => {
                self.active = false;
                Transition::Stopped
            }
            (false, false) => Transition::Idle,
        }
    }
}
