//! Detector switching.
//!
//! Face detection is edge-triggered: the detector hears about it only when
//! the toggle changes.  Color detection is level-triggered: every tick it is
//! on, the tracker is pointed at the next palette color; switching it off
//! sends a single close.

use rover_hal::{COLOR_PALETTE, ColorTarget};

/// One command for the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionCommand {
    Face(bool),
    Color(ColorTarget),
}

/// Remembers what the detector was last told.
#[derive(Debug, Default)]
pub struct DetectionSwitch {
    face_on: bool,
    color_on: bool,
    color_index: usize,
}

impl DetectionSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands to issue this tick for the given toggles.
    pub fn step(&mut self, face_detect: bool, color_detect: bool) -> Vec<DetectionCommand> {
        let mut out = Vec::with_capacity(2);

        if face_detect != self.face_on {
            self.face_on = face_detect;
            out.push(DetectionCommand::Face(face_detect));
        }

        if color_detect {
            out.push(DetectionCommand::Color(ColorTarget::Track(
                COLOR_PALETTE[self.color_index],
            )));
            self.color_index = (self.color_index + 1) % COLOR_PALETTE.len();
            self.color_on = true;
        } else if self.color_on {
            out.push(DetectionCommand::Color(ColorTarget::Close));
            self.color_on = false;
        }

        out
    }
}
