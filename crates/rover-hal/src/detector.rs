//! [`Detector`] – the vision pipeline's control knobs and its last result.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rover_types::{DetectionTarget, RoverError};

/// Colors the detector is cycled through while color detection is on.
pub const COLOR_PALETTE: [&str; 6] = ["red", "green", "blue", "yellow", "orange", "purple"];

/// What the color tracker should look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorTarget {
    /// Track objects of the named palette color.
    Track(&'static str),
    /// Switch color tracking off.
    Close,
}

impl fmt::Display for ColorTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorTarget::Track(name) => f.write_str(name),
            ColorTarget::Close => f.write_str("close"),
        }
    }
}

/// Object-detection pipeline.
pub trait Detector: Send {
    /// Turn face detection on or off.
    fn set_face_detection(&mut self, enabled: bool) -> Result<(), RoverError>;

    /// Select the color to track, or close the color tracker.
    fn set_color_target(&mut self, target: ColorTarget) -> Result<(), RoverError>;

    /// The most recently published detection.  No freshness guarantee.
    fn last_detection(&self) -> Result<DetectionTarget, RoverError>;
}

/// A detector shared between the control loop and shutdown code.
pub type SharedDetector = Arc<Mutex<Box<dyn Detector>>>;

/// Wrap a detector for sharing across tasks.
pub fn shared(detector: impl Detector + 'static) -> SharedDetector {
    Arc::new(Mutex::new(Box::new(detector)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_target_display_matches_wire_names() {
        assert_eq!(ColorTarget::Track("red").to_string(), "red");
        assert_eq!(ColorTarget::Close.to_string(), "close");
    }

    #[test]
    fn palette_order_is_fixed() {
        assert_eq!(COLOR_PALETTE.first(), Some(&"red"));
        assert_eq!(COLOR_PALETTE.last(), Some(&"purple"));
        assert_eq!(COLOR_PALETTE.len(), 6);
    }
}
