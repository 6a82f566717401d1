//! [`Horn`] – fire-and-forget sound output.
//!
//! Playback blocks for the length of the clip, so callers run
//! [`Horn::sound`] on a detached blocking task and never await it.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use rover_types::RoverError;
use tracing::debug;

/// A device that can play the horn clip.
pub trait Horn: Send + Sync {
    /// Play the horn once.  Blocks until playback finishes.
    fn sound(&self) -> Result<(), RoverError>;
}

/// Plays a sound file through an external audio player (`aplay` by default).
#[derive(Debug, Clone)]
pub struct CommandHorn {
    player: String,
    clip: PathBuf,
}

impl CommandHorn {
    /// Play `clip` with `aplay -q`.
    pub fn new(clip: impl Into<PathBuf>) -> Self {
        Self {
            player: "aplay".to_string(),
            clip: clip.into(),
        }
    }

    /// Use a different player binary (builder-style).
    pub fn with_player(mut self, player: impl Into<String>) -> Self {
        self.player = player.into();
        self
    }

    pub fn clip(&self) -> &Path {
        &self.clip
    }
}

impl Horn for CommandHorn {
    fn sound(&self) -> Result<(), RoverError> {
        if !self.clip.exists() {
            return Err(RoverError::hardware(
                "horn",
                format!("sound clip {} not found", self.clip.display()),
            ));
        }
        debug!(player = %self.player, clip = %self.clip.display(), "playing horn");
        let status = Command::new(&self.player)
            .arg("-q")
            .arg(&self.clip)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| {
                RoverError::hardware("horn", format!("failed to start {}: {e}", self.player))
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(RoverError::hardware(
                "horn",
                format!("{} exited with {status}", self.player),
            ))
        }
    }
}
