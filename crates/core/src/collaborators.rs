//! Interfaces to the host's camera and speech output.

use crate::frame::Frame;

/// A passthrough camera the orchestrator can snapshot.
pub trait Camera {
    /// Whether the user granted camera access.
    fn has_permission(&self) -> bool;

    /// Whether frames are currently being delivered.
    fn is_playing(&self) -> bool;

    /// Current frame size as `(width, height)`.
    fn resolution(&self) -> (u32, u32);

    /// Raw RGBA32 pixels of the current frame.
    fn colors(&self) -> Vec<u8>;

    /// Captures the current frame.
    fn snapshot(&self) -> Frame {
        let (width, height) = self.resolution();
        Frame::new(width, height, self.colors())
    }
}

/// Text-to-speech output.
pub trait Speaker {
    fn speak(&self, utterance: &str);
}

/// A speaker that stays silent.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mute;

impl Speaker for Mute {
    fn speak(&self, _utterance: &str) {}
}
