//! Guided Session State
//!
//! Everything the host displays or remembers between requests lives in
//! [`SessionState`]. The orchestrator receives it by exclusive reference on
//! every call, so the tick loop is its only writer.

use crate::frame::{Frame, HighlightImage};
use crate::plan::Plan;

pub const NO_PERMISSION_MESSAGE: &str = "No permission granted.";
pub const START_MESSAGE: &str = "Press A to start your guided task.";
pub const WAITING_MESSAGE: &str = "Waiting...";
pub const NEXT_STEP_MESSAGE: &str = "Press B once you are ready for next step..";
pub const COMPLETED_MESSAGE: &str = "You've completed all steps. Press A to start again.";

/// What the display surface should currently show.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DisplayImage {
    /// Nothing has been shown yet.
    #[default]
    Blank,
    /// The live camera feed.
    Live,
    /// The still frame captured for the outstanding request.
    Snapshot(Frame),
    /// The image returned by the planner.
    Highlight(HighlightImage),
}

/// Dictated prompt text. Reading it empties it, so a prompt is sent at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictation {
    text: String,
}

impl Dictation {
    /// Replaces the pending dictation.
    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Appends a fragment, separated by a space.
    pub fn append(&mut self, fragment: &str) {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(fragment);
    }

    pub fn peek(&self) -> &str {
        &self.text
    }

    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }
}

/// State of one guided-task session.
#[derive(Debug, Clone)]
pub struct SessionState {
    plan_id: Option<String>,
    pub dictation: Dictation,
    display_text: String,
    display_image: DisplayImage,
    plan: Option<Plan>,
    revision: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            plan_id: None,
            dictation: Dictation::default(),
            display_text: NO_PERMISSION_MESSAGE.to_string(),
            display_image: DisplayImage::Blank,
            plan: None,
            revision: 0,
        }
    }

    /// Id of the active goal; `None` until a plan has been created.
    pub fn plan_id(&self) -> Option<&str> {
        self.plan_id.as_deref()
    }

    pub fn display_text(&self) -> &str {
        &self.display_text
    }

    pub fn display_image(&self) -> &DisplayImage {
        &self.display_image
    }

    /// The most recently received plan.
    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    /// Increases whenever display text or image change. Lets a display sink
    /// redraw only when needed.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn set_plan_id(&mut self, plan_id: String) {
        self.plan_id = Some(plan_id);
    }

    pub(crate) fn set_plan(&mut self, plan: Plan) {
        self.plan = Some(plan);
    }

    pub(crate) fn show_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text != self.display_text {
            self.display_text = text;
            self.revision += 1;
        }
    }

    pub(crate) fn show_image(&mut self, image: DisplayImage) {
        if image != self.display_image {
            self.display_image = image;
            self.revision += 1;
        }
    }
}
