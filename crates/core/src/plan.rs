//! Plan Exchange Model
//!
//! This module defines the JSON shapes exchanged with the planning endpoint.
//! Both the create and the advance calls answer with a [`PlanResponse`].

use serde::{Deserialize, Serialize};

/// Request body sent by both the create and the advance calls.
#[derive(Serialize, Debug, Clone)]
pub struct PlanRequest {
    /// Free-text instruction, usually the user's dictation. May be empty.
    pub prompt: String,
    /// The captured frame, PNG encoded and then base64 encoded.
    pub image_base64: String,
}

/// The full response returned by the planning endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlanResponse {
    /// Stable identifier of the in-progress goal.
    pub id: String,
    pub plan: Plan,
    /// Server-rendered image highlighting the object of the first step.
    #[serde(default)]
    pub highlight_image_base64: Option<String>,
    /// Generated preview image; carried through but not displayed.
    #[serde(default)]
    pub banana_image_base64: Option<String>,
}

/// A goal broken down into objects found in the scene and ordered steps.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Plan {
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub objects: Vec<PlanObject>,
    pub steps: Vec<PlanStep>,
}

/// An object detected in the frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlanObject {
    pub label: String,
    /// Pixel box as `[ymin, xmin, ymax, xmax]`, or `None` when the object is not visible.
    #[serde(default)]
    pub box_2d: Option<[i32; 4]>,
}

/// A single instruction referencing an object by label.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlanStep {
    pub text: String,
    #[serde(default)]
    pub object_label: String,
    /// Optional path for moving the object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trajectory: Option<Vec<TrajectoryPoint>>,
}

/// A waypoint expressed as `[y, x]`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryPoint {
    pub point: [i32; 2],
}

impl Plan {
    /// The instruction the user should follow next.
    pub fn first_step(&self) -> Option<&PlanStep> {
        self.steps.first()
    }

    /// Returns `true` once every step has been consumed.
    pub fn is_complete(&self) -> bool {
        self.steps.is_empty()
    }

    /// Finds the object a step refers to.
    ///
    /// Labels are compared trimmed and case-insensitively. A step with a blank
    /// label never matches.
    pub fn object_for(&self, step: &PlanStep) -> Option<&PlanObject> {
        let target = step.object_label.trim().to_lowercase();
        if target.is_empty() {
            return None;
        }
        self.objects
            .iter()
            .find(|obj| obj.label.trim().to_lowercase() == target)
    }
}

impl PlanObject {
    /// Width and height of the bounding box in pixels, if the object is visible.
    pub fn box_size(&self) -> Option<(i32, i32)> {
        self.box_2d
            .map(|[ymin, xmin, ymax, xmax]| ((xmax - xmin).max(0), (ymax - ymin).max(0)))
    }
}
