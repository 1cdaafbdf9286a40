//! Guided-task client core.
//!
//! A snapshot of the scene is sent to a remote planner, which answers with a
//! step-by-step plan and a highlight image. [`client`] talks to the planner,
//! [`orchestrator`] runs those requests alongside the host's frame loop and
//! [`session`] holds what the host displays.

pub mod client;
pub mod collaborators;
pub mod frame;
pub mod orchestrator;
pub mod plan;
pub mod session;

pub use client::{ClientError, CreatedPlan, HttpPlanClient, PlanClient, PlanOutcome};
pub use orchestrator::{Completion, Dispatch, Orchestrator, OrchestratorSettings, OverlapPolicy};
pub use session::SessionState;
