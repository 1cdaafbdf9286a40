//! Request Orchestrator
//!
//! Bridges the host's frame-ticked loop with the background plan request.
//! A snapshot request captures a frame, spawns the network call on the tokio
//! runtime and returns immediately. Each [`Orchestrator::tick`] then polls the
//! completion channel without blocking and, once the reply has arrived,
//! writes the outcome into the [`SessionState`].
//!
//! At most one request is in flight. A second snapshot either replaces the
//! outstanding request or is rejected, depending on [`OverlapPolicy`].

use crate::client::{ClientError, PlanClient, PlanOutcome};
use crate::collaborators::{Camera, Mute, Speaker};
use crate::session::{
    COMPLETED_MESSAGE, DisplayImage, NEXT_STEP_MESSAGE, NO_PERMISSION_MESSAGE, START_MESSAGE,
    SessionState, WAITING_MESSAGE,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// What to do with a snapshot request while another one is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Abort the outstanding request and send the new one.
    #[default]
    Replace,
    /// Keep the outstanding request and drop the new one.
    Reject,
}

impl FromStr for OverlapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "replace" => Ok(OverlapPolicy::Replace),
            "reject" => Ok(OverlapPolicy::Reject),
            other => Err(format!("'{}' is not one of 'replace', 'reject'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Upper bound for a single plan request.
    pub request_timeout: Duration,
    pub overlap: OverlapPolicy,
    /// Read each new step aloud through the [`Speaker`].
    pub speak_steps: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            overlap: OverlapPolicy::Replace,
            speak_steps: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Start a new goal.
    Create,
    /// Move an existing goal to its next step.
    Advance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Camera permission has not been granted yet.
    AwaitingPermission,
    Idle,
    Awaiting(RequestKind),
}

/// Immediate result of a snapshot request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Sent(RequestKind),
    /// Sent after aborting the request that was outstanding.
    Replaced(RequestKind),
    /// Another request is outstanding and the policy is [`OverlapPolicy::Reject`].
    Busy,
    /// Camera permission has not been granted yet.
    NoPermission,
    CameraNotReady,
    /// An advance was requested before any plan was created.
    NoActivePlan,
    SnapshotFailed,
}

/// How a request ended, as observed by [`Orchestrator::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// A highlight image arrived and the plan has a next step.
    NextStep(String),
    /// No steps remain, or no highlight image came back.
    AllStepsComplete,
    /// The request failed; the message describes why.
    Failed(String),
}

type Reply = Result<(Option<String>, PlanOutcome), ClientError>;

struct InFlight {
    kind: RequestKind,
    reply: oneshot::Receiver<Reply>,
    task: JoinHandle<()>,
}

pub struct Orchestrator {
    client: Arc<dyn PlanClient>,
    runtime: Handle,
    settings: OrchestratorSettings,
    speaker: Box<dyn Speaker + Send>,
    phase: Phase,
    in_flight: Option<InFlight>,
    resume_requested: bool,
}

impl Orchestrator {
    /// Creates an orchestrator that spawns its requests on `runtime`.
    pub fn new(client: Arc<dyn PlanClient>, runtime: Handle, settings: OrchestratorSettings) -> Self {
        Self {
            client,
            runtime,
            settings,
            speaker: Box::new(Mute),
            phase: Phase::AwaitingPermission,
            in_flight: None,
            resume_requested: false,
        }
    }

    pub fn with_speaker(mut self, speaker: Box<dyn Speaker + Send>) -> Self {
        self.speaker = speaker;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_awaiting(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Snapshots the scene and asks the planner for a new goal.
    pub fn start_goal(&mut self, session: &mut SessionState, camera: &dyn Camera) -> Dispatch {
        self.dispatch(RequestKind::Create, session, camera)
    }

    /// Snapshots the scene and asks the planner for the next step of the active goal.
    pub fn next_step(&mut self, session: &mut SessionState, camera: &dyn Camera) -> Dispatch {
        self.dispatch(RequestKind::Advance, session, camera)
    }

    /// Switches the display back to the live feed once the camera plays.
    pub fn resume_streaming(&mut self) {
        self.resume_requested = true;
    }

    /// Aborts the outstanding request, if any, and puts the idle prompt back
    /// on screen. Returns whether a request was aborted.
    pub fn cancel(&mut self, session: &mut SessionState) -> bool {
        if !self.abort_in_flight() {
            return false;
        }
        if session.plan_id().is_some() {
            session.show_text(NEXT_STEP_MESSAGE);
        } else {
            session.show_text(START_MESSAGE);
        }
        self.resume_requested = true;
        true
    }

    fn abort_in_flight(&mut self) -> bool {
        match self.in_flight.take() {
            Some(in_flight) => {
                in_flight.task.abort();
                info!(kind = ?in_flight.kind, "Cancelled outstanding plan request");
                self.phase = Phase::Idle;
                true
            }
            None => false,
        }
    }

    fn dispatch(
        &mut self,
        kind: RequestKind,
        session: &mut SessionState,
        camera: &dyn Camera,
    ) -> Dispatch {
        if self.phase == Phase::AwaitingPermission {
            warn!(?kind, "Camera permission not granted yet; ignoring snapshot request.");
            return Dispatch::NoPermission;
        }

        if !camera.is_playing() {
            error!(?kind, "Camera is not playing; ignoring snapshot request.");
            return Dispatch::CameraNotReady;
        }

        let plan_id = match kind {
            RequestKind::Create => None,
            RequestKind::Advance => match session.plan_id() {
                Some(id) => Some(id.to_string()),
                None => {
                    warn!("No active plan to advance; start a goal first.");
                    return Dispatch::NoActivePlan;
                }
            },
        };

        if self.in_flight.is_some() && self.settings.overlap == OverlapPolicy::Reject {
            warn!(?kind, "A plan request is already outstanding; rejecting new request.");
            return Dispatch::Busy;
        }

        let frame = camera.snapshot();
        let png = match frame.encode_png() {
            Ok(png) => png,
            Err(e) => {
                error!(error = %e, "Failed to encode camera snapshot.");
                return Dispatch::SnapshotFailed;
            }
        };

        let replaced = self.abort_in_flight();

        session.show_text(WAITING_MESSAGE);
        session.show_image(DisplayImage::Snapshot(frame));
        self.resume_requested = false;
        let prompt = session.dictation.take();

        info!(?kind, plan_id = plan_id.as_deref().unwrap_or(""), "Starting plan request");

        let client = self.client.clone();
        let timeout = self.settings.request_timeout;
        let (reply_tx, reply_rx) = oneshot::channel();
        let span = info_span!("plan_request", ?kind);
        let task = self.runtime.spawn(
            async move {
                let request = async {
                    match plan_id {
                        None => client
                            .create_plan(png, prompt)
                            .await
                            .map(|created| (Some(created.plan_id), created.outcome)),
                        Some(id) => client
                            .advance_plan(png, prompt, id)
                            .await
                            .map(|outcome| (None, outcome)),
                    }
                };
                let reply = tokio::time::timeout(timeout, request)
                    .await
                    .unwrap_or(Err(ClientError::TimedOut(timeout)));
                if reply_tx.send(reply).is_err() {
                    debug!("Plan request finished after it was abandoned.");
                }
            }
            .instrument(span),
        );

        self.in_flight = Some(InFlight {
            kind,
            reply: reply_rx,
            task,
        });
        self.phase = Phase::Awaiting(kind);

        if replaced {
            Dispatch::Replaced(kind)
        } else {
            Dispatch::Sent(kind)
        }
    }

    /// Advances the session by one host frame. Never blocks.
    ///
    /// Returns `Some` exactly once per request, on the tick that observes its
    /// completion.
    pub fn tick(&mut self, session: &mut SessionState, camera: &dyn Camera) -> Option<Completion> {
        if self.phase == Phase::AwaitingPermission {
            if !camera.has_permission() {
                session.show_text(NO_PERMISSION_MESSAGE);
                return None;
            }
            info!("Camera permission granted.");
            session.show_text(START_MESSAGE);
            self.phase = Phase::Idle;
            self.resume_requested = true;
        }

        if self.resume_requested && self.in_flight.is_none() && camera.is_playing() {
            self.resume_requested = false;
            session.show_image(DisplayImage::Live);
            if session.plan_id().is_some() {
                session.show_text(NEXT_STEP_MESSAGE);
            }
        }

        let in_flight = self.in_flight.as_mut()?;
        let kind = in_flight.kind;
        let reply = match in_flight.reply.try_recv() {
            Ok(reply) => Some(reply),
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => None,
        };
        self.in_flight = None;
        self.phase = Phase::Idle;

        let completion = match reply {
            Some(Ok((plan_id, outcome))) => self.apply_outcome(session, plan_id, outcome),
            Some(Err(e)) => {
                error!(?kind, error = %e, "Plan request failed");
                Completion::Failed(e.to_string())
            }
            None => {
                error!(?kind, "Plan request ended without a reply");
                Completion::Failed("request ended without a reply".to_string())
            }
        };

        info!(?kind, plan_id = session.plan_id().unwrap_or(""), ?completion, "Plan request completed");

        match &completion {
            Completion::NextStep(text) => {
                session.show_text(text.clone());
                if self.settings.speak_steps {
                    self.speaker.speak(text);
                }
            }
            Completion::AllStepsComplete | Completion::Failed(_) => {
                session.show_text(COMPLETED_MESSAGE);
            }
        }

        Some(completion)
    }

    fn apply_outcome(
        &self,
        session: &mut SessionState,
        plan_id: Option<String>,
        outcome: PlanOutcome,
    ) -> Completion {
        match plan_id {
            Some(id) if !id.trim().is_empty() => session.set_plan_id(id),
            Some(_) => warn!("Planner returned a blank goal id; keeping the previous one."),
            None => {}
        }

        let PlanOutcome { plan, highlight } = outcome;
        let completion = match highlight {
            Some(image) => {
                session.show_image(DisplayImage::Highlight(image));
                match plan.first_step() {
                    Some(step) => {
                        if let Some(object) = plan.object_for(step) {
                            debug!(label = %object.label, box_2d = ?object.box_2d, "Step targets object");
                        }
                        Completion::NextStep(step.text.clone())
                    }
                    None => Completion::AllStepsComplete,
                }
            }
            None => {
                warn!("Request completed, but no highlight image was returned.");
                Completion::AllStepsComplete
            }
        };

        session.set_plan(plan);
        completion
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.abort_in_flight();
    }
}
