//! Plan Client
//!
//! HTTP client for the planning endpoint. A goal is created by posting a
//! snapshot to the base URL and advanced by putting a fresh snapshot to
//! `goals/{id}`. Both calls answer with the same [`PlanResponse`] shape.

use crate::frame::{self, HighlightImage};
use crate::plan::{Plan, PlanRequest, PlanResponse};
use async_trait::async_trait;
use reqwest::{Method, Url};
use std::time::Duration;
use tracing::{debug, error, info};

/// Errors returned by a [`PlanClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request could not be completed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("planner returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request timed out after {0:?}")]
    TimedOut(Duration),
    #[error("malformed plan response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("planner created a goal without an id")]
    MissingPlanId,
    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),
}

impl ClientError {
    /// Whether the request itself failed (transport, status or timeout), as
    /// opposed to the response being unreadable.
    pub fn is_request_failure(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::Status { .. } | ClientError::TimedOut(_)
        )
    }
}

/// Result of advancing a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutcome {
    pub plan: Plan,
    /// `None` when the server sent no usable highlight image.
    pub highlight: Option<HighlightImage>,
}

/// Result of creating a plan: the outcome plus the id of the new goal.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedPlan {
    pub plan_id: String,
    pub outcome: PlanOutcome,
}

/// The contract for any client that can talk to a planner.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlanClient: Send + Sync {
    /// Starts a new goal from a PNG snapshot and a prompt.
    async fn create_plan(&self, image_png: Vec<u8>, prompt: String)
    -> Result<CreatedPlan, ClientError>;

    /// Sends a new PNG snapshot for an existing goal and returns the remaining plan.
    async fn advance_plan(
        &self,
        image_png: Vec<u8>,
        prompt: String,
        plan_id: String,
    ) -> Result<PlanOutcome, ClientError>;

    /// Checks that the planner is reachable.
    async fn health(&self) -> Result<(), ClientError>;
}

/// A [`PlanClient`] speaking JSON over HTTP.
pub struct HttpPlanClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpPlanClient {
    /// Creates a client for the planner at `base_url`.
    ///
    /// A trailing `/` is added to the base URL when missing so that
    /// `goals/{id}` resolves beneath it. Every request is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_client(client, base_url)
    }

    /// Creates a client reusing an existing `reqwest::Client`.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, ClientError> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base_url = Url::parse(&normalized)
            .map_err(|_| ClientError::InvalidBaseUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of an existing goal: `{base}goals/{id}`, with the id as one encoded segment.
    pub fn goal_url(&self, plan_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("goals").push(plan_id);
        }
        url
    }

    async fn send_plan_request(
        &self,
        method: Method,
        url: Url,
        image_png: &[u8],
        prompt: String,
    ) -> Result<PlanResponse, ClientError> {
        let body = PlanRequest {
            prompt,
            image_base64: frame::encode_base64(image_png),
        };

        debug!(
            %method,
            %url,
            image_len = image_png.len(),
            prompt_len = body.prompt.len(),
            "Sending plan request"
        );

        let response = self
            .client
            .request(method, url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            error!(status = status.as_u16(), error_body = %body, "Planner returned error status");
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let parsed: PlanResponse = serde_json::from_str(&text)?;
        Ok(parsed)
    }
}

fn into_outcome(response: PlanResponse) -> PlanOutcome {
    if let Some(step) = response.plan.first_step() {
        info!(step = %step.text, remaining = response.plan.steps.len(), "Received next step");
    } else {
        info!("Received plan with no remaining steps");
    }
    PlanOutcome {
        highlight: frame::decode_highlight(response.highlight_image_base64.as_deref()),
        plan: response.plan,
    }
}

#[async_trait]
impl PlanClient for HttpPlanClient {
    async fn create_plan(
        &self,
        image_png: Vec<u8>,
        prompt: String,
    ) -> Result<CreatedPlan, ClientError> {
        let response = self
            .send_plan_request(Method::POST, self.base_url.clone(), &image_png, prompt)
            .await?;
        let plan_id = response.id.trim().to_string();
        if plan_id.is_empty() {
            error!(goal = %response.plan.goal, "Planner response carries a blank goal id");
            return Err(ClientError::MissingPlanId);
        }
        info!(%plan_id, goal = %response.plan.goal, "Created plan");
        Ok(CreatedPlan {
            plan_id,
            outcome: into_outcome(response),
        })
    }

    async fn advance_plan(
        &self,
        image_png: Vec<u8>,
        prompt: String,
        plan_id: String,
    ) -> Result<PlanOutcome, ClientError> {
        let url = self.goal_url(&plan_id);
        let response = self
            .send_plan_request(Method::PUT, url, &image_png, prompt)
            .await?;
        Ok(into_outcome(response))
    }

    async fn health(&self) -> Result<(), ClientError> {
        let response = self.client.get(self.base_url.clone()).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ClientError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}
