//! The frame-ticked host loop.
//!
//! Plays the part of a game engine's update loop: once per tick it applies
//! queued user commands, lets the orchestrator poll its outstanding request
//! and redraws the display. Nothing in here blocks on the network.

use crate::camera::FileCamera;
use crate::console::{self, Command, HELP};
use crate::display::DisplaySink;
use guide_core::{Completion, Dispatch, Orchestrator, SessionState};
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, error::TryRecvError};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Host<W: Write> {
    orchestrator: Orchestrator,
    session: SessionState,
    camera: FileCamera,
    display: DisplaySink<W>,
}

impl<W: Write> Host<W> {
    pub fn new(orchestrator: Orchestrator, camera: FileCamera, display: DisplaySink<W>) -> Self {
        Self {
            orchestrator,
            session: SessionState::new(),
            camera,
            display,
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Applies one user command.
    pub fn handle(&mut self, command: Command) -> Flow {
        match command {
            Command::StartGoal => {
                let dispatch = self.orchestrator.start_goal(&mut self.session, &self.camera);
                self.report_dispatch(dispatch);
            }
            Command::NextStep => {
                let dispatch = self.orchestrator.next_step(&mut self.session, &self.camera);
                self.report_dispatch(dispatch);
            }
            Command::Say(text) => {
                self.session.dictation.append(&text);
                info!(dictation = %self.session.dictation.peek(), "Dictation updated");
            }
            Command::Load(path) => {
                if let Err(e) = self.camera.load(&path) {
                    warn!(error = %e, "Could not change scene");
                }
            }
            Command::Resume => self.orchestrator.resume_streaming(),
            Command::Cancel => {
                if !self.orchestrator.cancel(&mut self.session) {
                    info!("No request to cancel.");
                }
            }
            Command::Status => {
                info!(
                    phase = ?self.orchestrator.phase(),
                    plan_id = self.session.plan_id().unwrap_or(""),
                    display_text = %self.session.display_text(),
                    pending_dictation = %self.session.dictation.peek(),
                    scene = ?self.camera.source(),
                    "Session status"
                );
                if let Some(plan) = self.session.plan() {
                    for (i, step) in plan.steps.iter().enumerate() {
                        info!(index = i + 1, text = %step.text, object = %step.object_label, "Remaining step");
                    }
                }
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn report_dispatch(&self, dispatch: Dispatch) {
        match dispatch {
            Dispatch::Sent(_) | Dispatch::Replaced(_) => {}
            Dispatch::Busy => warn!("Still waiting for the previous request."),
            Dispatch::NoPermission => warn!("Camera permission has not been granted yet."),
            Dispatch::CameraNotReady => warn!("Load a scene image first."),
            Dispatch::NoActivePlan => warn!("No active goal; press 'a' to start one."),
            Dispatch::SnapshotFailed => warn!("Could not capture the scene."),
        }
    }

    /// Runs one frame: orchestrator tick followed by a redraw.
    pub fn tick(&mut self) -> std::io::Result<Option<Completion>> {
        let completion = self.orchestrator.tick(&mut self.session, &self.camera);
        self.display.render(&self.session)?;
        Ok(completion)
    }

    /// Ticks every `interval` until a quit command arrives or the input closes.
    pub fn run(
        mut self,
        mut input: UnboundedReceiver<String>,
        interval: Duration,
    ) -> std::io::Result<()> {
        info!(?interval, "Host loop started");
        'frames: loop {
            loop {
                match input.try_recv() {
                    Ok(line) => match console::parse(&line) {
                        Some(Ok(command)) => {
                            if self.handle(command) == Flow::Quit {
                                break 'frames;
                            }
                        }
                        Some(Err(e)) => warn!("{}", e),
                        None => {}
                    },
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => break 'frames,
                }
            }

            self.tick()?;
            std::thread::sleep(interval);
        }
        self.orchestrator.cancel(&mut self.session);
        info!("Host loop stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use guide_core::session::{COMPLETED_MESSAGE, DisplayImage, START_MESSAGE, WAITING_MESSAGE};
    use guide_core::{HttpPlanClient, OrchestratorSettings};
    use image::{Rgba, RgbaImage};
    use mockito::{Matcher, Server};
    use std::path::Path;
    use std::sync::Arc;
    use tokio::runtime::Handle;

    fn write_scene(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("scene.png");
        RgbaImage::from_pixel(4, 4, Rgba([30, 60, 90, 255]))
            .save(&path)
            .unwrap();
        path
    }

    fn highlight_b64() -> String {
        let mut png = Vec::new();
        RgbaImage::from_pixel(2, 2, Rgba([255, 255, 0, 255]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        base64::engine::general_purpose::STANDARD.encode(png)
    }

    async fn tick_until_done<W: Write>(host: &mut Host<W>) -> Completion {
        for _ in 0..1000 {
            if let Some(completion) = host.tick().unwrap() {
                return completion;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("plan request never completed");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_guided_session_against_planner() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(
                serde_json::json!({"prompt": "pick up the cup"}),
            ))
            .with_status(200)
            .with_body(format!(
                r#"{{"id": "g1", "plan": {{"goal": "cup", "objects": [{{"label": "cup", "box_2d": [0, 0, 2, 2]}}], "steps": [{{"text": "move left", "object_label": "cup"}}]}}, "highlight_image_base64": "{}", "banana_image_base64": null}}"#,
                highlight_b64()
            ))
            .create_async()
            .await;
        let advance = server
            .mock("PUT", "/goals/g1")
            .match_body(Matcher::PartialJson(serde_json::json!({"prompt": ""})))
            .with_status(200)
            .with_body(r#"{"id": "g1", "plan": {"goal": "cup", "objects": [], "steps": []}, "highlight_image_base64": null, "banana_image_base64": null}"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let camera = FileCamera::open(write_scene(dir.path())).unwrap();
        let client = HttpPlanClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let orchestrator = Orchestrator::new(
            Arc::new(client),
            Handle::current(),
            OrchestratorSettings::default(),
        );
        let out_dir = dir.path().join("out");
        let mut host = Host::new(orchestrator, camera, DisplaySink::new(Vec::new(), &out_dir));

        host.tick().unwrap();
        assert_eq!(host.session().display_text(), START_MESSAGE);

        host.handle(Command::Say("pick up the cup".to_string()));
        assert_eq!(host.handle(Command::StartGoal), Flow::Continue);
        assert_eq!(host.session().display_text(), WAITING_MESSAGE);

        let completion = tick_until_done(&mut host).await;
        create.assert_async().await;
        assert_eq!(completion, Completion::NextStep("move left".to_string()));
        assert_eq!(host.session().plan_id(), Some("g1"));
        assert_eq!(host.session().display_text(), "move left");
        assert!(matches!(
            host.session().display_image(),
            DisplayImage::Highlight(_)
        ));
        assert!(out_dir.join("highlight_000.png").is_file());

        host.handle(Command::NextStep);
        let completion = tick_until_done(&mut host).await;
        advance.assert_async().await;
        assert_eq!(completion, Completion::AllStepsComplete);
        assert_eq!(host.session().display_text(), COMPLETED_MESSAGE);
        assert_eq!(host.session().plan_id(), Some("g1"));

        assert_eq!(host.handle(Command::Quit), Flow::Quit);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_server_error_shows_terminal_message() {
        let mut server = Server::new_async().await;
        let _create = server
            .mock("POST", "/")
            .with_status(500)
            .with_body("Internal Server Error")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let camera = FileCamera::open(write_scene(dir.path())).unwrap();
        let client = HttpPlanClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let orchestrator = Orchestrator::new(
            Arc::new(client),
            Handle::current(),
            OrchestratorSettings::default(),
        );
        let mut host = Host::new(orchestrator, camera, DisplaySink::new(Vec::new(), dir.path()));

        host.tick().unwrap();
        host.handle(Command::StartGoal);
        let completion = tick_until_done(&mut host).await;

        assert!(matches!(completion, Completion::Failed(_)));
        assert_eq!(host.session().display_text(), COMPLETED_MESSAGE);
        assert_eq!(host.session().plan_id(), None);
        assert!(matches!(
            host.session().display_image(),
            DisplayImage::Snapshot(_)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_stops_on_quit() {
        let dir = tempfile::tempdir().unwrap();
        let client = HttpPlanClient::new("http://127.0.0.1:9/", Duration::from_secs(1)).unwrap();
        let orchestrator = Orchestrator::new(
            Arc::new(client),
            Handle::current(),
            OrchestratorSettings::default(),
        );
        let host = Host::new(
            orchestrator,
            FileCamera::new(),
            DisplaySink::new(Vec::new(), dir.path()),
        );

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tx.send("status".to_string()).unwrap();
        tx.send("bogus".to_string()).unwrap();
        tx.send("quit".to_string()).unwrap();

        tokio::task::spawn_blocking(move || host.run(rx, Duration::from_millis(1)))
            .await
            .unwrap()
            .unwrap();
    }
}
