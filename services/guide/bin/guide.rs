//! Main Entrypoint for the Guide Client
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment and command line.
//! 2. Initializing logging.
//! 3. Building the HTTP plan client.
//! 4. Running the interactive host loop, a one-shot request or a health check.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use guide_core::collaborators::Camera;
use guide_core::{HttpPlanClient, Orchestrator, PlanClient, PlanOutcome};
use guide_service::{
    camera::FileCamera, config::Config, console::HELP, display::DisplaySink,
    display::LogSpeaker, host::Host,
};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(version, about = "Step-by-step guidance from a remote task planner")]
struct Cli {
    /// Planner base URL; overrides GUIDE_BASE_URL.
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Per-request timeout in seconds; overrides REQUEST_TIMEOUT_SECS.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the interactive guided session.
    Run {
        /// Scene image the camera starts with.
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Send one image and print the returned plan.
    Send {
        /// Image to upload.
        image: PathBuf,
        /// Existing goal to advance. A new goal is created when omitted.
        #[arg(long)]
        goal_id: Option<String>,
        #[arg(long, default_value = "")]
        prompt: String,
    },
    /// Check that the planner is reachable.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(secs) = cli.timeout_secs {
        if secs == 0 {
            bail!("--timeout-secs must be greater than zero");
        }
        config.request_timeout = Duration::from_secs(secs);
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    // --- 3. Build the Plan Client ---
    let client = Arc::new(
        HttpPlanClient::new(&config.base_url, config.request_timeout)
            .context("Failed to build plan client")?,
    );
    info!(base_url = %client.base_url(), timeout = ?config.request_timeout, "Plan client ready");

    // --- 4. Dispatch ---
    match cli.command {
        Commands::Run { image } => run_session(config, client, image).await,
        Commands::Send {
            image,
            goal_id,
            prompt,
        } => send_once(&config, client.as_ref(), &image, goal_id, prompt).await,
        Commands::Health => {
            client
                .health()
                .await
                .context("Planner health check failed")?;
            println!("ok");
            Ok(())
        }
    }
}

async fn run_session(
    config: Config,
    client: Arc<HttpPlanClient>,
    image: Option<PathBuf>,
) -> anyhow::Result<()> {
    let camera = match image {
        Some(path) => FileCamera::open(&path)?,
        None => FileCamera::new(),
    };
    if !camera.is_playing() {
        warn!("No scene loaded yet; use 'load <path>' before pressing 'a'.");
    }

    let orchestrator = Orchestrator::new(client, Handle::current(), config.orchestrator_settings())
        .with_speaker(Box::new(LogSpeaker));
    let display = DisplaySink::new(std::io::stdout(), &config.output_dir);
    let host = Host::new(orchestrator, camera, display);

    // Stdin is read on its own thread so the host loop never waits for input.
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    println!("{}", HELP);
    let interval = config.tick_interval;
    tokio::task::spawn_blocking(move || host.run(rx, interval))
        .await
        .context("Host loop panicked")?
        .context("Host loop failed")?;
    Ok(())
}

async fn send_once(
    config: &Config,
    client: &HttpPlanClient,
    image: &Path,
    goal_id: Option<String>,
    prompt: String,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(image)
        .with_context(|| format!("Failed to read image {}", image.display()))?;

    let (id, outcome): (String, PlanOutcome) = match goal_id {
        Some(id) => {
            let outcome = client
                .advance_plan(bytes, prompt, id.clone())
                .await
                .context("Advance request failed")?;
            (id, outcome)
        }
        None => {
            let created = client
                .create_plan(bytes, prompt)
                .await
                .context("Create request failed")?;
            (created.plan_id, created.outcome)
        }
    };

    let highlight_path = match &outcome.highlight {
        Some(highlight) => {
            let stem: String = id
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                .collect();
            let path = config
                .output_dir
                .join(format!("{}_highlight.{}", stem, highlight.extension()));
            std::fs::create_dir_all(&config.output_dir)?;
            std::fs::write(&path, &highlight.encoded)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Some(path.display().to_string())
        }
        None => None,
    };

    let report = serde_json::json!({
        "id": id,
        "plan": outcome.plan,
        "highlight_image": highlight_path,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
