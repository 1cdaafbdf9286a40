use guide_core::{OrchestratorSettings, OverlapPolicy};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub base_url: String,
    pub request_timeout: Duration,
    pub tick_interval: Duration,
    pub overlap: OverlapPolicy,
    pub speak_steps: bool,
    pub output_dir: PathBuf,
    pub log_level: Level,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let base_url = std::env::var("GUIDE_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8000/".to_string());
        if base_url.trim().is_empty() {
            return Err(ConfigError::MissingVar("GUIDE_BASE_URL".to_string()));
        }

        let timeout_secs: u64 = parse_var("REQUEST_TIMEOUT_SECS", 30)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "REQUEST_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let tick_ms: u64 = parse_var("TICK_INTERVAL_MS", 33)?;
        if tick_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "TICK_INTERVAL_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let overlap: OverlapPolicy = parse_var("OVERLAP_POLICY", OverlapPolicy::Replace)?;
        let speak_steps: bool = parse_var("SPEAK_STEPS", false)?;

        let output_dir = std::env::var("OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            base_url,
            request_timeout: Duration::from_secs(timeout_secs),
            tick_interval: Duration::from_millis(tick_ms),
            overlap,
            speak_steps,
            output_dir,
            log_level,
        })
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            request_timeout: self.request_timeout,
            overlap: self.overlap,
            speak_steps: self.speak_steps,
        }
    }
}
