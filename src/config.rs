use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_DB_PATH: &str = "data/resources.sqlite";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Process-wide settings, built once at entry and passed by reference into
/// every component that talks to a backend. No ambient globals.
#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: PathBuf,
    pub deepgram_api_key: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    /// Timeout on the initial resource fetch. Backend calls rely on the
    /// backends' own timeout behavior.
    pub fetch_timeout: Duration,
    /// How long a rendered page gets to settle before the DOM is scanned.
    pub render_wait: Duration,
    /// Override for the Chrome binary used by the rendered-media scan.
    pub chrome_binary: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let deepgram_api_key = env::var("DEEPGRAM_API_KEY")
            .context("DEEPGRAM_API_KEY environment variable must be set")?;
        let gemini_api_key = env::var("GEMINI_API_KEY")
            .context("GEMINI_API_KEY environment variable must be set")?;

        Ok(Settings {
            db_path: env::var("TAGGER_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB_PATH)),
            deepgram_api_key,
            gemini_api_key,
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
            fetch_timeout: Duration::from_secs(10),
            render_wait: Duration::from_secs(5),
            chrome_binary: env::var("CHROME_BIN").ok().map(PathBuf::from),
        })
    }

    /// Settings for commands that never touch a backend (schema init, stats).
    /// API keys are left empty rather than required.
    pub fn offline() -> Self {
        Settings {
            db_path: env::var("TAGGER_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB_PATH)),
            deepgram_api_key: String::new(),
            gemini_api_key: String::new(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            fetch_timeout: Duration::from_secs(10),
            render_wait: Duration::from_secs(5),
            chrome_binary: None,
        }
    }
}
