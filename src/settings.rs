use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

const CONFIG_FILE: &str = "gallery_scraper";
const ENV_PREFIX: &str = "GALLERY";

/// Runtime settings: defaults, then `gallery_scraper.toml`, then `GALLERY_*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Upper bound on concurrent detail fetches.
    pub workers: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub threshold: u8,
    pub model: String,
    pub api_base: String,
    pub request_delay_ms: u64,
    pub webdriver_url: String,
    pub site_origin: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            workers: 8,
            timeout_secs: 10,
            user_agent: concat!("gallery_scraper/", env!("CARGO_PKG_VERSION")).to_string(),
            threshold: crate::matcher::DEFAULT_THRESHOLD,
            model: "gpt-4o-mini".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            request_delay_ms: 1000,
            webdriver_url: "http://localhost:9515".to_string(),
            site_origin: "https://devpost.com".to_string(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        // A missing .env is fine; the key may already be exported.
        let _ = dotenvy::dotenv();

        config::Config::builder()
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .context("Failed to load settings")?
            .try_deserialize::<Settings>()
            .context("Invalid settings")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn workers(&self) -> usize {
        self.workers.clamp(1, crate::pipeline::MAX_WORKERS)
    }

    /// Configured threshold, capped at a full match.
    pub fn threshold(&self) -> u8 {
        self.threshold.min(100)
    }
}

pub fn api_key() -> Result<String> {
    std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY environment variable must be set")
}
