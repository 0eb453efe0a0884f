use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Every variable is optional; a malformed value fails start-up.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Replaces the built-in site override table.
    pub site_overrides_path: Option<PathBuf>,
    /// Scoring weights and label bounds; omitted keys keep their defaults.
    pub scoring_weights_path: Option<PathBuf>,
    pub scan_cooldown: Duration,
    pub max_scan_sessions: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Config {
            port: var("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            site_overrides_path: var("SITE_OVERRIDES_PATH").map(PathBuf::from),
            scoring_weights_path: var("SCORING_WEIGHTS_PATH").map(PathBuf::from),
            scan_cooldown: Duration::from_millis(
                var("SCAN_COOLDOWN_MS")
                    .unwrap_or_else(|| "1000".to_string())
                    .parse::<u64>()
                    .context("SCAN_COOLDOWN_MS must be a whole number of milliseconds")?,
            ),
            max_scan_sessions: var("MAX_SCAN_SESSIONS")
                .unwrap_or_else(|| "1024".to_string())
                .parse::<usize>()
                .context("MAX_SCAN_SESSIONS must be a positive integer")?,
        })
    }
}
