use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use std::{env, fmt::Display, str::FromStr};
use tracing::{info, warn};

pub const PLACEHOLDER_API_URL: &str = "https://example-placeholder-supabase.co";
pub const PLACEHOLDER_API_KEY: &str = "placeholder-anon-key";

/// Runtime settings, read from `ADVENTURE_*` environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub api_key: String,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub search_debounce: Duration,
    pub export_dir: PathBuf,
    /// Identity to act as; anonymous when unset
    pub user_id: Option<String>,
    /// Initial search text for the CLI
    pub search: Option<String>,
    /// How long the CLI listens for new adventures; disabled when unset
    pub follow_for: Option<Duration>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let request_timeout: u64 = try_load("ADVENTURE_REQUEST_TIMEOUT_SECS", "30")?;
        let poll_interval: u64 = try_load("ADVENTURE_POLL_INTERVAL_SECS", "15")?;
        let search_debounce: u64 = try_load("ADVENTURE_SEARCH_DEBOUNCE_MS", "300")?;
        let follow_for: u64 = try_load("ADVENTURE_FOLLOW_SECS", "0")?;

        Ok(Self {
            api_url: try_load("ADVENTURE_API_URL", PLACEHOLDER_API_URL)?,
            api_key: try_load("ADVENTURE_API_KEY", PLACEHOLDER_API_KEY)?,
            request_timeout: Duration::from_secs(request_timeout.max(1)),
            poll_interval: Duration::from_secs(poll_interval.max(1)),
            search_debounce: Duration::from_millis(search_debounce),
            export_dir: try_load("ADVENTURE_EXPORT_DIR", ".")?,
            user_id: optional("ADVENTURE_USER_ID"),
            search: optional("ADVENTURE_SEARCH"),
            follow_for: (follow_for > 0).then(|| Duration::from_secs(follow_for)),
        })
    }

    /// False while the backend URL is still the placeholder
    pub fn has_backend(&self) -> bool {
        self.api_url != PLACEHOLDER_API_URL
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: PLACEHOLDER_API_URL.to_string(),
            api_key: PLACEHOLDER_API_KEY.to_string(),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(15),
            search_debounce: Duration::from_millis(300),
            export_dir: PathBuf::from("."),
            user_id: None,
            search: None,
            follow_for: None,
        }
    }
}

fn var(key: &str) -> Result<String, env::VarError> {
    env::var(key)
}

fn optional(key: &str) -> Option<String> {
    var(key).ok().filter(|value| !value.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            anyhow::anyhow!("{e}")
        })
        .with_context(|| format!("Environment variable {key} is misconfigured"))
}
