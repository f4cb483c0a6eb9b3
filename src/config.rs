use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MarqueeError, Result};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    pub api_key: Option<String>,
    pub api_key_env: Option<String>,
    pub api_key_command: Option<String>,
    pub base_url: String,
    pub web_url: String,
    pub language: String,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: Some("TMDB_API_KEY".to_string()),
            api_key_command: None,
            base_url: "https://api.themoviedb.org/3".to_string(),
            web_url: "https://www.themoviedb.org".to_string(),
            language: "en-US".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_ms: 400,
            timeout_secs: 15,
        }
    }
}

impl NetworkConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub debounce_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self { debounce_ms: 100 }
    }
}

impl UiConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub tmdb: TmdbConfig,
    pub network: NetworkConfig,
    pub ui: UiConfig,
}

pub fn config_path() -> Option<PathBuf> {
    let config_dir = dirs::config_dir()?;
    Some(config_dir.join("marquee").join("config.toml"))
}

impl Config {
    /// Load from the default location. A missing or unreadable file yields defaults.
    pub fn load() -> Self {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Config::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Config::default();
        };

        match toml::from_str::<Config>(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "ignoring invalid config");
                Config::default()
            }
        }
    }

    /// Find the TMDB API key: explicit flag, environment variable, config
    /// value, then the configured command.
    pub fn resolve_api_key(&self, flag: Option<&str>) -> Result<String> {
        self.resolve_api_key_with(flag, |name| std::env::var(name).ok())
    }

    fn resolve_api_key_with(
        &self,
        flag: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<String> {
        if let Some(key) = non_empty(flag.map(str::to_string)) {
            return Ok(key);
        }

        if let Some(var) = &self.tmdb.api_key_env {
            if let Some(key) = non_empty(env(var)) {
                return Ok(key);
            }
        }

        if let Some(key) = non_empty(self.tmdb.api_key.clone()) {
            return Ok(key);
        }

        if let Some(command) = &self.tmdb.api_key_command {
            if let Some(key) = try_cli_key(command) {
                return Ok(key);
            }
        }

        let hint = self
            .tmdb
            .api_key_env
            .as_deref()
            .map(|var| format!(" (set {} or pass --api-key)", var))
            .unwrap_or_default();
        Err(MarqueeError::Config(format!("no TMDB API key configured{}", hint)))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Run a shell command and use its trimmed stdout as the key.
fn try_cli_key(command: &str) -> Option<String> {
    let output = std::process::Command::new("sh")
        .args(["-c", command])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }
    non_empty(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
}
