//! CLI argument definitions for the Game Maker terminal client.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// The Game Maker: turn a favourite book into a playable game, one
/// conversation turn at a time.
#[derive(Parser, Debug, Default)]
#[command(name = "gamemaker", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Backend API base URL, e.g. http://localhost:5001/api.
    #[arg(short = 'b', long = "backend-url")]
    pub backend_url: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > GAMEMAKER_CONFIG env var > ~/.gamemaker/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("GAMEMAKER_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the backend base URL.
    ///
    /// Priority: --backend-url flag > GAMEMAKER_BACKEND_URL env var.
    /// Returns `None` if neither is set (use the config value).
    pub fn resolve_backend_url(&self) -> Option<String> {
        self.resolve_backend_url_with(std::env::var("GAMEMAKER_BACKEND_URL").ok())
    }

    fn resolve_backend_url_with(&self, env_value: Option<String>) -> Option<String> {
        self.backend_url
            .clone()
            .or(env_value)
            .filter(|url| !url.trim().is_empty())
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".gamemaker").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".gamemaker").join("config.toml");
    }
    PathBuf::from("config.toml")
}
