use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{GameMakerError, Result};

/// Top-level configuration for the Game Maker client.
///
/// Loaded from `~/.gamemaker/config.toml` by default. Every section and field
/// falls back to its default when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameMakerConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub dictation: DictationConfig,
}

impl GameMakerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: GameMakerConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Reject values the client cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.backend.base_url.trim().is_empty() {
            return Err(GameMakerError::Config(
                "backend.base_url must not be empty".to_string(),
            ));
        }
        if self.dictation.silence_delay_ms == 0 {
            return Err(GameMakerError::Config(
                "dictation.silence_delay_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Where the Game Maker backend lives and how to talk to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL every endpoint path is appended to.
    pub base_url: String,
    /// Path of the session start endpoint.
    pub start_path: String,
    /// Path of the turn endpoint.
    pub message_path: String,
    /// Path prefix of the generated game; the session id is appended.
    pub game_path: String,
    /// Path of the health check endpoint.
    pub health_path: String,
    /// Per-request timeout in seconds. 0 disables the timeout.
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5001/api".to_string(),
            start_path: "/start-session".to_string(),
            message_path: "/message".to_string(),
            game_path: "/game".to_string(),
            health_path: "/health".to_string(),
            request_timeout_secs: 0,
        }
    }
}

impl BackendConfig {
    /// The request timeout, if one is configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Voice dictation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DictationConfig {
    /// Silence after the last final segment before the utterance is committed.
    pub silence_delay_ms: u64,
    /// How long a voice error notification stays visible.
    pub error_display_ms: u64,
    /// Keep listening across pauses instead of stopping after one phrase.
    pub continuous: bool,
    /// Deliver provisional results while the user is still speaking.
    pub interim_results: bool,
    /// Recognition language tag.
    pub language: String,
    /// Alternatives requested per result.
    pub max_alternatives: u32,
}

impl Default for DictationConfig {
    fn default() -> Self {
        Self {
            silence_delay_ms: 2500,
            error_display_ms: 3000,
            continuous: true,
            interim_results: true,
            language: "en-US".to_string(),
            max_alternatives: 1,
        }
    }
}

impl DictationConfig {
    pub fn silence_delay(&self) -> Duration {
        Duration::from_millis(self.silence_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = GameMakerConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.backend.base_url, "http://localhost:5001/api");
        assert_eq!(config.backend.start_path, "/start-session");
        assert_eq!(config.backend.message_path, "/message");
        assert_eq!(config.dictation.silence_delay_ms, 2500);
        assert_eq!(config.dictation.error_display_ms, 3000);
        assert!(config.dictation.continuous);
        assert!(config.dictation.interim_results);
        assert_eq!(config.dictation.language, "en-US");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[backend]
base_url = "https://games.example.com/api"
request_timeout_secs = 45

[dictation]
silence_delay_ms = 1800
interim_results = false
"#;
        let file = create_temp_config(content);
        let config = GameMakerConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.backend.base_url, "https://games.example.com/api");
        assert_eq!(
            config.backend.request_timeout(),
            Some(Duration::from_secs(45))
        );
        assert_eq!(config.dictation.silence_delay(), Duration::from_millis(1800));
        assert!(!config.dictation.interim_results);
        // Unspecified fields keep their defaults.
        assert_eq!(config.backend.message_path, "/message");
        assert_eq!(config.dictation.error_display_ms, 3000);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = GameMakerConfig::load(file.path()).unwrap();
        assert_eq!(config.backend.start_path, "/start-session");
        assert_eq!(config.backend.request_timeout(), None);
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("[backend\nbase_url = ");
        let result = GameMakerConfig::load(file.path());
        assert!(matches!(result, Err(GameMakerError::Config(_))));
    }

    #[test]
    fn test_load_rejects_zero_silence_delay() {
        let file = create_temp_config("[dictation]\nsilence_delay_ms = 0\n");
        let result = GameMakerConfig::load(file.path());
        match result {
            Err(GameMakerError::Config(msg)) => assert!(msg.contains("silence_delay_ms")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_blank_base_url() {
        let mut config = GameMakerConfig::default();
        config.backend.base_url = "   ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = GameMakerConfig::load(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(GameMakerError::Io(_))));
    }
}
