use thiserror::Error;

/// Top-level error type for the Game Maker client.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for GameMakerError` so that `?` works across
/// crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GameMakerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Application error: {0}")]
    Application(String),

    #[error("Dictation error: {0}")]
    Dictation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for GameMakerError {
    fn from(err: toml::de::Error) -> Self {
        GameMakerError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for GameMakerError {
    fn from(err: toml::ser::Error) -> Self {
        GameMakerError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for GameMakerError {
    fn from(err: serde_json::Error) -> Self {
        GameMakerError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Game Maker operations.
pub type Result<T> = std::result::Result<T, GameMakerError>;
