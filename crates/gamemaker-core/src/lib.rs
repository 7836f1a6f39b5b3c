pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::GameMakerConfig;
pub use error::{GameMakerError, Result};
pub use events::{DictationEvent, SessionEvent, TurnFailureKind, VoiceErrorCategory};
pub use types::*;
