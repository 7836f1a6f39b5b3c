use serde::{Deserialize, Serialize};

use crate::types::{PhaseId, SessionId, Timestamp};

/// Notifications emitted by the session controller.
///
/// Events are broadcast after state changes and consumed by whatever renders
/// the conversation (the terminal client, tests, or any other subscriber).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SessionEvent {
    /// A session was created; the greeting is the first agent message.
    SessionStarted {
        session_id: SessionId,
        phase: PhaseId,
        greeting: String,
        timestamp: Timestamp,
    },

    /// Starting a session failed. Prior session state is untouched.
    StartFailed {
        kind: TurnFailureKind,
        message: String,
        timestamp: Timestamp,
    },

    /// A turn passed the busy and session checks and is on its way to the
    /// backend. Rejected turns never produce this event.
    TurnDispatched {
        text: String,
        voice: bool,
        timestamp: Timestamp,
    },

    /// The agent replied to a turn.
    AgentMessage {
        text: String,
        agent: Option<String>,
        timestamp: Timestamp,
    },

    /// The backend moved the session into a different phase.
    PhaseChanged {
        from: PhaseId,
        to: PhaseId,
        agent: Option<String>,
        timestamp: Timestamp,
    },

    /// The game was generated. No further turns are accepted.
    SessionCompleted {
        session_id: SessionId,
        payload: Option<serde_json::Value>,
        artifact_path: String,
        timestamp: Timestamp,
    },

    /// A turn failed. Phase is unchanged and the user may try again.
    TurnFailed {
        kind: TurnFailureKind,
        message: String,
        timestamp: Timestamp,
    },
}

/// Broad cause of a failed backend exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnFailureKind {
    /// Network failure, bad status, or an unreadable response.
    Transport,
    /// The backend answered with `success: false`.
    Application,
}

/// Notifications emitted by the dictation engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DictationEvent {
    /// The recognizer is capturing audio.
    ListeningStarted,

    /// Display-only transcript progress while listening.
    TranscriptUpdated { committed: String, interim: String },

    /// A finished utterance, trimmed and ready to submit as a turn.
    Committed { text: String },

    /// Listening ended and the engine is idle again.
    ListeningStopped,

    /// Recognition failed. Anything heard so far was discarded.
    VoiceError {
        category: VoiceErrorCategory,
        message: String,
        dismiss_after_ms: u64,
    },
}

/// Categorized speech recognition failure.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceErrorCategory {
    NoSpeech,
    AudioCapture,
    PermissionDenied,
    Other(String),
}

impl VoiceErrorCategory {
    /// Classify a recognizer error code.
    pub fn from_code(code: &str) -> Self {
        match code {
            "no-speech" => VoiceErrorCategory::NoSpeech,
            "audio-capture" => VoiceErrorCategory::AudioCapture,
            "not-allowed" | "service-not-allowed" => VoiceErrorCategory::PermissionDenied,
            other => VoiceErrorCategory::Other(other.to_string()),
        }
    }

    /// Short message suitable for a transient notification.
    pub fn user_message(&self) -> String {
        match self {
            VoiceErrorCategory::NoSpeech => "No speech detected. Please try again.".to_string(),
            VoiceErrorCategory::AudioCapture => {
                "Microphone not found. Please check your mic.".to_string()
            }
            VoiceErrorCategory::PermissionDenied => {
                "Microphone permission denied. Please allow access.".to_string()
            }
            VoiceErrorCategory::Other(code) => format!("Voice error: {}", code),
        }
    }
}
