//! Platform speech recognition seam.
//!
//! A [`SpeechCapability`] is whatever actually listens to the microphone. It
//! is started and stopped by the engine and reports back asynchronously by
//! posting [`RecognitionEvent`]s through a [`DictationHandle`](crate::DictationHandle).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use gamemaker_core::config::DictationConfig;
use gamemaker_core::error::GameMakerError;

use crate::engine::DictationHandle;

// =============================================================================
// Recognition data
// =============================================================================

/// Options handed to the platform recognizer when it is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionSettings {
    /// Keep listening across pauses instead of stopping after one phrase.
    pub continuous: bool,
    /// Report provisional results while the user is still speaking.
    pub interim_results: bool,
    /// BCP 47 language tag, e.g. `en-US`.
    pub language: String,
    pub max_alternatives: u32,
}

impl From<&DictationConfig> for RecognitionSettings {
    fn from(config: &DictationConfig) -> Self {
        Self {
            continuous: config.continuous,
            interim_results: config.interim_results,
            language: config.language.clone(),
            max_alternatives: config.max_alternatives,
        }
    }
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self::from(&DictationConfig::default())
    }
}

/// One candidate transcription of a result.
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub transcript: String,
    pub confidence: Option<f32>,
}

/// A recognized phrase. Interim results may be revised; final results never are.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    pub alternatives: Vec<Alternative>,
    pub is_final: bool,
}

impl RecognitionResult {
    /// A final result with a single alternative.
    pub fn final_text(text: impl Into<String>) -> Self {
        Self::single(text, true)
    }

    /// An interim result with a single alternative.
    pub fn interim(text: impl Into<String>) -> Self {
        Self::single(text, false)
    }

    fn single(text: impl Into<String>, is_final: bool) -> Self {
        Self {
            alternatives: vec![Alternative {
                transcript: text.into(),
                confidence: None,
            }],
            is_final,
        }
    }

    /// Transcript of the best alternative, or an empty string if there is none.
    pub fn transcript(&self) -> &str {
        self.alternatives
            .first()
            .map(|a| a.transcript.as_str())
            .unwrap_or("")
    }
}

/// Asynchronous notifications from the platform recognizer.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// Capture has actually begun.
    Started,
    /// Results from `result_index` onward are new or revised since the last event.
    Result {
        result_index: usize,
        results: Vec<RecognitionResult>,
    },
    /// Capture has ended, whether requested or not.
    Ended,
    /// Recognition failed with a platform error code such as `no-speech`.
    Error { code: String },
}

// =============================================================================
// Capability
// =============================================================================

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("speech recognition is already running")]
    AlreadyRunning,

    #[error("speech recognition unavailable: {0}")]
    Unavailable(String),
}

impl CapabilityError {
    /// Error code reported to the user when starting fails.
    pub fn code(&self) -> &'static str {
        match self {
            CapabilityError::AlreadyRunning => "already-running",
            CapabilityError::Unavailable(_) => "not-supported",
        }
    }
}

impl From<CapabilityError> for GameMakerError {
    fn from(err: CapabilityError) -> Self {
        GameMakerError::Dictation(err.to_string())
    }
}

/// Starts and stops the platform recognizer.
///
/// Implementations report progress by posting [`RecognitionEvent`]s to the
/// engine; neither method blocks waiting for capture to begin or end.
pub trait SpeechCapability: Send {
    fn start(&mut self) -> Result<(), CapabilityError>;

    /// Request that capture stop. Must be safe to call when not running.
    fn stop(&mut self);
}

// =============================================================================
// Mock
// =============================================================================

#[derive(Debug, Default)]
struct MockState {
    running: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_next_start: std::sync::Mutex<Option<CapabilityError>>,
}

/// In-memory capability for tests.
///
/// Clones share state, so a test can keep one clone to inspect calls after
/// handing the other to the engine. With [`MockCapability::with_echo`] it
/// behaves like a real recognizer and posts `Started` and `Ended` events back
/// to the engine.
#[derive(Debug, Clone, Default)]
pub struct MockCapability {
    state: Arc<MockState>,
    echo: Option<DictationHandle>,
}

impl MockCapability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_echo(handle: DictationHandle) -> Self {
        Self {
            state: Arc::default(),
            echo: Some(handle),
        }
    }

    /// Make the next `start` call fail with `err`.
    pub fn fail_next_start(&self, err: CapabilityError) {
        *self
            .state
            .fail_next_start
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(err);
    }

    /// Pretend the platform recognizer was already started elsewhere.
    pub fn set_running(&self, running: bool) {
        self.state.running.store(running, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.state.starts.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.state.stops.load(Ordering::SeqCst)
    }
}

impl SpeechCapability for MockCapability {
    fn start(&mut self) -> Result<(), CapabilityError> {
        self.state.starts.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .state
            .fail_next_start
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(err) = injected {
            return Err(err);
        }
        if self.state.running.swap(true, Ordering::SeqCst) {
            return Err(CapabilityError::AlreadyRunning);
        }
        if let Some(ref echo) = self.echo {
            echo.deliver(RecognitionEvent::Started);
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.state.stops.fetch_add(1, Ordering::SeqCst);
        let was_running = self.state.running.swap(false, Ordering::SeqCst);
        if was_running {
            if let Some(ref echo) = self.echo {
                echo.deliver(RecognitionEvent::Ended);
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
