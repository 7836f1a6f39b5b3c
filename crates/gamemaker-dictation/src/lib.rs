//! Voice dictation for the Game Maker client.
//!
//! Turns a noisy stream of interim and final speech recognition results into
//! discrete committed utterances. The lifecycle is a two-state machine,
//! Idle <-> Listening, with a single cancellable silence timer: an utterance is
//! committed once no final result has arrived for the configured silence
//! delay, or when the user stops listening.

pub mod capability;
pub mod engine;
pub mod scheduler;
pub mod state;

pub use capability::{
    Alternative, CapabilityError, MockCapability, RecognitionEvent, RecognitionResult,
    RecognitionSettings, SpeechCapability,
};
pub use engine::{channel, DictationEngine, DictationHandle};
pub use scheduler::{ManualScheduler, Scheduler, TimerToken, TokioScheduler};
pub use state::{DictationInput, DictationMachine, DictationState, Effect, VoiceBuffer};
