//! Dictation state machine.
//!
//! Transitions:
//! - Idle -> Listening (user toggles voice on)
//! - Listening -> Idle (recognizer ended, or failed)
//!
//! [`DictationMachine::apply`] is pure: it updates the machine and returns the
//! [`Effect`]s the engine must carry out. It never touches the recognizer,
//! a clock, or a channel directly.

use std::fmt;
use std::time::Duration;

use gamemaker_core::config::DictationConfig;
use gamemaker_core::events::{DictationEvent, VoiceErrorCategory};

use crate::capability::{RecognitionEvent, RecognitionResult};
use crate::scheduler::TimerToken;

/// Operational state of the dictation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DictationState {
    /// Not listening. Ready to start.
    #[default]
    Idle,
    /// The recognizer has been asked to capture speech.
    Listening,
}

impl fmt::Display for DictationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictationState::Idle => write!(f, "Idle"),
            DictationState::Listening => write!(f, "Listening"),
        }
    }
}

impl DictationState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &DictationState) -> bool {
        matches!(
            (self, target),
            (DictationState::Idle, DictationState::Listening)
                | (DictationState::Listening, DictationState::Idle)
        )
    }
}

/// Everything the engine reacts to, serialized through one channel.
#[derive(Debug, Clone, PartialEq)]
pub enum DictationInput {
    /// The user pressed the voice button.
    Toggle,
    /// Something happened in the platform recognizer.
    Recognition(RecognitionEvent),
    /// A silence timer fired.
    SilenceElapsed(TimerToken),
    /// The recognizer refused to start.
    StartFailed { code: String },
    /// Stop the engine loop.
    Shutdown,
}

/// Work the engine performs on the machine's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartCapture,
    StopCapture,
    ArmSilenceTimer { token: TimerToken, delay: Duration },
    CancelSilenceTimer { token: TimerToken },
    Notify(DictationEvent),
}

/// Text heard during the current listening period.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceBuffer {
    /// Finalized segments, each followed by a single space.
    pub committed_text: String,
    /// Latest provisional text. Display only, never committed.
    pub pending_interim_text: String,
}

impl VoiceBuffer {
    pub fn clear(&mut self) {
        self.committed_text.clear();
        self.pending_interim_text.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.committed_text.is_empty() && self.pending_interim_text.is_empty()
    }
}

/// Two-state dictation lifecycle with a single pending silence deadline.
#[derive(Debug, Clone)]
pub struct DictationMachine {
    state: DictationState,
    buffer: VoiceBuffer,
    pending: Option<TimerToken>,
    next_token: u64,
    silence_delay: Duration,
    error_display_ms: u64,
}

impl DictationMachine {
    pub fn new(silence_delay: Duration, error_display_ms: u64) -> Self {
        Self {
            state: DictationState::Idle,
            buffer: VoiceBuffer::default(),
            pending: None,
            next_token: 0,
            silence_delay,
            error_display_ms,
        }
    }

    pub fn from_config(config: &DictationConfig) -> Self {
        Self::new(config.silence_delay(), config.error_display_ms)
    }

    pub fn state(&self) -> DictationState {
        self.state
    }

    pub fn buffer(&self) -> &VoiceBuffer {
        &self.buffer
    }

    /// Token of the armed silence timer, if any.
    pub fn pending_deadline(&self) -> Option<TimerToken> {
        self.pending
    }

    pub fn silence_delay(&self) -> Duration {
        self.silence_delay
    }

    /// Feed one input and collect the effects it causes, in order.
    pub fn apply(&mut self, input: DictationInput) -> Vec<Effect> {
        let listening = self.state == DictationState::Listening;
        match input {
            DictationInput::Toggle if listening => vec![Effect::StopCapture],
            DictationInput::Toggle => {
                self.buffer.clear();
                self.transition(DictationState::Listening);
                vec![Effect::StartCapture]
            }

            DictationInput::Recognition(RecognitionEvent::Started) if listening => {
                vec![Effect::Notify(DictationEvent::ListeningStarted)]
            }
            DictationInput::Recognition(RecognitionEvent::Result {
                result_index,
                results,
            }) if listening => self.on_results(result_index, &results),
            DictationInput::Recognition(RecognitionEvent::Ended) if listening => self.finish(),
            DictationInput::Recognition(RecognitionEvent::Error { code }) if listening => {
                self.fail(&code)
            }
            // Late errors are still worth telling the user about.
            DictationInput::Recognition(RecognitionEvent::Error { code }) => {
                vec![self.voice_error(&code)]
            }

            DictationInput::SilenceElapsed(token) if listening && self.pending == Some(token) => {
                tracing::debug!(%token, "Silence delay elapsed, stopping capture");
                self.pending = None;
                vec![Effect::StopCapture]
            }
            DictationInput::SilenceElapsed(token) => {
                tracing::trace!(%token, "Ignoring stale silence timer");
                Vec::new()
            }

            DictationInput::StartFailed { code } if listening => self.fail(&code),

            _ => Vec::new(),
        }
    }

    fn on_results(&mut self, result_index: usize, results: &[RecognitionResult]) -> Vec<Effect> {
        let mut effects = Vec::new();
        let mut saw_final = false;
        let mut interim = String::new();

        for result in results.iter().skip(result_index) {
            if result.is_final {
                let text = result.transcript().trim();
                if !text.is_empty() {
                    self.buffer.committed_text.push_str(text);
                    self.buffer.committed_text.push(' ');
                    saw_final = true;
                }
            } else {
                interim.push_str(result.transcript());
            }
        }
        self.buffer.pending_interim_text = interim;

        if saw_final {
            effects.extend(self.cancel_pending());
            self.next_token += 1;
            let token = TimerToken(self.next_token);
            self.pending = Some(token);
            effects.push(Effect::ArmSilenceTimer {
                token,
                delay: self.silence_delay,
            });
        }

        effects.push(Effect::Notify(DictationEvent::TranscriptUpdated {
            committed: self.buffer.committed_text.trim_end().to_string(),
            interim: self.buffer.pending_interim_text.clone(),
        }));
        effects
    }

    fn finish(&mut self) -> Vec<Effect> {
        let mut effects: Vec<Effect> = self.cancel_pending().into_iter().collect();

        let text = self.buffer.committed_text.trim();
        if !text.is_empty() {
            effects.push(Effect::Notify(DictationEvent::Committed {
                text: text.to_string(),
            }));
        }
        self.buffer.clear();
        self.transition(DictationState::Idle);
        effects.push(Effect::Notify(DictationEvent::ListeningStopped));
        effects
    }

    fn fail(&mut self, code: &str) -> Vec<Effect> {
        let mut effects: Vec<Effect> = self.cancel_pending().into_iter().collect();

        if !self.buffer.is_empty() {
            tracing::debug!(
                discarded = %self.buffer.committed_text.trim(),
                "Discarding transcript after recognition error"
            );
        }
        self.buffer.clear();
        self.transition(DictationState::Idle);
        effects.push(self.voice_error(code));
        effects.push(Effect::Notify(DictationEvent::ListeningStopped));
        effects
    }

    fn voice_error(&self, code: &str) -> Effect {
        let category = VoiceErrorCategory::from_code(code);
        Effect::Notify(DictationEvent::VoiceError {
            message: category.user_message(),
            category,
            dismiss_after_ms: self.error_display_ms,
        })
    }

    fn cancel_pending(&mut self) -> Option<Effect> {
        self.pending
            .take()
            .map(|token| Effect::CancelSilenceTimer { token })
    }

    fn transition(&mut self, target: DictationState) {
        debug_assert!(self.state.can_transition_to(&target));
        tracing::debug!("Dictation state: {} -> {}", self.state, target);
        self.state = target;
    }
}

// =============================================================================
// Tests
// =============================================================================
